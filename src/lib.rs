//! ArchieDesk: Markdown documents with a front-matter header, stored as
//! files in a Google Drive account.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
