//! Core data models for ArchieDesk.
//!
//! Documents and their front-matter header, the records the drive returns,
//! the upload body format and the persisted session.

pub mod document;
pub mod metadata;
pub mod multipart;
pub mod remote_file;
pub mod session;
