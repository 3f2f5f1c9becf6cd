//! Services: local persistence, session lifecycle, drive access, sign-in,
//! folder navigation and the desk that ties them together.

pub mod clock;
pub mod desk;
pub mod drive_service;
pub mod folder_picker;
pub mod local_store;
pub mod oauth_service;
pub mod session_service;
