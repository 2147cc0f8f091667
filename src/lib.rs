//! Upload files to pomf-compatible hosts.
//!
//! [`uploader::UploadClient`] does the work; [`config`] loads the host URL
//! from the persisted settings file.

pub mod config;
pub mod errors;
pub mod security;
pub mod uploader;

pub use config::{Settings, UploadConfig};
pub use errors::{AppError, AppResult, ErrorKind};
pub use uploader::{UploadClient, UploadEvent};
