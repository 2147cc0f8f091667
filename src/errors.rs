use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MSG_INVALID_URL: &str = "Invalid pomf uploader URL!";
pub const MSG_UNREADABLE_FILE: &str = "Unable to read screenshot file";
pub const MSG_UNREACHABLE: &str = "Error reaching uploader";
pub const MSG_INVALID_RESPONSE: &str = "Invalid response from uploader";
pub const MSG_HOST_ERROR: &str = "Host error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid uploader URL: {url}")]
    InvalidUploaderUrl { url: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convert to string for display layers
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_uploader_url(url: &str) -> Self {
        Self::InvalidUploaderUrl {
            url: url.to_string(),
        }
    }
}

/// Failure categories reported to whoever listens for upload events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The local file could not be read.
    FileError,
    /// The host could not be reached and gave no usable response.
    NetworkError,
    /// The host answered, but not with a successful upload.
    HostError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::FileError => "file error",
            ErrorKind::NetworkError => "network error",
            ErrorKind::HostError => "host error",
        };
        f.write_str(label)
    }
}
