use reqwest::Url;
use std::path::Path;

use crate::errors::{AppError, AppResult};

/// Script every pomf host serves uploads from, relative to its base URL.
pub const UPLOAD_SCRIPT: &str = "upload.php";

pub struct InputValidator;

impl InputValidator {
    /// Resolve a user supplied base URL into the host's `upload.php` endpoint.
    ///
    /// Input without a scheme is treated as `http://`. Trailing slashes are
    /// dropped so `https://host/` and `https://host` resolve to the same
    /// endpoint. Only http(s) URLs with a host and no query or fragment pass.
    pub fn upload_endpoint(base_url: &str) -> AppResult<Url> {
        let trimmed = base_url.trim();

        if trimmed.is_empty() {
            return Err(AppError::invalid_uploader_url(base_url));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let base = Url::parse(with_scheme.trim_end_matches('/'))
            .map_err(|_| AppError::invalid_uploader_url(base_url))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(AppError::invalid_uploader_url(base_url));
        }

        if base.host_str().map_or(true, str::is_empty) {
            return Err(AppError::invalid_uploader_url(base_url));
        }

        if base.query().is_some() || base.fragment().is_some() {
            return Err(AppError::invalid_uploader_url(base_url));
        }

        let endpoint = format!("{}/{}", base.as_str().trim_end_matches('/'), UPLOAD_SCRIPT);
        Url::parse(&endpoint).map_err(|_| AppError::invalid_uploader_url(base_url))
    }

    pub fn validate_uploader_url(base_url: &str) -> AppResult<()> {
        if base_url.len() > 2048 {
            return Err(AppError::validation("pomf_url", "Uploader URL too long"));
        }

        Self::upload_endpoint(base_url).map(|_| ())
    }

    /// Base name sent as the multipart filename.
    pub fn upload_file_name(file_path: &str) -> String {
        let name = Path::new(file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        if name.is_empty() {
            "file".to_string()
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_endpoint_appends_script() {
        let url = InputValidator::upload_endpoint("https://pomf.example").unwrap();
        assert_eq!(url.as_str(), "https://pomf.example/upload.php");
    }

    #[test]
    fn test_upload_endpoint_strips_trailing_slashes() {
        let url = InputValidator::upload_endpoint("https://pomf.example/sub//").unwrap();
        assert_eq!(url.as_str(), "https://pomf.example/sub/upload.php");
    }

    #[test]
    fn test_upload_endpoint_defaults_to_http() {
        let url = InputValidator::upload_endpoint("  pomf.example:8080 ").unwrap();
        assert_eq!(url.as_str(), "http://pomf.example:8080/upload.php");
    }

    #[test]
    fn test_upload_endpoint_rejects_bad_input() {
        for input in [
            "",
            "   ",
            "http://",
            "ftp://pomf.example",
            "https://exa mple.com",
            "https://pomf.example/?key=1",
            "https://pomf.example/#top",
        ] {
            assert!(
                InputValidator::upload_endpoint(input).is_err(),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_validate_uploader_url_length() {
        let long = format!("https://pomf.example/{}", "a".repeat(3000));
        assert!(InputValidator::validate_uploader_url(&long).is_err());
        assert!(InputValidator::validate_uploader_url("https://pomf.example").is_ok());
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(
            InputValidator::upload_file_name("/tmp/shots/cat.png"),
            "cat.png"
        );
        assert_eq!(InputValidator::upload_file_name(""), "file");
    }
}
