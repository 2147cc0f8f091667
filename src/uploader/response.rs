use serde_json::{Map, Value};

use crate::errors::{ErrorKind, MSG_HOST_ERROR, MSG_INVALID_RESPONSE, MSG_UNREACHABLE};

/// Terminal result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { url: String },
    Failed { kind: ErrorKind, message: String },
}

impl UploadOutcome {
    fn failed(kind: ErrorKind, message: &str) -> Self {
        Self::Failed {
            kind,
            message: message.to_string(),
        }
    }
}

/// JSON object returned by a pomf host.
///
/// Fields are checked for presence rather than deserialized into a fixed
/// schema: a body that is not a JSON object is treated as an empty object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostResponse {
    fields: Map<String, Value>,
}

impl HostResponse {
    pub fn parse(body: &[u8]) -> Self {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                log::debug!("Host response is JSON but not an object: {}", other);
                Map::new()
            }
            Err(e) => {
                log::debug!("Host response is not JSON: {}", e);
                Map::new()
            }
        };

        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A live endpoint answers with an object carrying a `success` key,
    /// whatever its value.
    pub fn looks_like_pomf(&self) -> bool {
        !self.is_empty() && self.fields.contains_key("success")
    }

    pub fn succeeded(&self) -> bool {
        self.fields
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn first_file_url(&self) -> Option<&str> {
        self.fields
            .get("files")
            .and_then(Value::as_array)
            .and_then(|files| files.first())
            .and_then(|file| file.get("url"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.fields
            .get("description")
            .and_then(Value::as_str)
            .filter(|description| !description.is_empty())
    }

    /// Map the response of an upload POST to its outcome.
    ///
    /// `transport_failed` covers both connection failures and non-2xx
    /// statuses; a failed transfer whose body still parsed into an object is
    /// judged on that body.
    pub fn into_outcome(self, transport_failed: bool) -> UploadOutcome {
        if transport_failed && self.is_empty() {
            return UploadOutcome::failed(ErrorKind::NetworkError, MSG_UNREACHABLE);
        }

        if !self.fields.contains_key("success") {
            return UploadOutcome::failed(ErrorKind::HostError, MSG_INVALID_RESPONSE);
        }

        // Hosts omit `files` when they reject an upload.
        if self.succeeded() {
            return match self.first_file_url() {
                Some(url) => UploadOutcome::Uploaded {
                    url: url.to_string(),
                },
                None => UploadOutcome::failed(ErrorKind::HostError, MSG_INVALID_RESPONSE),
            };
        }

        UploadOutcome::failed(
            ErrorKind::HostError,
            self.description().unwrap_or(MSG_HOST_ERROR),
        )
    }
}
