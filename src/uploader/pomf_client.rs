use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Url};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::config::UploadConfig;
use crate::errors::{AppError, AppResult, ErrorKind, MSG_INVALID_URL, MSG_UNREADABLE_FILE};
use crate::security::InputValidator;

use super::events::{event_channel, safe_emit_event, EventReceiver, EventSender, UploadEvent};
use super::progress_tracker::ProgressReader;
use super::response::{HostResponse, UploadOutcome};

/// Multipart field pomf hosts read uploaded files from.
pub const UPLOAD_FIELD: &str = "files[]";

/// Build the HTTP client shared by upload clients.
pub fn build_http_client(timeout: Duration) -> AppResult<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pomf-uploader/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Client for a single pomf host.
///
/// Uploads run as tasks on the injected runtime and report through the event
/// channel handed out by [`UploadClient::new`], so `upload` and `retry` may be
/// called from threads outside that runtime. Dropping the client cancels every
/// upload still in flight.
pub struct UploadClient {
    config: UploadConfig,
    http: Client,
    runtime: Handle,
    events: EventSender,
    last_file_path: Mutex<String>,
    cancel_token: Mutex<CancellationToken>,
}

impl UploadClient {
    pub fn new(config: UploadConfig, http: Client, runtime: Handle) -> (Self, EventReceiver) {
        let (events, receiver) = event_channel();
        (Self::with_sender(config, http, runtime, events), receiver)
    }

    /// Report into an existing channel, e.g. one shared by several uploaders.
    pub fn with_sender(
        config: UploadConfig,
        http: Client,
        runtime: Handle,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            http,
            runtime,
            events,
            last_file_path: Mutex::new(String::new()),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Path of the most recently started upload, empty if none was started.
    pub fn last_file_path(&self) -> String {
        lock(&self.last_file_path).clone()
    }

    /// Check that `base_url` hosts a pomf upload endpoint.
    ///
    /// An invalid URL resolves `false` without touching the network.
    pub async fn verify(&self, base_url: &str) -> bool {
        let endpoint = match InputValidator::upload_endpoint(base_url) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::debug!("Verification skipped: {}", e);
                return false;
            }
        };

        log::debug!("Verifying pomf endpoint {}", endpoint);

        let response = match self.http.get(endpoint.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Verification request to {} failed: {}", endpoint, e);
                return false;
            }
        };

        match response.bytes().await {
            Ok(body) => {
                let verified = HostResponse::parse(&body).looks_like_pomf();
                log::info!("Verification of {}: {}", endpoint, verified);
                verified
            }
            Err(e) => {
                log::warn!("Failed to read verification response from {}: {}", endpoint, e);
                false
            }
        }
    }

    /// Start uploading `file_path` to the configured host.
    ///
    /// Returns the handle of the spawned transfer, or `None` when the attempt
    /// failed before any network I/O. In that case the error event has
    /// already been emitted.
    pub fn upload(&self, file_path: &str) -> Option<JoinHandle<()>> {
        let endpoint = match self.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::warn!("Refusing to upload {}: {}", file_path, e);
                self.emit_error(ErrorKind::HostError, MSG_INVALID_URL, file_path);
                return None;
            }
        };

        let token = self.current_token().child_token();

        let form = match self.build_form(file_path, &token) {
            Ok(form) => form,
            Err(e) => {
                log::warn!("Unable to read {}: {}", file_path, e);
                self.emit_error(ErrorKind::FileError, MSG_UNREADABLE_FILE, file_path);
                return None;
            }
        };

        let request = self.http.post(endpoint).multipart(form);
        *lock(&self.last_file_path) = file_path.to_string();

        let attempt_id = uuid::Uuid::new_v4().simple().to_string();
        let events = self.events.clone();
        let file_path = file_path.to_string();

        log::info!("Upload {} started for {}", attempt_id, file_path);

        Some(self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                outcome = send_upload(request) => Some(outcome),
            };

            // Cancellation may land between completion and emission.
            let outcome = match outcome {
                Some(outcome) if !token.is_cancelled() => outcome,
                _ => {
                    log::info!("Upload {} of {} cancelled", attempt_id, file_path);
                    return;
                }
            };

            let event = match outcome {
                UploadOutcome::Uploaded { url } => {
                    log::info!("Upload {} of {} finished: {}", attempt_id, file_path, url);
                    UploadEvent::Uploaded {
                        file_path,
                        url,
                        thumbnail_url: String::new(),
                    }
                }
                UploadOutcome::Failed { kind, message } => {
                    log::warn!(
                        "Upload {} of {} failed ({}): {}",
                        attempt_id,
                        file_path,
                        kind,
                        message
                    );
                    UploadEvent::Error {
                        kind,
                        message,
                        file_path,
                    }
                }
            };

            safe_emit_event(&events, event);
        }))
    }

    /// Upload the most recently attempted file again.
    ///
    /// With no earlier attempt the stored path is empty, which ends in a
    /// file error.
    pub fn retry(&self) -> Option<JoinHandle<()>> {
        let file_path = self.last_file_path();

        if file_path.is_empty() {
            log::warn!("Retry requested without a previous upload");
        } else {
            log::info!("Retrying upload of {}", file_path);
        }

        self.upload(&file_path)
    }

    /// Abort every upload currently in flight. Safe to call when idle.
    pub fn cancel(&self) {
        let mut token = lock(&self.cancel_token);
        token.cancel();
        *token = CancellationToken::new();
        log::debug!("Cancellation requested for in-flight uploads");
    }

    fn endpoint(&self) -> AppResult<Url> {
        if self.config.base_url.is_empty() {
            return Err(AppError::invalid_uploader_url(&self.config.base_url));
        }
        InputValidator::upload_endpoint(&self.config.base_url)
    }

    fn current_token(&self) -> CancellationToken {
        lock(&self.cancel_token).clone()
    }

    fn build_form(&self, file_path: &str, token: &CancellationToken) -> AppResult<Form> {
        let file = std::fs::File::open(file_path)?;
        let metadata = file.metadata()?;

        if !metadata.is_file() {
            return Err(AppError::validation("file_path", "Path is not a file"));
        }

        let file_size = metadata.len();
        let events = self.events.clone();
        let progress_path = file_path.to_string();
        let progress_token = token.clone();

        let reader = ProgressReader::new(
            tokio::fs::File::from_std(file),
            file_size,
            move |percent| {
                if !progress_token.is_cancelled() {
                    safe_emit_event(
                        &events,
                        UploadEvent::Progress {
                            file_path: progress_path.clone(),
                            percent,
                        },
                    );
                }
            },
        );

        let mime_type = mime_guess::from_path(file_path)
            .first_or_octet_stream()
            .to_string();

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(reader)), file_size)
            .file_name(InputValidator::upload_file_name(file_path))
            .mime_str(&mime_type)?;

        Ok(Form::new().part(UPLOAD_FIELD, part))
    }

    fn emit_error(&self, kind: ErrorKind, message: &str, file_path: &str) {
        safe_emit_event(
            &self.events,
            UploadEvent::Error {
                kind,
                message: message.to_string(),
                file_path: file_path.to_string(),
            },
        );
    }
}

impl Drop for UploadClient {
    fn drop(&mut self) {
        lock(&self.cancel_token).cancel();
    }
}

async fn send_upload(request: RequestBuilder) -> UploadOutcome {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Upload request failed: {}", e);
            return HostResponse::default().into_outcome(true);
        }
    };

    let status = response.status();
    if !status.is_success() {
        log::warn!("Uploader answered with status {}", status);
    }

    match response.bytes().await {
        Ok(body) => HostResponse::parse(&body).into_outcome(!status.is_success()),
        Err(e) => {
            log::warn!("Failed to read upload response: {}", e);
            HostResponse::default().into_outcome(true)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned uploader lock");
        poisoned.into_inner()
    })
}
