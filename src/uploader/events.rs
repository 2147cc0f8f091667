use serde::Serialize;
use tokio::sync::mpsc;

use crate::errors::ErrorKind;

/// Notifications produced by an upload client, in the order they happen.
///
/// Every attempt yields zero or more `Progress` events followed by exactly one
/// `Uploaded` or `Error`, unless it was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Progress {
        file_path: String,
        percent: u8,
    },
    Uploaded {
        file_path: String,
        url: String,
        thumbnail_url: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
        file_path: String,
    },
}

impl UploadEvent {
    pub fn file_path(&self) -> &str {
        match self {
            UploadEvent::Progress { file_path, .. }
            | UploadEvent::Uploaded { file_path, .. }
            | UploadEvent::Error { file_path, .. } => file_path,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadEvent::Progress { .. })
    }
}

pub type EventSender = mpsc::UnboundedSender<UploadEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<UploadEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Emit an event, logging instead of failing when nobody is listening
pub fn safe_emit_event(events: &EventSender, event: UploadEvent) -> bool {
    match events.send(event) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to emit upload event (non-critical): {:?}", e.0);
            false
        }
    }
}
