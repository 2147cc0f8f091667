// Uploader module - pomf host client
//
// The client verifies hosts, streams uploads and reports through `events`

pub mod events;
pub mod pomf_client;
pub mod progress_tracker;
pub mod response;

pub use events::{event_channel, EventReceiver, EventSender, UploadEvent};
pub use pomf_client::{build_http_client, UploadClient};
pub use response::{HostResponse, UploadOutcome};
