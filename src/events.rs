use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::geo::Coordinate;
use crate::registry::PhotoId;

// User-visible events pushed to the page over SSE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppEvent {
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventData {
    pub batch: Option<u64>,
    pub progress: Option<f64>,
    pub total_files: Option<usize>,
    pub accepted: Option<usize>,
    pub rejected: Option<usize>,
    pub photo_id: Option<PhotoId>,
    pub file_name: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub message: Option<String>,
    pub duration_ms: Option<u64>,
    pub phase: Option<String>,
}

impl AppEvent {
    pub fn new(event_type: &str, data: EventData) -> Self {
        AppEvent {
            event_type: event_type.to_string(),
            data,
        }
    }

    pub fn notice(event_type: &str, message: impl Into<String>) -> Self {
        Self::new(
            event_type,
            EventData {
                message: Some(message.into()),
                ..Default::default()
            },
        )
    }
}

pub type EventSender = broadcast::Sender<AppEvent>;

pub fn channel() -> EventSender {
    let (tx, _rx) = broadcast::channel(100);
    tx
}

/// Sends without caring whether anyone is listening.
pub fn emit(sender: &EventSender, event: AppEvent) {
    tracing::trace!(event = %event.event_type, "emit");
    let _ = sender.send(event);
}
