use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::CaptureDocument;

/// Events emitted while a record is captured
///
/// These are the messages pushed to observers (UI views):
/// - `partial_update` after every successful mutation, carrying only the
///   changed field and the recomputed completion percentage
/// - `complete` once the record is finalized, carrying the full document
///
/// # Example
/// ```
/// use voice_capture_api::domain::capture::events::CaptureEvent;
/// use serde_json::json;
///
/// let event = CaptureEvent::partial("size", json!("large"), 50);
/// let wire = serde_json::to_value(&event).unwrap();
///
/// assert_eq!(wire["type"], "partial_update");
/// assert_eq!(wire["completionPercentage"], 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Fired when a single field changes
    PartialUpdate {
        changed: Map<String, Value>,
        #[serde(rename = "completionPercentage")]
        completion_percentage: u8,
    },
    /// Fired when the record is finalized
    Complete {
        record: CaptureDocument,
    },
}

impl CaptureEvent {
    pub fn partial(field: &str, value: Value, completion_percentage: u8) -> Self {
        let mut changed = Map::new();
        changed.insert(field.to_string(), value);
        CaptureEvent::PartialUpdate {
            changed,
            completion_percentage,
        }
    }

    /// Returns the wire name of this event
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureEvent::PartialUpdate { .. } => "partial_update",
            CaptureEvent::Complete { .. } => "complete",
        }
    }
}
