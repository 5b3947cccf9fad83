use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value_objects::RecordId;

/// One entry of a record's append-only history log
/// (improv rounds, questions asked, quiz scores, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: String,
    pub detail: String,
    /// Round the entry belongs to, for round-based personas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    pub at: DateTime<Utc>,
}

/// Document written to storage when a record is finalized
///
/// ```text
/// { "id", "timestamp", "fields": {...}, "summary", "history"? }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureDocument {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    /// Every schema field in declaration order; unset fields are `null`
    pub fields: Map<String, Value>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl CaptureDocument {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }
}
