use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a captured record
///
/// # Status Transitions
/// ```text
/// Open -> Finalized
/// ```
/// `Finalized` is terminal: a new record has to be started instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Record is accepting mutations
    Open,
    /// Record has been finalized and is immutable
    Finalized,
}

impl RecordStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use voice_capture_api::domain::capture::value_objects::RecordStatus;
    ///
    /// assert!(RecordStatus::Open.can_transition_to(RecordStatus::Finalized));
    /// assert!(!RecordStatus::Finalized.can_transition_to(RecordStatus::Open));
    /// ```
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        matches!((self, next), (RecordStatus::Open, RecordStatus::Finalized))
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Open => write!(f, "open"),
            RecordStatus::Finalized => write!(f, "finalized"),
        }
    }
}

/// Value stored in a single schema field
///
/// Serialized untagged so the persisted document carries plain JSON values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    List(Vec<String>),
    Text(String),
}

impl FieldValue {
    /// A text value is empty when blank, a list when it has no entries.
    /// Flags always count as captured.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Flag(_) => false,
        }
    }

    /// Renders the value for spoken recaps and summaries
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::List(items) => items.join(", "),
            FieldValue::Flag(true) => "yes".to_string(),
            FieldValue::Flag(false) => "no".to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(text) => serde_json::Value::from(text.as_str()),
            FieldValue::List(items) => serde_json::Value::from(items.clone()),
            FieldValue::Flag(flag) => serde_json::Value::from(*flag),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<bool> for FieldValue {
    fn from(flag: bool) -> Self {
        FieldValue::Flag(flag)
    }
}

/// Identifier assigned to a record when it is finalized
///
/// Format: `<PREFIX>-<YYYYMMDD>-<HHMMSS>-<6 hex chars>`. Unique by
/// convention only; no collision detection is performed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn generate(prefix: &str, at: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        RecordId(format!(
            "{}-{}-{}",
            prefix,
            at.format("%Y%m%d-%H%M%S"),
            &suffix[..6]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
