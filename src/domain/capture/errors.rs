use thiserror::Error;

/// Errors raised while capturing, finalizing or persisting a record
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Unknown field '{field}' for schema '{schema}'")]
    UnknownField { schema: String, field: String },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Record is incomplete, missing: {}", missing.join(", "))]
    Incomplete { missing: Vec<String> },

    #[error("Record is already finalized")]
    AlreadyFinalized,

    #[error("Record {record_id} was finalized but could not be persisted: {reason}")]
    Persistence { record_id: String, reason: String },

    #[error("Could not read stored records: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CaptureError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CaptureError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_lists_missing_fields() {
        let err = CaptureError::Incomplete {
            missing: vec!["size".to_string(), "name".to_string()],
        };

        assert_eq!(err.to_string(), "Record is incomplete, missing: size, name");
    }

    #[test]
    fn unknown_field_names_schema() {
        let err = CaptureError::UnknownField {
            schema: "coffee".to_string(),
            field: "flavor".to_string(),
        };

        assert!(err.to_string().contains("'flavor'"));
        assert!(err.to_string().contains("'coffee'"));
    }
}
