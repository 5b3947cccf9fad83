// Capture domain module
// Contains the captured record aggregate root, its schema, value objects,
// the persisted document and domain events

pub mod document;
pub mod errors;
pub mod events;
pub mod record;
pub mod schema;
pub mod value_objects;

// Re-export main types for convenience
pub use document::{CaptureDocument, HistoryEntry};
pub use errors::{CaptureError, CaptureResult};
pub use events::CaptureEvent;
pub use record::CapturedRecord;
pub use schema::{CaptureSchema, FieldDef, FieldKind};
pub use value_objects::{FieldValue, RecordId, RecordStatus};
