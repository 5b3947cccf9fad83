use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::document::{CaptureDocument, HistoryEntry};
use super::errors::{CaptureError, CaptureResult};
use super::events::CaptureEvent;
use super::schema::{CaptureSchema, FieldDef};
use super::value_objects::{FieldValue, RecordId, RecordStatus};

/// Captured record aggregate root (the Field Store)
///
/// Holds the values gathered for one in-progress capture: a coffee order,
/// a sales lead, a wellness check-in, and so on. The shape of the record is
/// fixed by its [`CaptureSchema`].
///
/// # Invariants
/// - Only schema fields can be written
/// - Values match the field's declared type
/// - Any field can be overwritten while the record is `Open`
/// - Once `Finalized` the record is immutable
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use voice_capture_api::domain::capture::record::CapturedRecord;
/// use voice_capture_api::domain::capture::schema::{CaptureSchema, FieldDef};
///
/// let schema = CaptureSchema::new(
///     "lead",
///     "LEAD",
///     vec![
///         FieldDef::text("name", "Name").required(),
///         FieldDef::text("email", "Email").required(),
///     ],
///     false,
/// ).expect("valid schema");
///
/// let mut record = CapturedRecord::new(Arc::new(schema));
/// record.set_field("name", "Priya".into()).expect("known field");
///
/// assert_eq!(record.completion_percentage(), 50);
/// assert_eq!(record.missing_fields().collect::<Vec<_>>(), vec!["email"]);
/// ```
#[derive(Debug, Clone)]
pub struct CapturedRecord {
    schema: Arc<CaptureSchema>,
    values: Vec<Option<FieldValue>>,
    history: Vec<HistoryEntry>,
    status: RecordStatus,
    id: Option<RecordId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl CapturedRecord {
    /// Creates an empty, open record for the given schema
    pub fn new(schema: Arc<CaptureSchema>) -> Self {
        let now = Utc::now();
        Self {
            values: vec![None; schema.fields().len()],
            schema,
            history: Vec::new(),
            status: RecordStatus::Open,
            id: None,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    /// Writes a single field
    ///
    /// # Returns
    /// * `Ok(CaptureEvent)` - Partial update carrying the field's new value
    /// * `Err(CaptureError)` - Unknown field, type mismatch, or finalized record
    ///
    /// # Business Rules
    /// - Text, choice and flag fields are overwritten (last write wins)
    /// - List fields append the given entry; duplicates are kept
    /// - Bumps the last-modified timestamp
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> CaptureResult<CaptureEvent> {
        self.ensure_open()?;

        let index = self.schema.position(name).ok_or_else(|| CaptureError::UnknownField {
            schema: self.schema.name().to_string(),
            field: name.to_string(),
        })?;
        let def = &self.schema.fields()[index];
        def.check(&value)?;

        let slot = &mut self.values[index];
        let stored = match (def.is_list(), value, slot.take()) {
            (true, FieldValue::Text(entry), Some(FieldValue::List(mut items))) => {
                items.push(entry);
                FieldValue::List(items)
            }
            (true, FieldValue::Text(entry), _) => FieldValue::List(vec![entry]),
            (_, value, _) => value,
        };
        let current = stored.to_json();
        *slot = Some(stored);
        self.updated_at = Utc::now();

        Ok(CaptureEvent::partial(name, current, self.completion_percentage()))
    }

    /// Returns the current value of a field, `None` when unset or unknown
    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.schema
            .position(name)
            .and_then(|index| self.values[index].as_ref())
    }

    /// Clears every field and the history log
    ///
    /// Only open records can be reset; a finalized record stays as it was
    /// persisted and a new record has to be started instead.
    pub fn reset(&mut self) -> CaptureResult<()> {
        self.ensure_open()?;

        self.values.iter_mut().for_each(|v| *v = None);
        self.history.clear();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Appends an entry to the history log
    pub fn push_history(&mut self, kind: &str, detail: impl Into<String>) -> CaptureResult<()> {
        self.push_history_in(kind, detail, None)
    }

    /// Appends an entry tagged with the round it belongs to
    pub fn push_history_in(
        &mut self,
        kind: &str,
        detail: impl Into<String>,
        round: Option<u32>,
    ) -> CaptureResult<()> {
        self.ensure_open()?;

        let at = Utc::now();
        self.history.push(HistoryEntry {
            kind: kind.to_string(),
            detail: detail.into(),
            round,
            at,
        });
        self.updated_at = at;
        Ok(())
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Number of history entries of the given kind
    pub fn history_count(&self, kind: &str) -> usize {
        self.history.iter().filter(|entry| entry.kind == kind).count()
    }

    /// Returns true if the field holds a non-empty value
    pub fn is_set(&self, name: &str) -> bool {
        self.get_field(name).is_some_and(|v| !v.is_empty())
    }

    /// True iff every required field is set
    pub fn is_complete(&self) -> bool {
        self.missing().next().is_none()
    }

    /// True once finalized, or when every required field is captured
    pub fn is_done(&self) -> bool {
        self.status == RecordStatus::Finalized || self.is_complete()
    }

    /// Names of required fields that are still unset, in schema order
    ///
    /// Recomputed from the current values on every call.
    pub fn missing_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.missing().map(|f| f.name.as_str())
    }

    /// Labels of the missing required fields, for spoken prompts
    pub fn missing_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.missing().map(|f| f.label.as_str())
    }

    fn missing(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter(|(def, value)| def.required && !value.as_ref().is_some_and(|v| !v.is_empty()))
            .map(|(def, _)| def)
    }

    /// Share of required fields that are set, rounded to a whole percent
    ///
    /// Defined as 0 when the schema has no required fields.
    pub fn completion_percentage(&self) -> u8 {
        let total = self.schema.required_fields().count();
        if total == 0 {
            return 0;
        }

        let set = total - self.missing().count();
        ((set as f64 * 100.0) / total as f64).round() as u8
    }

    /// Deterministic recap of every non-empty field in schema order
    pub fn summary_text(&self) -> String {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .filter_map(|(def, value)| {
                value
                    .as_ref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}: {}", def.label, v.render()))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Every schema field as JSON, in declaration order
    ///
    /// Unset list fields render as `[]`, other unset fields as `null`.
    pub fn fields_json(&self) -> Map<String, Value> {
        self.schema
            .fields()
            .iter()
            .zip(&self.values)
            .map(|(def, value)| {
                let json = match value {
                    Some(v) => v.to_json(),
                    None if def.is_list() => Value::Array(vec![]),
                    None => Value::Null,
                };
                (def.name.clone(), json)
            })
            .collect()
    }

    /// Finalizes the record
    ///
    /// Assigns the id and timestamp, computes the summary and transitions
    /// to `Finalized`. Persisting and notifying are left to the caller.
    ///
    /// # Returns
    /// * `Ok(CaptureDocument)` - The document to persist
    /// * `Err(CaptureError::AlreadyFinalized)` - Record was finalized before
    /// * `Err(CaptureError::Incomplete)` - Schema requires completeness and
    ///   required fields are missing; the record stays open
    pub fn finalize(&mut self) -> CaptureResult<CaptureDocument> {
        if !self.status.can_transition_to(RecordStatus::Finalized) {
            return Err(CaptureError::AlreadyFinalized);
        }

        if self.schema.require_complete_before_finalize() && !self.is_complete() {
            return Err(CaptureError::Incomplete {
                missing: self.missing_fields().map(str::to_string).collect(),
            });
        }

        let at = Utc::now();
        let id = RecordId::generate(self.schema.id_prefix(), at);
        let document = CaptureDocument {
            id: id.clone(),
            timestamp: at,
            fields: self.fields_json(),
            summary: self.summary_text(),
            history: self.history.clone(),
        };

        self.status = RecordStatus::Finalized;
        self.id = Some(id);
        self.finalized_at = Some(at);

        Ok(document)
    }

    fn ensure_open(&self) -> CaptureResult<()> {
        match self.status {
            RecordStatus::Open => Ok(()),
            RecordStatus::Finalized => Err(CaptureError::AlreadyFinalized),
        }
    }

    // ===== Getters =====

    pub fn schema(&self) -> &Arc<CaptureSchema> {
        &self.schema
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Returns the id, assigned at finalize time
    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last-modified timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }
}
