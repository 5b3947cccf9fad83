use serde::Serialize;
use std::collections::HashSet;

use super::errors::{CaptureError, CaptureResult};
use super::value_objects::FieldValue;

/// Declared type of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text, overwritten on every write
    Text,
    /// String list, every write appends one entry
    List,
    /// One of a fixed set of values
    Choice(Vec<String>),
    /// Yes/no answer
    Flag,
}

/// One entry of a capture schema
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    /// Human-readable name used in recaps and "still missing" prompts
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDef {
    pub fn text(name: &str, label: &str) -> Self {
        Self::with_kind(name, label, FieldKind::Text)
    }

    pub fn list(name: &str, label: &str) -> Self {
        Self::with_kind(name, label, FieldKind::List)
    }

    pub fn choice(name: &str, label: &str, options: &[&str]) -> Self {
        let options = options.iter().map(|o| o.to_string()).collect();
        Self::with_kind(name, label, FieldKind::Choice(options))
    }

    pub fn flag(name: &str, label: &str) -> Self {
        Self::with_kind(name, label, FieldKind::Flag)
    }

    fn with_kind(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: false,
        }
    }

    /// Marks the field as required for completeness
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_list(&self) -> bool {
        self.kind == FieldKind::List
    }

    /// Checks that a value matches the field's declared type
    ///
    /// List fields accept a single text entry (the entry to append).
    pub fn check(&self, value: &FieldValue) -> CaptureResult<()> {
        match (&self.kind, value) {
            (FieldKind::Text, FieldValue::Text(text)) | (FieldKind::List, FieldValue::Text(text)) => {
                if text.trim().is_empty() {
                    return Err(CaptureError::validation(&self.name, "value cannot be empty"));
                }
                Ok(())
            }
            (FieldKind::Choice(options), FieldValue::Text(text)) => {
                if options.iter().any(|o| o == text) {
                    Ok(())
                } else {
                    Err(CaptureError::validation(
                        &self.name,
                        format!("'{}' is not one of: {}", text, options.join(", ")),
                    ))
                }
            }
            (FieldKind::Flag, FieldValue::Flag(_)) => Ok(()),
            (kind, _) => Err(CaptureError::validation(
                &self.name,
                format!("value does not match field type {:?}", kind),
            )),
        }
    }
}

/// Fixed field table for one agent variant
///
/// # Invariants
/// - At least one field
/// - Field names are non-empty and unique
/// - Choice fields declare at least one option
/// - Required fields are a subset of the declared fields (by construction)
#[derive(Debug, Clone, Serialize)]
pub struct CaptureSchema {
    name: String,
    id_prefix: String,
    fields: Vec<FieldDef>,
    require_complete_before_finalize: bool,
}

impl CaptureSchema {
    /// Creates a schema, validating the field table
    ///
    /// # Example
    /// ```
    /// use voice_capture_api::domain::capture::schema::{CaptureSchema, FieldDef};
    ///
    /// let schema = CaptureSchema::new(
    ///     "lead",
    ///     "LEAD",
    ///     vec![
    ///         FieldDef::text("name", "Name").required(),
    ///         FieldDef::text("company", "Company"),
    ///     ],
    ///     false,
    /// ).expect("valid schema");
    ///
    /// assert_eq!(schema.required_fields().count(), 1);
    /// ```
    pub fn new(
        name: &str,
        id_prefix: &str,
        fields: Vec<FieldDef>,
        require_complete_before_finalize: bool,
    ) -> CaptureResult<Self> {
        if fields.is_empty() {
            return Err(CaptureError::Configuration(format!(
                "Schema '{}' declares no fields",
                name
            )));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(CaptureError::Configuration(format!(
                    "Schema '{}' has a field with an empty name",
                    name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CaptureError::Configuration(format!(
                    "Schema '{}' declares field '{}' twice",
                    name, field.name
                )));
            }
            if let FieldKind::Choice(options) = &field.kind {
                if options.is_empty() {
                    return Err(CaptureError::Configuration(format!(
                        "Choice field '{}' has no options",
                        field.name
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            id_prefix: id_prefix.to_string(),
            fields,
            require_complete_before_finalize,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_prefix(&self) -> &str {
        &self.id_prefix
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|f| f.required)
    }

    pub fn require_complete_before_finalize(&self) -> bool {
        self.require_complete_before_finalize
    }
}
