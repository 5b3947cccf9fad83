// Operation registry
//
// Maps the operation names the controlling agent calls onto typed actions
// over a capture schema. Operations are checked against the schema when
// they are registered, so a persona with a misnamed field never starts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::normalize::Normalizer;
use crate::domain::capture::errors::{CaptureError, CaptureResult};
use crate::domain::capture::schema::{CaptureSchema, FieldKind};
use crate::domain::capture::FieldValue;

/// Single input handed to an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Flag(bool),
    Text(String),
}

impl Argument {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Argument::Text(text) => Some(text),
            Argument::Flag(_) => None,
        }
    }
}

impl From<&str> for Argument {
    fn from(text: &str) -> Self {
        Argument::Text(text.to_string())
    }
}

impl From<bool> for Argument {
    fn from(flag: bool) -> Self {
        Argument::Flag(flag)
    }
}

/// A fixed value an operation writes as a side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub field: String,
    pub value: String,
}

impl Assignment {
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// Reply for one outcome of an operation, with the fields that outcome sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub reply: String,
    pub sets: Vec<Assignment>,
}

impl Branch {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            sets: Vec::new(),
        }
    }

    pub fn set(mut self, field: &str, value: &str) -> Self {
        self.sets.push(Assignment::new(field, value));
        self
    }
}

/// What an operation does when invoked
///
/// Reply templates are rendered with `{{value}}` (the stored value),
/// `{{missing}}` (labels of missing required fields), `{{summary}}` and
/// `{{id}}` where they apply. Case replies can also use any value of the
/// loaded case, round replies `{{round}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Overwrite a text or choice field
    Set {
        field: String,
        normalizer: Normalizer,
        reply: String,
    },
    /// Append one entry to a list field
    Append {
        field: String,
        normalizer: Normalizer,
        reply: String,
    },
    /// Store a yes/no answer
    SetFlag {
        field: String,
        yes: String,
        no: String,
    },
    /// Append an entry to the record's history log
    Log { kind: String, reply: String },
    /// Report what is still missing
    CheckStatus { done: String, pending: String },
    /// Apply the closing assignments, then finalize, persist and notify
    Finalize {
        saved: String,
        incomplete: String,
        closing: Vec<Assignment>,
    },
    /// Read back the most recent persisted document
    RecallPrevious { first: String, previous: String },
    /// Look up a seeded entry by `field` and copy its values into the record
    ///
    /// The `found` assignments are defaults the entry's own values override.
    LoadCase {
        field: String,
        normalizer: Normalizer,
        found: Branch,
        not_found: String,
    },
    /// Check a spoken answer against `answer_key` of the loaded case
    Verify {
        answer_key: String,
        passed: String,
        failed: Branch,
        no_case: String,
    },
    /// Store a yes/no answer once the caller is verified
    Decide {
        field: String,
        yes: Branch,
        no: Branch,
        unverified: String,
    },
    /// Open the next round in the history log, up to `max_rounds`
    StartRound {
        kind: String,
        max_rounds: u32,
        phase: Assignment,
        reply: String,
        exhausted: Branch,
    },
    /// Log a reaction against the round currently open
    React {
        round_kind: String,
        kind: String,
        max_rounds: u32,
        phase: Assignment,
        reply: String,
        final_reply: String,
        no_round: String,
    },
}

impl Action {
    /// Field written by this action, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Action::Set { field, .. }
            | Action::Append { field, .. }
            | Action::SetFlag { field, .. }
            | Action::LoadCase { field, .. }
            | Action::Decide { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }

    /// Fixed values the action may write
    pub fn assignments(&self) -> Vec<&Assignment> {
        match self {
            Action::Finalize { closing, .. } => closing.iter().collect(),
            Action::LoadCase { found, .. } => found.sets.iter().collect(),
            Action::Verify { failed, .. } => failed.sets.iter().collect(),
            Action::Decide { yes, no, .. } => yes.sets.iter().chain(&no.sets).collect(),
            Action::StartRound {
                phase, exhausted, ..
            } => std::iter::once(phase).chain(&exhausted.sets).collect(),
            Action::React { phase, .. } => vec![phase],
            _ => Vec::new(),
        }
    }

    /// Kind of argument the action expects
    pub fn argument(&self) -> ArgumentKind {
        match self {
            Action::Set { .. }
            | Action::Append { .. }
            | Action::Log { .. }
            | Action::LoadCase { .. }
            | Action::Verify { .. }
            | Action::StartRound { .. }
            | Action::React { .. } => ArgumentKind::Text,
            Action::SetFlag { .. } | Action::Decide { .. } => ArgumentKind::Flag,
            Action::CheckStatus { .. } | Action::Finalize { .. } | Action::RecallPrevious { .. } => {
                ArgumentKind::None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    Text,
    Flag,
    None,
}

/// A named operation exposed to the controlling agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub description: String,
    pub action: Action,
}

impl Operation {
    fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            action,
        }
    }

    pub fn set(name: &str, field: &str, normalizer: Normalizer, reply: &str) -> Self {
        Self::new(
            name,
            Action::Set {
                field: field.to_string(),
                normalizer,
                reply: reply.to_string(),
            },
        )
    }

    pub fn append(name: &str, field: &str, normalizer: Normalizer, reply: &str) -> Self {
        Self::new(
            name,
            Action::Append {
                field: field.to_string(),
                normalizer,
                reply: reply.to_string(),
            },
        )
    }

    pub fn set_flag(name: &str, field: &str, yes: &str, no: &str) -> Self {
        Self::new(
            name,
            Action::SetFlag {
                field: field.to_string(),
                yes: yes.to_string(),
                no: no.to_string(),
            },
        )
    }

    pub fn log(name: &str, kind: &str, reply: &str) -> Self {
        Self::new(
            name,
            Action::Log {
                kind: kind.to_string(),
                reply: reply.to_string(),
            },
        )
    }

    pub fn check_status(name: &str, done: &str, pending: &str) -> Self {
        Self::new(
            name,
            Action::CheckStatus {
                done: done.to_string(),
                pending: pending.to_string(),
            },
        )
    }

    pub fn finalize(name: &str, saved: &str, incomplete: &str) -> Self {
        Self::new(
            name,
            Action::Finalize {
                saved: saved.to_string(),
                incomplete: incomplete.to_string(),
                closing: Vec::new(),
            },
        )
    }

    /// Adds a value written right before a finalize operation runs
    pub fn closing(mut self, field: &str, value: &str) -> Self {
        if let Action::Finalize { closing, .. } = &mut self.action {
            closing.push(Assignment::new(field, value));
        }
        self
    }

    pub fn recall_previous(name: &str, first: &str, previous: &str) -> Self {
        Self::new(
            name,
            Action::RecallPrevious {
                first: first.to_string(),
                previous: previous.to_string(),
            },
        )
    }

    pub fn load_case(
        name: &str,
        field: &str,
        normalizer: Normalizer,
        found: Branch,
        not_found: &str,
    ) -> Self {
        Self::new(
            name,
            Action::LoadCase {
                field: field.to_string(),
                normalizer,
                found,
                not_found: not_found.to_string(),
            },
        )
    }

    pub fn verify(name: &str, answer_key: &str, passed: &str, failed: Branch, no_case: &str) -> Self {
        Self::new(
            name,
            Action::Verify {
                answer_key: answer_key.to_string(),
                passed: passed.to_string(),
                failed,
                no_case: no_case.to_string(),
            },
        )
    }

    pub fn decide(name: &str, field: &str, yes: Branch, no: Branch, unverified: &str) -> Self {
        Self::new(
            name,
            Action::Decide {
                field: field.to_string(),
                yes,
                no,
                unverified: unverified.to_string(),
            },
        )
    }

    pub fn start_round(
        name: &str,
        kind: &str,
        max_rounds: u32,
        phase: Assignment,
        reply: &str,
        exhausted: Branch,
    ) -> Self {
        Self::new(
            name,
            Action::StartRound {
                kind: kind.to_string(),
                max_rounds,
                phase,
                reply: reply.to_string(),
                exhausted,
            },
        )
    }

    /// Reaction logged under `kind` against the latest `round_kind` entry
    #[allow(clippy::too_many_arguments)]
    pub fn react(
        name: &str,
        round_kind: &str,
        kind: &str,
        max_rounds: u32,
        phase: Assignment,
        reply: &str,
        final_reply: &str,
        no_round: &str,
    ) -> Self {
        Self::new(
            name,
            Action::React {
                round_kind: round_kind.to_string(),
                kind: kind.to_string(),
                max_rounds,
                phase,
                reply: reply.to_string(),
                final_reply: final_reply.to_string(),
                no_round: no_round.to_string(),
            },
        )
    }

    /// Sets the description shown to the language model
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            field: self.action.field().map(str::to_string),
            argument: self.action.argument(),
        }
    }
}

/// Serializable description of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub argument: ArgumentKind,
}

/// Name-indexed set of operations over one schema
///
/// # Invariants
/// - Operation names are unique
/// - Every field an operation writes exists in the schema
/// - The action matches the field's kind (set on text/choice, append on
///   list, flag on flag)
/// - Fixed values written as side effects are valid for their field
#[derive(Debug)]
pub struct OperationRegistry {
    schema: Arc<CaptureSchema>,
    operations: Vec<Operation>,
    index: HashMap<String, usize>,
}

impl OperationRegistry {
    pub fn new(schema: Arc<CaptureSchema>) -> Self {
        Self {
            schema,
            operations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registers an operation
    ///
    /// # Returns
    /// * `Err(CaptureError::UnknownField)` - The operation writes a field the schema lacks
    /// * `Err(CaptureError::Configuration)` - Duplicate name or kind mismatch
    pub fn register(&mut self, operation: Operation) -> CaptureResult<()> {
        if operation.name.trim().is_empty() {
            return Err(CaptureError::Configuration(
                "operation name cannot be empty".to_string(),
            ));
        }
        if self.index.contains_key(&operation.name) {
            return Err(CaptureError::Configuration(format!(
                "duplicate operation '{}'",
                operation.name
            )));
        }

        if let Some(field) = operation.action.field() {
            let def = self.schema.field(field).ok_or_else(|| CaptureError::UnknownField {
                schema: self.schema.name().to_string(),
                field: field.to_string(),
            })?;

            let fits = matches!(
                (&operation.action, &def.kind),
                (Action::Set { .. }, FieldKind::Text)
                    | (Action::Set { .. }, FieldKind::Choice(_))
                    | (Action::LoadCase { .. }, FieldKind::Text)
                    | (Action::Append { .. }, FieldKind::List)
                    | (Action::SetFlag { .. }, FieldKind::Flag)
                    | (Action::Decide { .. }, FieldKind::Flag)
            );
            if !fits {
                return Err(CaptureError::Configuration(format!(
                    "operation '{}' cannot write {:?} field '{}'",
                    operation.name, def.kind, field
                )));
            }
        }

        for assignment in operation.action.assignments() {
            self.check_assignment(&operation.name, assignment)?;
        }

        self.index
            .insert(operation.name.clone(), self.operations.len());
        self.operations.push(operation);
        Ok(())
    }

    /// A fixed value must name a text or choice field and be valid for it
    fn check_assignment(&self, operation: &str, assignment: &Assignment) -> CaptureResult<()> {
        let def = self
            .schema
            .field(&assignment.field)
            .ok_or_else(|| CaptureError::UnknownField {
                schema: self.schema.name().to_string(),
                field: assignment.field.clone(),
            })?;

        if !matches!(def.kind, FieldKind::Text | FieldKind::Choice(_)) {
            return Err(CaptureError::Configuration(format!(
                "operation '{}' cannot assign {:?} field '{}'",
                operation, def.kind, assignment.field
            )));
        }
        def.check(&FieldValue::Text(assignment.value.clone()))
            .map_err(|e| CaptureError::Configuration(format!("operation '{}': {}", operation, e)))
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, operation: Operation) -> CaptureResult<Self> {
        self.register(operation)?;
        Ok(self)
    }

    /// Looks an operation up by name
    pub fn get(&self, name: &str) -> CaptureResult<&Operation> {
        self.index
            .get(name)
            .map(|&i| &self.operations[i])
            .ok_or_else(|| CaptureError::UnknownOperation(name.to_string()))
    }

    /// Operations in registration order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn schema(&self) -> &Arc<CaptureSchema> {
        &self.schema
    }

    pub fn describe(&self) -> Vec<OperationInfo> {
        self.operations.iter().map(Operation::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::schema::FieldDef;

    fn schema() -> Arc<CaptureSchema> {
        Arc::new(
            CaptureSchema::new(
                "coffee",
                "ORD",
                vec![
                    FieldDef::text("size", "Size").required(),
                    FieldDef::list("extras", "Extras"),
                    FieldDef::flag("to_go", "To go"),
                    FieldDef::choice("stage", "Stage", &["open", "served"]),
                ],
                true,
            )
            .unwrap(),
        )
    }

    #[test]
    fn registers_and_looks_up() {
        let registry = OperationRegistry::new(schema())
            .with(Operation::set("update_size", "size", Normalizer::Lowercase, "{{value}}"))
            .unwrap()
            .with(Operation::finalize("complete_order", "done", "missing {{missing}}"))
            .unwrap();

        assert_eq!(registry.operations().len(), 2);
        assert_eq!(registry.get("update_size").unwrap().action.field(), Some("size"));
        assert!(matches!(
            registry.get("fly_away"),
            Err(CaptureError::UnknownOperation(name)) if name == "fly_away"
        ));
    }

    #[test]
    fn rejects_unknown_field() {
        let result = OperationRegistry::new(schema()).with(Operation::set(
            "update_flavor",
            "flavor",
            Normalizer::Trimmed,
            "ok",
        ));

        assert!(matches!(result, Err(CaptureError::UnknownField { field, .. }) if field == "flavor"));
    }

    #[test]
    fn rejects_append_on_text_field() {
        let result = OperationRegistry::new(schema()).with(Operation::append(
            "add_size",
            "size",
            Normalizer::Trimmed,
            "ok",
        ));

        assert!(matches!(result, Err(CaptureError::Configuration(_))));
    }

    #[test]
    fn rejects_set_on_list_and_flag_fields() {
        let mut registry = OperationRegistry::new(schema());

        assert!(registry
            .register(Operation::set("set_extras", "extras", Normalizer::Trimmed, "ok"))
            .is_err());
        assert!(registry
            .register(Operation::set("set_to_go", "to_go", Normalizer::Trimmed, "ok"))
            .is_err());
        assert!(registry
            .register(Operation::set_flag("set_to_go", "to_go", "yes", "no"))
            .is_ok());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = OperationRegistry::new(schema());
        registry
            .register(Operation::check_status("status", "done", "pending"))
            .unwrap();

        let result = registry.register(Operation::check_status("status", "done", "pending"));
        assert!(matches!(result, Err(CaptureError::Configuration(_))));
    }

    #[test]
    fn describes_operations() {
        let registry = OperationRegistry::new(schema())
            .with(
                Operation::append("add_extra", "extras", Normalizer::Lowercase, "{{value}}")
                    .describe("Add an extra to the order"),
            )
            .unwrap();

        let info = serde_json::to_value(registry.describe()).unwrap();
        assert_eq!(info[0]["name"], "add_extra");
        assert_eq!(info[0]["field"], "extras");
        assert_eq!(info[0]["argument"], "text");
    }

    #[test]
    fn argument_deserializes_untagged() {
        let text: Argument = serde_json::from_str(r#""large""#).unwrap();
        let flag: Argument = serde_json::from_str("true").unwrap();

        assert_eq!(text, Argument::Text("large".to_string()));
        assert_eq!(flag, Argument::Flag(true));
    }

    #[test]
    fn checks_side_effect_values() {
        let mut registry = OperationRegistry::new(schema());

        let bad_value = Operation::finalize("serve", "done", "missing").closing("stage", "eaten");
        assert!(matches!(
            registry.register(bad_value),
            Err(CaptureError::Configuration(_))
        ));

        let bad_field = Operation::verify(
            "verify",
            "answer",
            "ok",
            Branch::new("no").set("status", "failed"),
            "load first",
        );
        assert!(matches!(
            registry.register(bad_field),
            Err(CaptureError::UnknownField { field, .. }) if field == "status"
        ));

        let list_target = Operation::finalize("wrap", "done", "missing").closing("extras", "napkin");
        assert!(registry.register(list_target).is_err());

        let valid = Operation::finalize("serve", "done", "missing").closing("stage", "served");
        assert!(registry.register(valid).is_ok());
    }

    #[test]
    fn decide_writes_flag_fields_only() {
        let mut registry = OperationRegistry::new(schema());
        let on_text = Operation::decide("confirm", "size", Branch::new("y"), Branch::new("n"), "wait");
        let on_flag = Operation::decide("confirm", "to_go", Branch::new("y"), Branch::new("n"), "wait");

        assert!(registry.register(on_text).is_err());
        assert!(registry.register(on_flag).is_ok());
        assert_eq!(registry.describe()[0].argument, ArgumentKind::Flag);
    }
}
