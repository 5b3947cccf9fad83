// Capture session
//
// A session owns the single active record of one conversation, together
// with the operation registry of its persona, the observers watching it and
// the repository finalized records go to.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::normalize::{parse_confirmation, parse_yes_no};
use super::observers::{Observer, ObserverList};
use super::prompts::{render, render_owned};
use super::registry::{Action, Argument, Assignment, Branch, OperationRegistry};
use crate::domain::capture::{
    CaptureDocument, CaptureError, CaptureEvent, CaptureResult, CapturedRecord, FieldKind,
    FieldValue, HistoryEntry, RecordStatus,
};
use crate::domain::repositories::RecordRepository;

pub const DEFAULT_PERSIST_TIMEOUT: Duration = Duration::from_millis(2000);

/// Seeded entry the current record was loaded from
#[derive(Debug, Clone)]
struct LoadedCase {
    key_field: String,
    key_value: String,
    entry: Map<String, Value>,
    verified: Option<bool>,
}

/// One conversation capturing records for a persona
pub struct CaptureSession {
    id: Uuid,
    registry: Arc<OperationRegistry>,
    record: CapturedRecord,
    observers: ObserverList,
    repository: Arc<dyn RecordRepository>,
    persist_timeout: Duration,
    case: Option<LoadedCase>,
    last_document: Option<CaptureDocument>,
    started_at: DateTime<Utc>,
    last_active: Instant,
}

impl CaptureSession {
    /// Starts a session with an empty record
    pub fn new(registry: Arc<OperationRegistry>, repository: Arc<dyn RecordRepository>) -> Self {
        let record = CapturedRecord::new(Arc::clone(registry.schema()));
        Self {
            id: Uuid::new_v4(),
            registry,
            record,
            observers: ObserverList::new(),
            repository,
            persist_timeout: DEFAULT_PERSIST_TIMEOUT,
            case: None,
            last_document: None,
            started_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    /// Bounds how long finalize waits on the repository
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record(&self) -> &CapturedRecord {
        &self.record
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Marks the session as used now
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Time since the session was last used
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Whether the caller passed verification against the loaded case
    pub fn is_verified(&self) -> bool {
        self.case.as_ref().is_some_and(|case| case.verified == Some(true))
    }

    /// Document produced by the most recent finalize
    pub fn last_document(&self) -> Option<&CaptureDocument> {
        self.last_document.as_ref()
    }

    pub fn attach(&mut self, observer: Box<dyn Observer>) {
        self.observers.attach(observer);
    }

    /// Subscribes to partial and complete events of this session
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CaptureEvent> {
        self.observers.subscribe()
    }

    /// Writes a field and notifies observers with the partial update
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> CaptureResult<CaptureEvent> {
        let event = self.record.set_field(name, value)?;

        tracing::info!(
            session_id = %self.id,
            field = name,
            completion = self.record.completion_percentage(),
            "Field captured"
        );
        self.observers.publish(&event);
        Ok(event)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.record.get_field(name)
    }

    pub fn push_history(&mut self, kind: &str, detail: &str) -> CaptureResult<()> {
        self.record.push_history(kind, detail)
    }

    /// Finalizes, persists and notifies
    ///
    /// # Returns
    /// * `Ok(CaptureDocument)` - Persisted document
    /// * `Err(CaptureError::Incomplete)` - Required fields missing; nothing changed
    /// * `Err(CaptureError::AlreadyFinalized)` - Call `new_record` first
    /// * `Err(CaptureError::Persistence)` - Save failed or timed out; the
    ///   record is still finalized and observers were still notified
    ///
    /// A record loaded from a seeded case is written over that case's entry;
    /// any other record is appended.
    pub async fn finalize(&mut self) -> CaptureResult<CaptureDocument> {
        let document = self.record.finalize()?;

        let persist = async {
            match &self.case {
                Some(case) => {
                    self.repository
                        .upsert(&case.key_field, &case.key_value, &document)
                        .await
                }
                None => self.repository.save(&document).await,
            }
        };
        let saved = match tokio::time::timeout(self.persist_timeout, persist).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "save timed out after {}ms",
                self.persist_timeout.as_millis()
            )),
        };

        self.observers.publish(&CaptureEvent::Complete {
            record: document.clone(),
        });
        self.last_document = Some(document.clone());

        match saved {
            Ok(()) => {
                tracing::info!(session_id = %self.id, record_id = %document.id, "Record finalized");
                Ok(document)
            }
            Err(reason) => {
                tracing::error!(
                    session_id = %self.id,
                    record_id = %document.id,
                    "Failed to persist record: {}",
                    reason
                );
                Err(CaptureError::Persistence {
                    record_id: document.id.to_string(),
                    reason,
                })
            }
        }
    }

    /// Replaces the current record with an empty one
    pub fn new_record(&mut self) {
        self.record = CapturedRecord::new(Arc::clone(self.registry.schema()));
        self.case = None;
        tracing::debug!(session_id = %self.id, "New record started");
    }

    /// Runs a registered operation and returns the spoken confirmation
    ///
    /// A finalize attempt on an incomplete record is answered with the
    /// operation's `incomplete` reply instead of an error, so the agent can
    /// keep asking. A failed recall falls back to the first-time reply.
    pub async fn invoke(&mut self, name: &str, argument: Option<Argument>) -> CaptureResult<String> {
        let registry = Arc::clone(&self.registry);
        let operation = registry.get(name)?;

        tracing::debug!(session_id = %self.id, operation = name, "Operation invoked");

        match &operation.action {
            Action::Set {
                field,
                normalizer,
                reply,
            }
            | Action::Append {
                field,
                normalizer,
                reply,
            } => {
                let value = normalizer.apply(field, text_argument(field, argument.as_ref())?)?;
                self.set_field(field, FieldValue::Text(value.clone()))?;
                Ok(render(reply, &[("value", &value)]))
            }
            Action::SetFlag { field, yes, no } => {
                let flag = flag_argument(field, argument.as_ref())?;
                self.set_field(field, FieldValue::Flag(flag))?;
                Ok(if flag { yes.clone() } else { no.clone() })
            }
            Action::Log { kind, reply } => {
                let detail = text_argument(kind, argument.as_ref())?.trim();
                if detail.is_empty() {
                    return Err(CaptureError::validation(kind.as_str(), "entry cannot be empty"));
                }
                self.push_history(kind, detail)?;
                Ok(render(reply, &[("value", detail)]))
            }
            Action::CheckStatus { done, pending } => {
                if self.record.is_done() {
                    Ok(render(done, &[("summary", &self.record.summary_text())]))
                } else {
                    Ok(render(pending, &[("missing", &self.missing_labels())]))
                }
            }
            Action::Finalize {
                saved,
                incomplete,
                closing,
            } => {
                self.assign(closing)?;
                match self.finalize().await {
                    Ok(document) => Ok(render_owned(saved, &document_vars(&document))),
                    Err(CaptureError::Incomplete { .. }) => {
                        Ok(render(incomplete, &[("missing", &self.missing_labels())]))
                    }
                    Err(e) => Err(e),
                }
            }
            Action::RecallPrevious { first, previous } => match self.repository.latest().await {
                Ok(Some(document)) => Ok(render(
                    previous,
                    &[
                        ("summary", &document.summary),
                        ("date", &document.timestamp.format("%B %-d").to_string()),
                    ],
                )),
                Ok(None) => Ok(first.clone()),
                Err(reason) => {
                    tracing::warn!(session_id = %self.id, "Could not load previous record: {}", reason);
                    Ok(first.clone())
                }
            },
            Action::LoadCase {
                field,
                normalizer,
                found,
                not_found,
            } => {
                let value = normalizer.apply(field, text_argument(field, argument.as_ref())?)?;
                self.load_case(field, &value, found, not_found).await
            }
            Action::Verify {
                answer_key,
                passed,
                failed,
                no_case,
            } => {
                let answer = text_argument(answer_key, argument.as_ref())?.trim().to_string();
                self.verify(answer_key, &answer, passed, failed, no_case)
            }
            Action::Decide {
                field,
                yes,
                no,
                unverified,
            } => {
                if !self.is_verified() {
                    return Ok(unverified.clone());
                }
                let flag = match argument.as_ref() {
                    Some(Argument::Flag(flag)) => Some(*flag),
                    Some(Argument::Text(text)) => parse_confirmation(text),
                    None => None,
                }
                .ok_or_else(|| CaptureError::validation(field.as_str(), "expected a yes or no answer"))?;
                self.set_field(field, FieldValue::Flag(flag))?;

                let branch = if flag { yes } else { no };
                self.assign(&branch.sets)?;
                tracing::info!(session_id = %self.id, field = field.as_str(), answer = flag, "Decision recorded");
                Ok(render_owned(&branch.reply, &self.case_vars()))
            }
            Action::StartRound {
                kind,
                max_rounds,
                phase,
                reply,
                exhausted,
            } => {
                let played = self.record.history_count(kind) as u32;
                if played >= *max_rounds {
                    self.assign(&exhausted.sets)?;
                    return Ok(exhausted.reply.clone());
                }

                let scenario = text_argument(kind, argument.as_ref())?.trim();
                if scenario.is_empty() {
                    return Err(CaptureError::validation(kind.as_str(), "entry cannot be empty"));
                }
                let round = played + 1;
                self.record.push_history_in(kind, scenario, Some(round))?;
                self.assign(std::slice::from_ref(phase))?;
                tracing::info!(session_id = %self.id, round, "Round started");

                let round = round.to_string();
                Ok(render(reply, &[("round", &round), ("value", scenario)]))
            }
            Action::React {
                round_kind,
                kind,
                max_rounds,
                phase,
                reply,
                final_reply,
                no_round,
            } => {
                let round = self.record.history_count(round_kind) as u32;
                if round == 0 {
                    return Ok(no_round.clone());
                }

                let reaction = text_argument(kind, argument.as_ref())?.trim();
                if reaction.is_empty() {
                    return Err(CaptureError::validation(kind.as_str(), "entry cannot be empty"));
                }
                self.record.push_history_in(kind, reaction, Some(round))?;
                self.assign(std::slice::from_ref(phase))?;

                let template = if round >= *max_rounds { final_reply } else { reply };
                let round = round.to_string();
                Ok(render(template, &[("round", &round), ("value", reaction)]))
            }
        }
    }

    /// Writes fixed values, publishing a partial update for each
    fn assign(&mut self, assignments: &[Assignment]) -> CaptureResult<()> {
        for assignment in assignments {
            self.set_field(&assignment.field, FieldValue::Text(assignment.value.clone()))?;
        }
        Ok(())
    }

    async fn load_case(
        &mut self,
        field: &str,
        value: &str,
        found: &Branch,
        not_found: &str,
    ) -> CaptureResult<String> {
        let entry = match self.repository.find_entry(field, value).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                tracing::info!(session_id = %self.id, field, value, "No case on file");
                return Ok(render(not_found, &[("value", value)]));
            }
            Err(reason) => {
                tracing::error!(session_id = %self.id, "Failed to look up case: {}", reason);
                return Err(CaptureError::Storage(reason));
            }
        };

        let key_value = entry
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or(value)
            .to_string();
        self.set_field(field, FieldValue::Text(key_value.clone()))?;
        self.assign(&found.sets)?;
        self.copy_entry(field, &entry);

        self.case = Some(LoadedCase {
            key_field: field.to_string(),
            key_value,
            entry,
            verified: None,
        });
        tracing::info!(session_id = %self.id, field, value, "Case loaded");
        Ok(render_owned(&found.reply, &self.case_vars()))
    }

    /// Copies every schema field the entry carries into the record
    ///
    /// Values that do not fit their field are skipped.
    fn copy_entry(&mut self, key_field: &str, entry: &Map<String, Value>) {
        let schema = Arc::clone(self.record.schema());
        for def in schema.fields().iter().filter(|def| def.name != key_field) {
            let values = match (&def.kind, entry.get(&def.name)) {
                (FieldKind::Text | FieldKind::Choice(_), Some(Value::String(text))) => {
                    vec![FieldValue::Text(text.clone())]
                }
                (FieldKind::Flag, Some(Value::Bool(flag))) => vec![FieldValue::Flag(*flag)],
                (FieldKind::List, Some(Value::Array(items))) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|item| FieldValue::Text(item.to_string()))
                    .collect(),
                _ => continue,
            };

            for value in values {
                if let Err(e) = self.set_field(&def.name, value) {
                    tracing::debug!(session_id = %self.id, field = def.name.as_str(), "Skipped case value: {}", e);
                }
            }
        }
    }

    fn verify(
        &mut self,
        answer_key: &str,
        answer: &str,
        passed: &str,
        failed: &Branch,
        no_case: &str,
    ) -> CaptureResult<String> {
        let Some(case) = self.case.as_mut() else {
            return Ok(no_case.to_string());
        };

        let ok = case
            .entry
            .get(answer_key)
            .and_then(Value::as_str)
            .is_some_and(|expected| expected.trim().eq_ignore_ascii_case(answer));
        case.verified = Some(ok);

        if ok {
            tracing::info!(session_id = %self.id, "Identity verification passed");
            Ok(render_owned(passed, &self.case_vars()))
        } else {
            tracing::warn!(session_id = %self.id, "Identity verification failed");
            self.assign(&failed.sets)?;
            Ok(render_owned(&failed.reply, &self.case_vars()))
        }
    }

    /// Reply variables: the loaded case's values, overlaid with the record's
    fn case_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .case
            .iter()
            .flat_map(|case| case.entry.iter())
            .filter_map(|(name, value)| spoken(value).map(|text| (name.clone(), text)))
            .collect();
        vars.extend(
            self.record
                .fields_json()
                .iter()
                .filter_map(|(name, value)| spoken(value).map(|text| (name.clone(), text))),
        );
        vars
    }

    fn missing_labels(&self) -> String {
        self.record.missing_labels().collect::<Vec<_>>().join(", ")
    }

    /// Serializable view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            agent: self.record.schema().name().to_string(),
            status: self.record.status(),
            fields: self.record.fields_json(),
            missing: self.record.missing_fields().map(str::to_string).collect(),
            completion_percentage: self.record.completion_percentage(),
            complete: self.record.is_done(),
            summary: self.record.summary_text(),
            history: self.record.history().to_vec(),
            last_record: self.last_document.clone(),
            started_at: self.started_at,
            updated_at: self.record.updated_at(),
        }
    }
}

fn text_argument<'a>(field: &str, argument: Option<&'a Argument>) -> CaptureResult<&'a str> {
    argument
        .and_then(Argument::as_text)
        .ok_or_else(|| CaptureError::validation(field, "expected a text argument"))
}

fn flag_argument(field: &str, argument: Option<&Argument>) -> CaptureResult<bool> {
    let flag = match argument {
        Some(Argument::Flag(flag)) => Some(*flag),
        Some(Argument::Text(text)) => parse_yes_no(text),
        None => None,
    };
    flag.ok_or_else(|| CaptureError::validation(field, "expected a yes or no answer"))
}

/// A JSON value as it would be read out, `None` for nulls and containers
fn spoken(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("yes".to_string()),
        Value::Bool(false) => Some("no".to_string()),
        _ => None,
    }
}

/// Reply variables for a finalized document: its fields plus `summary` and `id`
fn document_vars(document: &CaptureDocument) -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = document
        .fields
        .iter()
        .filter_map(|(name, value)| spoken(value).map(|text| (name.clone(), text)))
        .collect();
    vars.push(("summary".to_string(), document.summary.clone()));
    vars.push(("id".to_string(), document.id.to_string()));
    vars
}

/// Session state as returned by the HTTP API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub agent: String,
    pub status: RecordStatus,
    pub fields: Map<String, Value>,
    pub missing: Vec<String>,
    pub completion_percentage: u8,
    pub complete: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_record: Option<CaptureDocument>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::normalize::Normalizer;
    use crate::agents::registry::Operation;
    use crate::domain::capture::RecordId;
    use crate::domain::capture::schema::{CaptureSchema, FieldDef};
    use crate::infrastructure::repositories::InMemoryRecordRepository;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingRepository;

    #[async_trait]
    impl RecordRepository for FailingRepository {
        async fn save(&self, _document: &CaptureDocument) -> Result<(), String> {
            Err("disk full".to_string())
        }

        async fn find_all(&self) -> Result<Vec<CaptureDocument>, String> {
            Err("disk unreadable".to_string())
        }
    }

    struct SlowRepository;

    #[async_trait]
    impl RecordRepository for SlowRepository {
        async fn save(&self, _document: &CaptureDocument) -> Result<(), String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<CaptureDocument>, String> {
            Ok(vec![])
        }
    }

    fn registry(require_complete: bool) -> Arc<OperationRegistry> {
        let schema = CaptureSchema::new(
            "checkin",
            "CHK",
            vec![
                FieldDef::text("mood", "Mood").required(),
                FieldDef::list("goals", "Goals").required(),
                FieldDef::flag("slept_well", "Slept well"),
            ],
            require_complete,
        )
        .unwrap();

        Arc::new(
            OperationRegistry::new(Arc::new(schema))
                .with(Operation::set("record_mood", "mood", Normalizer::Lowercase, "Noted, {{value}}."))
                .unwrap()
                .with(Operation::append("add_goal", "goals", Normalizer::Trimmed, "Added {{value}}."))
                .unwrap()
                .with(Operation::set_flag("record_sleep", "slept_well", "Glad to hear.", "Sorry to hear."))
                .unwrap()
                .with(Operation::log("note", "note", "Got it."))
                .unwrap()
                .with(Operation::check_status("status", "All set: {{summary}}", "Still need {{missing}}."))
                .unwrap()
                .with(Operation::finalize("finish", "Saved {{id}}.", "Before we finish: {{missing}}."))
                .unwrap()
                .with(Operation::recall_previous("recall", "First check-in!", "Last time: {{summary}}"))
                .unwrap(),
        )
    }

    fn session(require_complete: bool) -> (CaptureSession, Arc<InMemoryRecordRepository>) {
        let repo = Arc::new(InMemoryRecordRepository::new());
        (CaptureSession::new(registry(require_complete), repo.clone()), repo)
    }

    #[tokio::test]
    async fn operations_write_normalized_values() {
        let (mut session, _) = session(true);

        let reply = session.invoke("record_mood", Some("  Calm ".into())).await.unwrap();

        assert_eq!(reply, "Noted, calm.");
        assert_eq!(session.get_field("mood"), Some(&FieldValue::Text("calm".to_string())));
    }

    #[tokio::test]
    async fn flag_operation_accepts_bool_and_text() {
        let (mut session, _) = session(true);

        assert_eq!(session.invoke("record_sleep", Some(true.into())).await.unwrap(), "Glad to hear.");
        assert_eq!(
            session.invoke("record_sleep", Some("no, not really".into())).await.unwrap(),
            "Sorry to hear."
        );
        assert_eq!(session.get_field("slept_well"), Some(&FieldValue::Flag(false)));
        assert!(session.invoke("record_sleep", Some("hmm".into())).await.is_err());
    }

    #[tokio::test]
    async fn missing_argument_is_a_validation_error() {
        let (mut session, _) = session(true);

        let result = session.invoke("record_mood", None).await;
        assert!(matches!(result, Err(CaptureError::Validation { .. })));
    }

    #[tokio::test]
    async fn unknown_operation() {
        let (mut session, _) = session(true);

        let result = session.invoke("order_pizza", None).await;
        assert!(matches!(result, Err(CaptureError::UnknownOperation(_))));
    }

    #[tokio::test]
    async fn status_reports_missing_labels() {
        let (mut session, _) = session(true);
        session.invoke("record_mood", Some("tired".into())).await.unwrap();

        assert_eq!(session.invoke("status", None).await.unwrap(), "Still need Goals.");

        session.invoke("add_goal", Some("walk".into())).await.unwrap();
        assert_eq!(
            session.invoke("status", None).await.unwrap(),
            "All set: Mood: tired; Goals: walk"
        );
    }

    #[tokio::test]
    async fn finalize_operation_on_incomplete_record_asks_for_more() {
        let (mut session, repo) = session(true);
        session.invoke("record_mood", Some("ok".into())).await.unwrap();

        let reply = session.invoke("finish", None).await.unwrap();

        assert_eq!(reply, "Before we finish: Goals.");
        assert_eq!(session.record().status(), RecordStatus::Open);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn finalize_persists_and_notifies() {
        let (mut session, repo) = session(true);
        let mut events = session.subscribe();
        session.invoke("record_mood", Some("happy".into())).await.unwrap();
        session.invoke("add_goal", Some("stretch".into())).await.unwrap();
        session.invoke("note", Some("mentioned a deadline".into())).await.unwrap();

        let document = session.finalize().await.unwrap();

        assert_eq!(repo.len().await, 1);
        assert_eq!(document.fields["goals"], json!(["stretch"]));
        assert_eq!(document.history.len(), 1);
        assert_eq!(session.record().status(), RecordStatus::Finalized);
        assert_eq!(session.last_document(), Some(&document));

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["partial_update", "partial_update", "complete"]);
    }

    #[tokio::test]
    async fn finalize_twice_fails() {
        let (mut session, _) = session(false);
        session.finalize().await.unwrap();

        assert!(matches!(session.finalize().await, Err(CaptureError::AlreadyFinalized)));
        assert!(matches!(
            session.set_field("mood", "late".into()),
            Err(CaptureError::AlreadyFinalized)
        ));
    }

    #[tokio::test]
    async fn new_record_starts_empty() {
        let (mut session, _) = session(false);
        session.set_field("mood", "fine".into()).unwrap();
        session.finalize().await.unwrap();

        session.new_record();

        assert_eq!(session.record().status(), RecordStatus::Open);
        assert!(session.get_field("mood").is_none());
        assert!(session.last_document().is_some());
    }

    #[tokio::test]
    async fn persistence_failure_still_finalizes_and_notifies() {
        let mut session = CaptureSession::new(registry(false), Arc::new(FailingRepository));
        let mut events = session.subscribe();
        session.set_field("mood", "fine".into()).unwrap();

        let result = session.finalize().await;

        assert!(matches!(result, Err(CaptureError::Persistence { reason, .. }) if reason == "disk full"));
        assert_eq!(session.record().status(), RecordStatus::Finalized);
        assert_eq!(events.try_recv().unwrap().kind(), "partial_update");
        assert_eq!(events.try_recv().unwrap().kind(), "complete");
    }

    #[tokio::test]
    async fn persistence_timeout_is_reported() {
        let mut session = CaptureSession::new(registry(false), Arc::new(SlowRepository))
            .with_persist_timeout(Duration::from_millis(10));

        let result = session.finalize().await;

        assert!(matches!(result, Err(CaptureError::Persistence { reason, .. }) if reason.contains("timed out")));
        assert_eq!(session.record().status(), RecordStatus::Finalized);
    }

    #[tokio::test]
    async fn recall_reads_latest_document() {
        let (mut session, _) = session(false);
        assert_eq!(session.invoke("recall", None).await.unwrap(), "First check-in!");

        session.set_field("mood", "great".into()).unwrap();
        session.finalize().await.unwrap();
        session.new_record();

        assert_eq!(session.invoke("recall", None).await.unwrap(), "Last time: Mood: great");
    }

    #[tokio::test]
    async fn recall_failure_falls_back_to_first_reply() {
        let mut session = CaptureSession::new(registry(false), Arc::new(FailingRepository));

        assert_eq!(session.invoke("recall", None).await.unwrap(), "First check-in!");
    }

    #[tokio::test]
    async fn snapshot_reflects_record() {
        let (mut session, _) = session(true);
        session.set_field("mood", "calm".into()).unwrap();

        let snapshot = serde_json::to_value(session.snapshot()).unwrap();

        assert_eq!(snapshot["agent"], "checkin");
        assert_eq!(snapshot["status"], "open");
        assert_eq!(snapshot["completionPercentage"], 50);
        assert_eq!(snapshot["missing"], json!(["goals"]));
        assert_eq!(snapshot["fields"]["goals"], json!([]));
    }

    fn case_registry() -> Arc<OperationRegistry> {
        let schema = CaptureSchema::new(
            "case",
            "CASE",
            vec![
                FieldDef::text("userName", "Name").required(),
                FieldDef::text("merchant", "Merchant"),
                FieldDef::flag("approved", "Approved"),
                FieldDef::choice("status", "Status", &["pending", "failed", "safe", "fraud"]).required(),
                FieldDef::text("outcome", "Outcome"),
            ],
            false,
        )
        .unwrap();

        let found = Branch::new("Found {{userName}}. {{question}}").set("status", "pending");
        let failed = Branch::new("Cannot verify.")
            .set("status", "failed")
            .set("outcome", "verification failed");
        let safe = Branch::new("Marked safe.").set("status", "safe");
        let fraud = Branch::new("Card blocked, {{userName}}.")
            .set("status", "fraud")
            .set("outcome", "card blocked");

        Arc::new(
            OperationRegistry::new(Arc::new(schema))
                .with(Operation::load_case(
                    "load",
                    "userName",
                    Normalizer::Lowercase,
                    found,
                    "No case for {{value}}.",
                ))
                .unwrap()
                .with(Operation::verify(
                    "verify",
                    "answer",
                    "Verified. Did you buy at {{merchant}}?",
                    failed,
                    "Load a case first.",
                ))
                .unwrap()
                .with(Operation::decide("confirm", "approved", safe, fraud, "Verify first."))
                .unwrap(),
        )
    }

    async fn seeded_cases() -> Arc<InMemoryRecordRepository> {
        let repo = Arc::new(InMemoryRecordRepository::new());
        let mut fields = Map::new();
        fields.insert("userName".to_string(), json!("john"));
        fields.insert("merchant".to_string(), json!("ACME"));
        fields.insert("question".to_string(), json!("Favourite colour?"));
        fields.insert("answer".to_string(), json!("Blue"));
        repo.save(&CaptureDocument {
            id: RecordId::generate("CASE", Utc::now()),
            timestamp: Utc::now(),
            fields,
            summary: String::new(),
            history: vec![],
        })
        .await
        .unwrap();
        repo
    }

    #[tokio::test]
    async fn verified_decision_updates_the_seeded_case() {
        let repo = seeded_cases().await;
        let mut session = CaptureSession::new(case_registry(), repo.clone());

        let reply = session.invoke("load", Some("John".into())).await.unwrap();
        assert_eq!(reply, "Found john. Favourite colour?");
        assert_eq!(session.get_field("merchant"), Some(&FieldValue::Text("ACME".to_string())));

        assert_eq!(session.invoke("confirm", Some(false.into())).await.unwrap(), "Verify first.");
        assert!(session.get_field("approved").is_none());

        let reply = session.invoke("verify", Some(" blue ".into())).await.unwrap();
        assert_eq!(reply, "Verified. Did you buy at ACME?");

        let unclear = session.invoke("confirm", Some("yes, it's fraud".into())).await;
        assert!(matches!(unclear, Err(CaptureError::Validation { .. })));

        let reply = session
            .invoke("confirm", Some("no, that wasn't me".into()))
            .await
            .unwrap();
        assert_eq!(reply, "Card blocked, john.");
        assert_eq!(session.get_field("status"), Some(&FieldValue::Text("fraud".to_string())));

        session.finalize().await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fields["status"], json!("fraud"));
        assert_eq!(all[0].fields["approved"], json!(false));
    }

    #[tokio::test]
    async fn wrong_answer_fails_verification() {
        let repo = seeded_cases().await;
        let mut session = CaptureSession::new(case_registry(), repo);
        session.invoke("load", Some("john".into())).await.unwrap();

        let reply = session.invoke("verify", Some("green".into())).await.unwrap();

        assert_eq!(reply, "Cannot verify.");
        assert!(!session.is_verified());
        assert_eq!(session.get_field("status"), Some(&FieldValue::Text("failed".to_string())));
        assert_eq!(
            session.get_field("outcome"),
            Some(&FieldValue::Text("verification failed".to_string()))
        );
        assert_eq!(session.invoke("confirm", Some(true.into())).await.unwrap(), "Verify first.");
    }

    #[tokio::test]
    async fn unknown_case_and_verify_before_load() {
        let repo = seeded_cases().await;
        let mut session = CaptureSession::new(case_registry(), repo);

        assert_eq!(session.invoke("verify", Some("blue".into())).await.unwrap(), "Load a case first.");
        assert_eq!(session.invoke("load", Some("Zoe".into())).await.unwrap(), "No case for zoe.");
        assert!(session.get_field("userName").is_none());
    }

    #[tokio::test]
    async fn failed_case_lookup_is_a_storage_error() {
        let mut session = CaptureSession::new(case_registry(), Arc::new(FailingRepository));

        let result = session.invoke("load", Some("john".into())).await;
        assert!(matches!(result, Err(CaptureError::Storage(reason)) if reason == "disk unreadable"));
    }

    fn show_registry() -> Arc<OperationRegistry> {
        let schema = CaptureSchema::new(
            "show",
            "SHOW",
            vec![
                FieldDef::text("player", "Player"),
                FieldDef::choice("phase", "Phase", &["intro", "awaiting", "reacting", "done"]),
            ],
            false,
        )
        .unwrap();

        Arc::new(
            OperationRegistry::new(Arc::new(schema))
                .with(Operation::start_round(
                    "start",
                    "round",
                    2,
                    Assignment::new("phase", "awaiting"),
                    "Round {{round}}: {{value}}",
                    Branch::new("That's all.").set("phase", "done"),
                ))
                .unwrap()
                .with(Operation::react(
                    "react",
                    "round",
                    "reaction",
                    2,
                    Assignment::new("phase", "reacting"),
                    "{{value}} Next!",
                    "{{value}} That was the last one.",
                    "Start a round first.",
                ))
                .unwrap()
                .with(Operation::finalize("end", "Bye!", "Not yet.").closing("phase", "done"))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn rounds_are_capped_and_reactions_attach_to_them() {
        let (mut session, repo) = {
            let repo = Arc::new(InMemoryRecordRepository::new());
            (CaptureSession::new(show_registry(), repo.clone()), repo)
        };
        let phase = |session: &CaptureSession| session.get_field("phase").cloned();

        assert_eq!(session.invoke("react", Some("ha".into())).await.unwrap(), "Start a round first.");

        let reply = session.invoke("start", Some("lost luggage".into())).await.unwrap();
        assert_eq!(reply, "Round 1: lost luggage");
        assert_eq!(phase(&session), Some(FieldValue::Text("awaiting".to_string())));

        assert_eq!(session.invoke("react", Some("Nice.".into())).await.unwrap(), "Nice. Next!");
        assert_eq!(phase(&session), Some(FieldValue::Text("reacting".to_string())));

        session.invoke("start", Some("alien tourist".into())).await.unwrap();
        let reply = session.invoke("react", Some("Bold.".into())).await.unwrap();
        assert_eq!(reply, "Bold. That was the last one.");

        assert_eq!(session.invoke("start", Some("one more".into())).await.unwrap(), "That's all.");
        assert_eq!(phase(&session), Some(FieldValue::Text("done".to_string())));
        assert_eq!(session.record().history_count("round"), 2);

        let rounds: Vec<_> = session
            .record()
            .history()
            .iter()
            .map(|entry| (entry.kind.as_str(), entry.round))
            .collect();
        assert_eq!(
            rounds,
            vec![
                ("round", Some(1)),
                ("reaction", Some(1)),
                ("round", Some(2)),
                ("reaction", Some(2)),
            ]
        );

        assert_eq!(session.invoke("end", None).await.unwrap(), "Bye!");
        assert_eq!(repo.find_all().await.unwrap()[0].fields["phase"], json!("done"));
    }

    #[tokio::test]
    async fn idle_time_resets_on_touch() {
        let (mut session, _) = session(false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.idle_for() >= Duration::from_millis(20));

        session.touch();
        assert!(session.idle_for() < Duration::from_millis(20));
    }
}
