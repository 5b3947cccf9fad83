use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::domain::capture::CaptureDocument;
use crate::domain::repositories::{key_matches, RecordRepository};

/// JSON log implementation of RecordRepository
///
/// Keeps every document of a collection in a single file shaped as
/// `{ "<collection>": [doc, doc, ...] }`. Each save reads the file, appends
/// and rewrites it. Other top-level keys and entries that are not capture
/// documents (seed data, older formats) are preserved as they are, and can
/// be looked up with `find_entry` and updated in place with `upsert`.
pub struct JsonLogRepository {
    path: PathBuf,
    collection: String,
    write_lock: Mutex<()>,
}

impl JsonLogRepository {
    /// Creates a new JsonLogRepository
    ///
    /// # Arguments
    /// * `path` - Location of the JSON log file (created on first save)
    /// * `collection` - Top-level key holding the document array
    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_log(&self) -> Result<Map<String, Value>, String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Map::new()),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| format!("Failed to parse {}: {}", self.path.display(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(format!("Failed to read {}: {}", self.path.display(), e)),
        }
    }

    fn entries_mut<'a>(&self, log: &'a mut Map<String, Value>) -> Result<&'a mut Vec<Value>, String> {
        match log
            .entry(self.collection.clone())
            .or_insert_with(|| Value::Array(vec![]))
        {
            Value::Array(entries) => Ok(entries),
            _ => Err(format!(
                "'{}' in {} is not an array",
                self.collection,
                self.path.display()
            )),
        }
    }

    async fn write_log(&self, log: Map<String, Value>) -> Result<(), String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }

        let text = serde_json::to_string_pretty(&Value::Object(log))
            .map_err(|e| format!("Failed to encode log: {}", e))?;
        tokio::fs::write(&self.path, text)
            .await
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))
    }
}

/// Whether a raw log entry carries `key == value` at the top level or
/// inside its `fields` object
fn entry_matches(entry: &Value, key: &str, value: &str) -> bool {
    key_matches(entry.get(key), value)
        || key_matches(entry.get("fields").and_then(|fields| fields.get(key)), value)
}

/// Top-level values of an entry overlaid with its non-null `fields`
fn flatten_entry(entry: &Value) -> Map<String, Value> {
    let mut flat = entry.as_object().cloned().unwrap_or_default();
    if let Some(Value::Object(fields)) = flat.remove("fields") {
        flat.extend(fields.into_iter().filter(|(_, v)| !v.is_null()));
    }
    flat
}

/// Writes a document over a seeded entry
///
/// Every captured value is also written at the top level, over the seeded
/// one, so readers of the seed format see the outcome. Seeded keys the
/// document lacks (security questions, identifiers) are kept. The
/// document's own keys are added so the entry reads back as a document.
fn merge_into(entry: &mut Value, document: Value) {
    let (Value::Object(target), Value::Object(source)) = (entry, document) else {
        return;
    };

    if let Some(Value::Object(fields)) = source.get("fields") {
        for (key, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
            target.insert(key.clone(), value.clone());
        }
    }
    target.extend(source);
}

#[async_trait]
impl RecordRepository for JsonLogRepository {
    async fn save(&self, document: &CaptureDocument) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;

        let mut log = self.read_log().await?;
        let entry = serde_json::to_value(document)
            .map_err(|e| format!("Failed to encode record {}: {}", document.id, e))?;
        self.entries_mut(&mut log)?.push(entry);
        self.write_log(log).await?;

        tracing::info!(record_id = %document.id, path = %self.path.display(), "Record appended to log");
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<CaptureDocument>, String> {
        let mut log = self.read_log().await?;

        let entries = match log.remove(&self.collection) {
            Some(Value::Array(entries)) => entries,
            _ => return Ok(vec![]),
        };

        Ok(entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    async fn find_entry(&self, key: &str, value: &str) -> Result<Option<Map<String, Value>>, String> {
        let log = self.read_log().await?;

        Ok(log
            .get(&self.collection)
            .and_then(Value::as_array)
            .and_then(|entries| entries.iter().rev().find(|e| entry_matches(e, key, value)))
            .map(flatten_entry))
    }

    async fn upsert(&self, key: &str, value: &str, document: &CaptureDocument) -> Result<(), String> {
        let _guard = self.write_lock.lock().await;

        let mut log = self.read_log().await?;
        let encoded = serde_json::to_value(document)
            .map_err(|e| format!("Failed to encode record {}: {}", document.id, e))?;

        let entries = self.entries_mut(&mut log)?;
        let updated = match entries.iter_mut().rev().find(|e| entry_matches(e, key, value)) {
            Some(entry) => {
                merge_into(entry, encoded);
                true
            }
            None => {
                entries.push(encoded);
                false
            }
        };
        self.write_log(log).await?;

        if updated {
            tracing::info!(record_id = %document.id, key, value, "Log entry updated in place");
        } else {
            tracing::info!(record_id = %document.id, key, value, "No entry to update, record appended");
        }
        Ok(())
    }
}
