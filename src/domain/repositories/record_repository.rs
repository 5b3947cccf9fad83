use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::capture::CaptureDocument;

/// Repository trait for finalized capture documents
///
/// Defines the contract for persisting and reading back finalized records.
/// Writes are best-effort: a failed save is reported but never retried.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Append a finalized document to the collection
    async fn save(&self, document: &CaptureDocument) -> Result<(), String>;

    /// All documents in the collection, oldest first
    async fn find_all(&self) -> Result<Vec<CaptureDocument>, String>;

    /// Find a document by its record id
    async fn find_by_id(&self, id: &str) -> Result<Option<CaptureDocument>, String> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .find(|doc| doc.id.as_str() == id))
    }

    /// The most recently saved document, if any
    async fn latest(&self) -> Result<Option<CaptureDocument>, String> {
        Ok(self.find_all().await?.pop())
    }

    /// Find the entry whose `key` equals `value` (case-insensitive)
    ///
    /// Returns the entry's values as a flat map. Stores holding seeded data
    /// (entries that are not capture documents) override this to search
    /// those entries too.
    async fn find_entry(&self, key: &str, value: &str) -> Result<Option<Map<String, Value>>, String> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .rev()
            .find(|doc| key_matches(doc.fields.get(key), value))
            .map(|doc| doc.fields))
    }

    /// Write `document` over the entry whose `key` equals `value`
    ///
    /// Appends when no entry matches. The default always appends.
    async fn upsert(&self, _key: &str, _value: &str, document: &CaptureDocument) -> Result<(), String> {
        self.save(document).await
    }
}

/// True when `candidate` is a string equal to `value`, ignoring case and
/// surrounding whitespace
pub fn key_matches(candidate: Option<&Value>, value: &str) -> bool {
    candidate
        .and_then(Value::as_str)
        .is_some_and(|text| text.trim().eq_ignore_ascii_case(value.trim()))
}
