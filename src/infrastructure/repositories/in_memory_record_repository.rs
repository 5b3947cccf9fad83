use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::capture::CaptureDocument;
use crate::domain::repositories::{key_matches, RecordRepository};

/// In-process implementation of RecordRepository
///
/// Nothing is written to disk; documents live as long as the repository.
#[derive(Default)]
pub struct InMemoryRecordRepository {
    documents: RwLock<Vec<CaptureDocument>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn save(&self, document: &CaptureDocument) -> Result<(), String> {
        self.documents.write().await.push(document.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<CaptureDocument>, String> {
        Ok(self.documents.read().await.clone())
    }

    async fn upsert(&self, key: &str, value: &str, document: &CaptureDocument) -> Result<(), String> {
        let mut documents = self.documents.write().await;
        match documents
            .iter_mut()
            .rev()
            .find(|doc| key_matches(doc.fields.get(key), value))
        {
            Some(existing) => *existing = document.clone(),
            None => documents.push(document.clone()),
        }
        Ok(())
    }
}
