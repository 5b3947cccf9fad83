use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::capture::CaptureDocument;
use crate::domain::repositories::RecordRepository;

/// One-file-per-record implementation of RecordRepository
///
/// Each finalized document is written to `<dir>/<record id>.json`.
/// Used for orders, where every record is handed off on its own. Several
/// personas can share a directory; an id prefix keeps their listings apart.
pub struct JsonDirectoryRepository {
    dir: PathBuf,
    id_prefix: Option<String>,
}

impl JsonDirectoryRepository {
    /// Creates a new JsonDirectoryRepository
    ///
    /// # Arguments
    /// * `dir` - Directory receiving the documents (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            id_prefix: None,
        }
    }

    /// Only list documents whose id starts with `prefix`
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn owns(&self, document: &CaptureDocument) -> bool {
        self.id_prefix
            .as_deref()
            .map_or(true, |prefix| document.id.as_str().starts_with(prefix))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl RecordRepository for JsonDirectoryRepository {
    async fn save(&self, document: &CaptureDocument) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| format!("Failed to create {}: {}", self.dir.display(), e))?;

        let path = self.path_for(document.id.as_str());
        let text = serde_json::to_string_pretty(document)
            .map_err(|e| format!("Failed to encode record {}: {}", document.id, e))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        tracing::info!(record_id = %document.id, path = %path.display(), "Record saved");
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<CaptureDocument>, String> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(format!("Failed to read {}: {}", self.dir.display(), e)),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read {}: {}", self.dir.display(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            match serde_json::from_str::<CaptureDocument>(&text) {
                Ok(doc) if self.owns(&doc) => documents.push(doc),
                Ok(_) => {}
                Err(e) => tracing::debug!(path = %path.display(), "Skipping non-record file: {}", e),
            }
        }

        documents.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(documents)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<CaptureDocument>, String> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| format!("Failed to parse {}: {}", path.display(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read {}: {}", path.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::RecordId;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map};

    fn order(drink: &str, minutes_ago: i64) -> CaptureDocument {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        let mut fields = Map::new();
        fields.insert("drinkType".to_string(), json!(drink));
        CaptureDocument {
            id: RecordId::generate("ORD", at),
            timestamp: at,
            fields,
            summary: format!("Drink: {}", drink),
            history: vec![],
        }
    }

    #[tokio::test]
    async fn save_writes_one_file_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonDirectoryRepository::new(dir.path().join("orders"));
        let doc = order("latte", 0);

        repo.save(&doc).await.unwrap();

        let path = dir.path().join("orders").join(format!("{}.json", doc.id));
        assert!(path.exists());
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["fields"]["drinkType"], json!("latte"));
    }

    #[tokio::test]
    async fn find_all_sorts_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonDirectoryRepository::new(dir.path());

        repo.save(&order("mocha", 1)).await.unwrap();
        repo.save(&order("americano", 10)).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].summary, "Drink: americano");
        assert_eq!(all[1].summary, "Drink: mocha");
    }

    #[tokio::test]
    async fn id_prefix_filters_shared_directory() {
        let dir = tempfile::tempdir().unwrap();
        let coffee = JsonDirectoryRepository::new(dir.path()).with_id_prefix("ORD");
        let grocery = JsonDirectoryRepository::new(dir.path()).with_id_prefix("GRO");

        coffee.save(&order("flat white", 0)).await.unwrap();
        let mut basket = order("bread", 0);
        basket.id = RecordId::generate("GRO", basket.timestamp);
        grocery.save(&basket).await.unwrap();

        assert_eq!(coffee.find_all().await.unwrap().len(), 1);
        assert_eq!(grocery.find_all().await.unwrap()[0].id, basket.id);
    }

    #[tokio::test]
    async fn missing_directory_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonDirectoryRepository::new(dir.path().join("absent"));

        assert!(repo.find_all().await.unwrap().is_empty());
        assert!(repo.find_by_id("ORD-x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_by_id_reads_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonDirectoryRepository::new(dir.path());
        let doc = order("cappuccino", 0);

        repo.save(&doc).await.unwrap();

        let found = repo.find_by_id(doc.id.as_str()).await.unwrap();
        assert_eq!(found, Some(doc));
    }
}
