use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{RecordStore, StoreError};
use crate::models::{FileRecord, NewFileRecord};

/// Process-local store. Records are kept in insertion order.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<Vec<FileRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, StoreError> {
        let mut records = self.records.write().await;

        if records
            .iter()
            .any(|r| r.id == record.id || r.host_public_id == record.host_public_id)
        {
            return Err(StoreError::Duplicate(record.host_public_id));
        }

        let created = FileRecord {
            id: record.id,
            file_name: record.file_name,
            file_url: record.file_url,
            host_public_id: record.host_public_id,
            host_url: record.host_url,
            file_size: record.file_size,
            mime_type: record.mime_type,
            created_at: Utc::now(),
        };
        records.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_host_id(&self, host_public_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.host_public_id == host_public_id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>, StoreError> {
        // Stable sort over reversed insertion order: equal timestamps list the latest insert first
        let mut all: Vec<FileRecord> = self.records.read().await.iter().rev().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(id: &str) -> NewFileRecord {
        NewFileRecord {
            id: id.to_string(),
            file_name: format!("{id}.png"),
            file_url: format!("http://localhost/api/files/{id}"),
            host_public_id: format!("uploads/{id}"),
            host_url: format!("https://res.example.com/uploads/{id}.png"),
            file_size: 10,
            mime_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn lookups_by_id_and_host_id() {
        let store = MemoryRecordStore::new();
        let created = store.create(new_record("a")).await.unwrap();

        assert_eq!(store.find_by_id("a").await.unwrap(), Some(created.clone()));
        assert_eq!(store.find_by_host_id("uploads/a").await.unwrap(), Some(created));
        assert_eq!(store.find_by_id("uploads/a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn host_id_is_unique() {
        let store = MemoryRecordStore::new();
        store.create(new_record("a")).await.unwrap();

        let mut clash = new_record("b");
        clash.host_public_id = "uploads/a".to_string();
        assert!(matches!(store.create(clash).await, Err(StoreError::Duplicate(_))));
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_all_lists_newest_first() {
        let store = MemoryRecordStore::new();
        for id in ["first", "second", "third"] {
            store.create(new_record(id)).await.unwrap();
        }

        let ids: Vec<String> = store.find_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn deletes_report_what_was_removed() {
        let store = MemoryRecordStore::new();
        store.create(new_record("a")).await.unwrap();
        store.create(new_record("b")).await.unwrap();

        assert!(store.delete_by_id("a").await.unwrap());
        assert!(!store.delete_by_id("a").await.unwrap());
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
