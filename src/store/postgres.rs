use async_trait::async_trait;
use sqlx::PgPool;

use super::{RecordStore, StoreError};
use crate::models::{FileRecord, NewFileRecord};

const COLUMNS: &str =
    "id, file_name, file_url, host_public_id, host_url, file_size, mime_type, created_at";

// PostgreSQL-backed record store
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique violations to `StoreError::Duplicate`.
fn insert_error(err: sqlx::Error, host_public_id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(host_public_id.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, StoreError> {
        let query = format!(
            "INSERT INTO files (id, file_name, file_url, host_public_id, host_url, file_size, mime_type) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {COLUMNS}"
        );

        sqlx::query_as::<_, FileRecord>(&query)
            .bind(&record.id)
            .bind(&record.file_name)
            .bind(&record.file_url)
            .bind(&record.host_public_id)
            .bind(&record.host_url)
            .bind(record.file_size)
            .bind(&record.mime_type)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| insert_error(e, &record.host_public_id))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM files WHERE id = $1");
        Ok(sqlx::query_as::<_, FileRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_host_id(&self, host_public_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM files WHERE host_public_id = $1");
        Ok(sqlx::query_as::<_, FileRecord>(&query)
            .bind(host_public_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM files ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, FileRecord>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM files")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
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

    #[sqlx::test]
    async fn create_round_trips_every_column(pool: PgPool) {
        let store = PgRecordStore::new(pool);
        let created = store.create(new_record("a")).await.unwrap();

        assert_eq!(created.id, "a");
        assert_eq!(created.file_name, "a.png");
        assert_eq!(created.host_public_id, "uploads/a");
        assert_eq!(created.file_size, 10);
        assert_eq!(created.mime_type, "image/png");

        assert_eq!(store.find_by_id("a").await.unwrap(), Some(created.clone()));
        assert_eq!(store.find_by_host_id("uploads/a").await.unwrap(), Some(created));
        assert_eq!(store.find_by_id("uploads/a").await.unwrap(), None);
    }

    #[sqlx::test]
    async fn host_id_clash_is_duplicate(pool: PgPool) {
        let store = PgRecordStore::new(pool);
        store.create(new_record("a")).await.unwrap();

        let mut clash = new_record("b");
        clash.host_public_id = "uploads/a".to_string();
        match store.create(clash).await {
            Err(StoreError::Duplicate(host_id)) => assert_eq!(host_id, "uploads/a"),
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn find_all_lists_newest_first(pool: PgPool) {
        let store = PgRecordStore::new(pool.clone());
        for id in ["first", "second", "third"] {
            store.create(new_record(id)).await.unwrap();
        }

        // Spread the timestamps so the order does not rely on NOW() resolution
        for (id, minutes_ago) in [("first", 30), ("second", 20), ("third", 10)] {
            sqlx::query("UPDATE files SET created_at = NOW() - make_interval(mins => $2) WHERE id = $1")
                .bind(id)
                .bind(minutes_ago)
                .execute(&pool)
                .await
                .unwrap();
        }

        let ids: Vec<String> = store.find_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["third", "second", "first"]);
    }

    #[sqlx::test]
    async fn deletes_report_what_was_removed(pool: PgPool) {
        let store = PgRecordStore::new(pool);
        store.create(new_record("a")).await.unwrap();
        store.create(new_record("b")).await.unwrap();

        assert!(!store.delete_by_id("missing").await.unwrap());
        assert!(store.delete_by_id("a").await.unwrap());
        assert!(!store.delete_by_id("a").await.unwrap());
        assert_eq!(store.delete_all().await.unwrap(), 1);
        assert_eq!(store.delete_all().await.unwrap(), 0);
        assert!(store.find_all().await.unwrap().is_empty());
    }
}
