// Record persistence: PostgreSQL for deployments, in-memory for development and tests
mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::{
    config::{Config, RecordStoreKind},
    database::init_db,
    models::{FileRecord, NewFileRecord},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record already exists: {0}")]
    Duplicate(String), // Unique id or host id violated
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, StoreError>;

    async fn find_by_host_id(&self, host_public_id: &str) -> Result<Option<FileRecord>, StoreError>;

    /// All records, newest first.
    async fn find_all(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    /// Returns how many records were removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub enum RecordStoreBackend {
    Postgres(PgRecordStore),
    Memory(MemoryRecordStore),
}

#[async_trait]
impl RecordStore for RecordStoreBackend {
    async fn create(&self, record: NewFileRecord) -> Result<FileRecord, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.create(record).await,
            RecordStoreBackend::Memory(s) => s.create(record).await,
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<FileRecord>, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.find_by_id(id).await,
            RecordStoreBackend::Memory(s) => s.find_by_id(id).await,
        }
    }

    async fn find_by_host_id(&self, host_public_id: &str) -> Result<Option<FileRecord>, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.find_by_host_id(host_public_id).await,
            RecordStoreBackend::Memory(s) => s.find_by_host_id(host_public_id).await,
        }
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.find_all().await,
            RecordStoreBackend::Memory(s) => s.find_all().await,
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.delete_by_id(id).await,
            RecordStoreBackend::Memory(s) => s.delete_by_id(id).await,
        }
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        match self {
            RecordStoreBackend::Postgres(s) => s.delete_all().await,
            RecordStoreBackend::Memory(s) => s.delete_all().await,
        }
    }
}

// Initialize the record store based on config
pub async fn init_store(config: &Config) -> Result<RecordStoreBackend, StoreError> {
    match (config.record_store, config.database_url.as_deref()) {
        (RecordStoreKind::Postgres, Some(url)) => {
            let pool = init_db(url).await?;
            Ok(RecordStoreBackend::Postgres(PgRecordStore::new(pool)))
        }
        (RecordStoreKind::Postgres, None) => Err(StoreError::Database(sqlx::Error::Configuration(
            "DATABASE_URL is not set".into(),
        ))),
        (RecordStoreKind::Memory, _) => {
            info!("Using in-memory record store; records are lost on restart");
            Ok(RecordStoreBackend::Memory(MemoryRecordStore::new()))
        }
    }
}
