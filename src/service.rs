//! Upload, retrieval and deletion flows over one media host and one record store.
//!
//! Deleting touches two systems. The host goes first; if the store step then
//! fails, the record points at bytes that no longer exist. That window is not
//! reconciled automatically: the failure is logged with the record id so it can
//! be cleaned up by hand.

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    models::{FileRecord, NewFileRecord},
    storage::{HostStream, MediaHost, MediaHostBackend},
    store::{RecordStore, RecordStoreBackend},
};

/// Bytes of a stored image plus what the response headers need.
pub struct FetchedFile {
    pub stream: HostStream,
    pub content_type: String,
    pub file_name: String,
}

#[derive(Clone)]
pub struct FileService<S = RecordStoreBackend> {
    host: MediaHostBackend,
    store: S,
    folder: String,
}

impl<S: RecordStore> FileService<S> {
    pub fn new(host: MediaHostBackend, store: S, folder: impl Into<String>) -> Self {
        Self {
            host,
            store,
            folder: folder.into(),
        }
    }

    /// Host-side prefix shared by every upload, e.g. `uploads/`.
    fn prefix(&self) -> String {
        format!("{}/", self.folder)
    }

    /// Checks quota, uploads to the host and records the result.
    /// `base_url` is the public files endpoint the record id is appended to.
    pub async fn upload(
        &self,
        content: Bytes,
        mime_type: &str,
        original_name: &str,
        base_url: &str,
    ) -> Result<FileRecord, AppError> {
        if content.is_empty() {
            return Err(AppError::NoFile);
        }

        let usage = self.host.usage().await.map_err(|e| {
            error!("Error checking media host usage: {}", e);
            AppError::QuotaUnavailable(e)
        })?;

        if usage.is_exhausted() {
            let limit = usage.limit.unwrap_or_default();
            warn!("Media host storage limit reached ({} of {} bytes)", usage.used, limit);
            return Err(AppError::QuotaExceeded { used: usage.used, limit });
        }

        let hosted = self
            .host
            .upload(content, mime_type, original_name)
            .await
            .map_err(|e| AppError::UploadFailed(e.into()))?;

        let prefix = self.prefix();
        let id = hosted
            .public_id
            .strip_prefix(&prefix)
            .unwrap_or(&hosted.public_id)
            .to_string();

        let record = NewFileRecord {
            file_url: format!("{}/{}", base_url.trim_end_matches('/'), id),
            id,
            file_name: original_name.to_string(),
            host_public_id: hosted.public_id.clone(),
            host_url: hosted.url,
            file_size: i64::try_from(hosted.bytes).unwrap_or(i64::MAX),
            mime_type: mime_type.to_string(),
        };

        let created = self.store.create(record).await.map_err(|e| {
            error!("Stored {} on the media host but could not record it: {}", hosted.public_id, e);
            AppError::UploadFailed(e.into())
        })?;

        info!("File uploaded: {} ({} bytes)", created.id, created.file_size);
        Ok(created)
    }

    /// Opens the stored bytes of the record whose host id is `<folder>/<record_id>`.
    pub async fn fetch(&self, record_id: &str) -> Result<FetchedFile, AppError> {
        let host_id = format!("{}{}", self.prefix(), record_id);

        let record = self
            .store
            .find_by_host_id(&host_id)
            .await
            .map_err(|e| AppError::FetchFailed(e.into()))?
            .ok_or(AppError::NotFound)?;

        let stream = self
            .host
            .fetch(&record.host_public_id, &record.host_url)
            .await
            .map_err(|e| AppError::FetchFailed(e.into()))?;

        Ok(FetchedFile {
            stream,
            content_type: record.mime_type,
            file_name: record.file_name,
        })
    }

    /// Deletes from the host, then from the store.
    pub async fn remove(&self, record_id: &str) -> Result<(), AppError> {
        let record = self
            .store
            .find_by_id(record_id)
            .await
            .map_err(|e| AppError::DeleteFailed(e.into()))?
            .ok_or(AppError::NotFound)?;

        self.host
            .delete(&record.host_public_id)
            .await
            .map_err(|e| AppError::DeleteFailed(e.into()))?;

        match self.store.delete_by_id(&record.id).await {
            Ok(true) => {}
            Ok(false) => warn!("Record {} was already gone from the store", record.id),
            Err(e) => {
                error!(
                    "Deleted {} from the media host but record {} remains: {}",
                    record.host_public_id, record.id, e
                );
                return Err(AppError::DeleteFailed(e.into()));
            }
        }

        info!("File deleted: {}", record.id);
        Ok(())
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<FileRecord>, AppError> {
        self.store
            .find_all()
            .await
            .map_err(|e| AppError::ListFailed(e.into()))
    }

    /// Empties the host folder, then the store. Returns how many records were removed.
    pub async fn clear_all(&self) -> Result<u64, AppError> {
        let prefix = self.prefix();

        let hosted = self.host.delete_by_prefix(&prefix).await.map_err(|e| {
            error!("Failed to clear {} on the media host: {}", prefix, e);
            AppError::ClearFailed(e.into())
        })?;

        let records = self.store.delete_all().await.map_err(|e| {
            error!("Cleared {} on the media host but records remain: {}", prefix, e);
            AppError::ClearFailed(e.into())
        })?;

        info!("Cleared {} hosted files and {} records", hosted, records);
        Ok(records)
    }
}
