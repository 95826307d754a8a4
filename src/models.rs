use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use chrono::{DateTime, Utc};

/// Metadata persisted for one uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Host id with the folder prefix stripped.
    pub id: String,
    pub file_name: String,
    pub file_url: String,
    pub host_public_id: String,
    pub host_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// A record before the store has stamped its creation time.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub id: String,
    pub file_name: String,
    pub file_url: String,
    pub host_public_id: String,
    pub host_url: String,
    pub file_size: i64,
    pub mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub url: String,
    pub file_name: String,
    pub file_id: String,
    pub size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub data: UploadData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<FileRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }
}

impl From<FileRecord> for UploadData {
    fn from(record: FileRecord) -> Self {
        Self {
            url: record.file_url,
            file_name: record.file_name,
            file_id: record.id,
            size: record.file_size,
        }
    }
}
