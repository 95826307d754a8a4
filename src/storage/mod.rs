// Submodules for the Cloudinary media host and the S3-compatible host
mod cloudinary;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use tracing::info;

pub use cloudinary::CloudinaryHost;
pub use s3::S3Host;

use crate::config::{Config, MediaHostKind};

// Media host error types
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Request to media host failed: {0}")]
    Request(String), // Transport level failure (connect, timeout, TLS)

    #[error("Media host responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected media host response: {0}")]
    Decode(String),

    #[error("Upload Error: {0}")]
    Upload(String),

    #[error("Fetch Error: {0}")]
    Fetch(String),

    #[error("Delete Error: {0}")]
    Delete(String),
}

/// Storage figures reported by the host, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub used: u64,
    /// `None` when the host reports no limit.
    pub limit: Option<u64>,
}

impl StorageUsage {
    pub fn is_exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.used >= limit)
    }
}

/// What the host hands back after a successful upload.
#[derive(Debug, Clone)]
pub struct HostedObject {
    /// Host reference, always `<folder>/<id>`.
    pub public_id: String,
    /// Direct link to the stored bytes.
    pub url: String,
    pub bytes: u64,
}

pub type HostStream = BoxStream<'static, Result<Bytes, HostError>>;

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Current storage usage of the account or bucket.
    async fn usage(&self) -> Result<StorageUsage, HostError>;

    /// Upload bytes under the configured folder.
    async fn upload(&self, content: Bytes, mime_type: &str, file_name: &str)
    -> Result<HostedObject, HostError>;

    /// Open a stream over the stored bytes. Fails before yielding anything
    /// if the host refuses the request.
    async fn fetch(&self, public_id: &str, url: &str) -> Result<HostStream, HostError>;

    async fn delete(&self, public_id: &str) -> Result<(), HostError>;

    /// Delete every object whose id starts with `prefix`. Returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, HostError>;
}

// Enum to represent media hosts
#[derive(Clone)]
pub enum MediaHostBackend {
    Cloudinary(CloudinaryHost),
    S3(S3Host), // AWS S3 or MinIO
}

// Delegates calls to the chosen backend
#[async_trait]
impl MediaHost for MediaHostBackend {
    async fn usage(&self) -> Result<StorageUsage, HostError> {
        match self {
            MediaHostBackend::Cloudinary(h) => h.usage().await,
            MediaHostBackend::S3(h) => h.usage().await,
        }
    }

    async fn upload(&self, content: Bytes, mime_type: &str, file_name: &str)
    -> Result<HostedObject, HostError> {
        match self {
            MediaHostBackend::Cloudinary(h) => h.upload(content, mime_type, file_name).await,
            MediaHostBackend::S3(h) => h.upload(content, mime_type, file_name).await,
        }
    }

    async fn fetch(&self, public_id: &str, url: &str) -> Result<HostStream, HostError> {
        match self {
            MediaHostBackend::Cloudinary(h) => h.fetch(public_id, url).await,
            MediaHostBackend::S3(h) => h.fetch(public_id, url).await,
        }
    }

    async fn delete(&self, public_id: &str) -> Result<(), HostError> {
        match self {
            MediaHostBackend::Cloudinary(h) => h.delete(public_id).await,
            MediaHostBackend::S3(h) => h.delete(public_id).await,
        }
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, HostError> {
        match self {
            MediaHostBackend::Cloudinary(h) => h.delete_by_prefix(prefix).await,
            MediaHostBackend::S3(h) => h.delete_by_prefix(prefix).await,
        }
    }
}

// Initialize the media host based on config
pub async fn init_media_host(config: &Config) -> Result<MediaHostBackend, HostError> {
    match config.media_host {
        MediaHostKind::Cloudinary => {
            info!("Initializing Cloudinary media host");
            Ok(MediaHostBackend::Cloudinary(CloudinaryHost::new(config)?))
        }
        MediaHostKind::S3 => {
            info!("Initializing S3 media host");
            Ok(MediaHostBackend::S3(S3Host::new(config).await))
        }
    }
}
