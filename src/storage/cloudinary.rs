use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, Response, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    config::{Config, SignatureAlgorithm},
    storage::{HostError, HostStream, HostedObject, MediaHost, StorageUsage},
};

// Cloudinary upload and admin API client
#[derive(Clone)]
pub struct CloudinaryHost {
    client: Client,
    api_base: String, // e.g. https://api.cloudinary.com
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String, // Namespace prefix for every upload
    signature_algorithm: SignatureAlgorithm,
    timeout: Duration, // Whole-call limit for API requests, not for asset downloads
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    storage: StorageFigures,
}

#[derive(Debug, Deserialize)]
struct StorageFigures {
    usage: u64,
    #[serde(default)]
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResourcesResponse {
    #[serde(default)]
    deleted: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    partial: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl CloudinaryHost {
    pub fn new(config: &Config) -> Result<Self, HostError> {
        // Total timeouts are set per API call; a client-wide one would also
        // bound streamed downloads.
        let client = Client::builder()
            .connect_timeout(config.host_timeout())
            .read_timeout(config.host_timeout())
            .build()
            .map_err(|e| HostError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.cloudinary_api_base.clone(),
            cloud_name: config.cloudinary_cloud_name.clone(),
            api_key: config.cloudinary_api_key.clone(),
            api_secret: config.cloudinary_api_secret.clone(),
            folder: config.upload_folder.clone(),
            signature_algorithm: config.cloudinary_signature_algorithm,
            timeout: config.host_timeout(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1_1/{}/{}", self.api_base, self.cloud_name, path)
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        api_signature(params, &self.api_secret, self.signature_algorithm)
    }
}

/// Signs upload API parameters: sorted `key=value` pairs joined with `&`,
/// followed by the secret, hashed with the account's algorithm (SHA-1 unless
/// the account was switched).
fn api_signature(params: &[(&str, &str)], secret: &str, algorithm: SignatureAlgorithm) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(to_sign.as_bytes());
            hasher.update(secret.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        SignatureAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(to_sign.as_bytes());
            hasher.update(secret.as_bytes());
            format!("{:x}", hasher.finalize())
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn request_error(e: reqwest::Error) -> HostError {
    HostError::Request(e.to_string())
}

/// Turns a non-2xx response into `HostError::Status` carrying the body text.
async fn check_status(response: Response) -> Result<Response, HostError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HostError::Status { status: status.as_u16(), body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, HostError> {
    response.json::<T>().await.map_err(|e| HostError::Decode(e.to_string()))
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    /// Reads account storage usage from the admin API
    async fn usage(&self) -> Result<StorageUsage, HostError> {
        let response = self.client
            .get(self.endpoint("usage"))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(request_error)?;

        let usage: UsageResponse = decode(check_status(response).await?).await?;
        debug!(used = usage.storage.usage, limit = ?usage.storage.limit, "Cloudinary usage");

        Ok(StorageUsage {
            used: usage.storage.usage,
            limit: usage.storage.limit,
        })
    }

    /// Signed upload into the configured folder
    async fn upload(&self, content: Bytes, mime_type: &str, file_name: &str)
    -> Result<HostedObject, HostError> {
        let timestamp = timestamp();
        let signature = self.sign(&[("folder", self.folder.as_str()), ("timestamp", timestamp.as_str())]);

        let part = multipart::Part::bytes(content.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| HostError::Upload(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.folder.clone())
            .text("signature", signature);

        let response = self.client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HostError::Upload(e.to_string()))?;

        let uploaded: UploadResponse = decode(check_status(response).await?).await?;

        let expected_prefix = format!("{}/", self.folder);
        if !uploaded.public_id.starts_with(&expected_prefix) {
            return Err(HostError::Upload(format!(
                "public id {} is outside folder {}",
                uploaded.public_id, self.folder
            )));
        }

        info!("Uploaded {} to Cloudinary ({} bytes)", uploaded.public_id, uploaded.bytes);

        Ok(HostedObject {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
            bytes: uploaded.bytes,
        })
    }

    /// Streams the delivered asset from its secure URL. Only the connect and
    /// per-read timeouts apply, so a slow but steady download runs to the end.
    async fn fetch(&self, public_id: &str, url: &str) -> Result<HostStream, HostError> {
        debug!("Fetching {} from {}", public_id, url);
        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|e| HostError::Fetch(e.to_string()))?;

        let response = check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map_err(|e| HostError::Fetch(e.to_string()))
            .boxed())
    }

    /// Destroys a single asset
    async fn delete(&self, public_id: &str) -> Result<(), HostError> {
        let timestamp = timestamp();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let params = [
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.api_key.as_str()),
            ("signature", signature.as_str()),
        ];

        let response = self.client
            .post(self.endpoint("image/destroy"))
            .form(&params)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HostError::Delete(e.to_string()))?;

        let destroyed: DestroyResponse = decode(check_status(response).await?).await?;
        match destroyed.result.as_str() {
            "ok" => {
                info!("File deleted from Cloudinary: {}", public_id);
                Ok(())
            }
            "not found" => {
                warn!("Cloudinary has no asset {}, treating as deleted", public_id);
                Ok(())
            }
            other => Err(HostError::Delete(format!("{}: {}", public_id, other))),
        }
    }

    /// Deletes assets by prefix, following the cursor while the host reports partial progress
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, HostError> {
        let mut deleted = 0u64;
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(next) = cursor.take() {
                query.push(("next_cursor", next));
            }

            let response = self.client
                .delete(self.endpoint("resources/image/upload"))
                .basic_auth(&self.api_key, Some(&self.api_secret))
                .query(&query)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| HostError::Delete(e.to_string()))?;

            let page: DeleteResourcesResponse = decode(check_status(response).await?).await?;
            deleted += page.deleted.len() as u64;

            match page.next_cursor {
                Some(next) if page.partial => cursor = Some(next),
                _ => break,
            }
        }

        info!("Deleted {} assets under {} from Cloudinary", deleted, prefix);
        Ok(deleted)
    }
}
