use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    primitives::ByteStream,
    types::{Delete, Object, ObjectIdentifier},
};
use aws_types::region::Region;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{info, warn};
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::Config,
    storage::{HostError, HostStream, HostedObject, MediaHost, StorageUsage},
    utils::get_file_extension,
};

// AWS S3 (or MinIO) media host
#[derive(Clone)]
pub struct S3Host {
    client: Client,           // AWS S3 client
    bucket: String,           // S3 bucket name
    folder: String,           // Key prefix for every upload
    storage_limit: Option<u64>, // Buckets have no quota of their own
}

impl S3Host {
    /// Initialize S3 client and ensure the bucket exists
    pub async fn new(config: &Config) -> Self {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()))
            .or_default_provider()
            .or_else(Region::new("us-east-1"));

        let mut aws_config_builder = aws_config::from_env().region(region_provider);

        // Custom endpoint (e.g., for MinIO)
        if let Some(endpoint) = &config.s3_endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);

            let credentials = Credentials::new(
                config.s3_access_key.clone(),
                config.s3_secret_key.clone(),
                None,
                None,
                "custom",
            );

            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        let aws_config = aws_config_builder.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true) // Required for MinIO
                .build(),
        );

        Self::ensure_bucket_exists(&client, &config.s3_bucket).await;

        Self {
            client,
            bucket: config.s3_bucket.clone(),
            folder: config.upload_folder.clone(),
            storage_limit: config.s3_storage_limit,
        }
    }

    /// Ensure the S3 bucket exists, or create it if possible
    async fn ensure_bucket_exists(client: &Client, bucket: &str) {
        match client.create_bucket().bucket(bucket).send().await {
            Ok(_) => info!("Bucket {} created successfully", bucket),
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("BucketAlreadyOwnedByYou") || err_msg.contains("BucketAlreadyExists") {
                    info!("Bucket {} already exists", bucket);
                } else {
                    warn!("Could not create bucket {}: {}", bucket, err_msg);
                    match client.head_bucket().bucket(bucket).send().await {
                        Ok(_) => info!("Bucket {} exists (verified)", bucket),
                        Err(check_err) => tracing::error!(
                            "Bucket {} does not exist and cannot be created: {}",
                            bucket,
                            check_err
                        ),
                    }
                }
            }
        }
    }

    /// Lists every object under `prefix`, following continuation tokens.
    async fn list_under(&self, prefix: &str) -> Result<Vec<Object>, HostError> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self.client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| HostError::Request(e.to_string()))?;

            objects.extend(page.contents().iter().cloned());

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => token = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(objects)
    }
}

/// Builds the object key for a new upload: `<folder>/<uuid>[.<ext>]`.
fn object_key(folder: &str, file_name: &str) -> String {
    match get_file_extension(file_name) {
        Some(ext) => format!("{}/{}.{}", folder, Uuid::new_v4(), ext),
        None => format!("{}/{}", folder, Uuid::new_v4()),
    }
}

#[async_trait]
impl MediaHost for S3Host {
    /// Sums object sizes under the folder against the configured limit
    async fn usage(&self) -> Result<StorageUsage, HostError> {
        let objects = self.list_under(&format!("{}/", self.folder)).await?;
        let used = objects
            .iter()
            .filter_map(|o| o.size())
            .map(|size| size.max(0) as u64)
            .sum();

        Ok(StorageUsage { used, limit: self.storage_limit })
    }

    /// Uploads content to the S3 bucket
    async fn upload(&self, content: Bytes, mime_type: &str, file_name: &str)
    -> Result<HostedObject, HostError> {
        let key = object_key(&self.folder, file_name);
        let size = content.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(mime_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| HostError::Upload(e.to_string()))?;

        info!("Uploaded {} to s3 ({} bytes)", key, size);

        Ok(HostedObject {
            url: format!("s3://{}/{}", self.bucket, key),
            public_id: key,
            bytes: size,
        })
    }

    /// Streams an object body from the bucket
    async fn fetch(&self, public_id: &str, _url: &str) -> Result<HostStream, HostError> {
        let output = self.client
            .get_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| HostError::Fetch(e.to_string()))?;

        let stream = futures::stream::try_unfold(output.body, |mut body| async move {
            let chunk = body
                .try_next()
                .await
                .map_err(|e| HostError::Fetch(e.to_string()))?;
            Ok::<_, HostError>(chunk.map(|c| (c, body)))
        });

        Ok(stream.boxed())
    }

    /// Deletes an object from the bucket
    async fn delete(&self, public_id: &str) -> Result<(), HostError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .map_err(|e| HostError::Delete(e.to_string()))?;

        info!("File deleted successfully from s3: {}", public_id);
        Ok(())
    }

    /// Deletes every object under the prefix, one batch per listed page
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, HostError> {
        let objects = self.list_under(prefix).await?;
        let mut deleted = 0u64;

        // DeleteObjects accepts at most 1000 keys per call
        for batch in objects.chunks(1000) {
            let identifiers = batch
                .iter()
                .filter_map(|o| o.key())
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| HostError::Delete(e.to_string()))?;

            if identifiers.is_empty() {
                continue;
            }
            let count = identifiers.len() as u64;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| HostError::Delete(e.to_string()))?;

            self.client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| HostError::Delete(e.to_string()))?;

            deleted += count;
        }

        info!("Deleted {} objects under {} from s3", deleted, prefix);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_keeps_lowercased_extension() {
        let key = object_key("uploads", "Holiday.PNG");
        assert!(key.starts_with("uploads/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn object_key_without_extension() {
        let key = object_key("uploads", "pasted-image");
        let id = key.strip_prefix("uploads/").unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
