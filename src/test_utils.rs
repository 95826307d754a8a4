//! Shared fixtures: a memory-backed service pointed at a wiremock Cloudinary.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{
    config::{Config, MediaHostKind, RecordStoreKind, SignatureAlgorithm},
    service::FileService,
    state::AppState,
    storage::{CloudinaryHost, MediaHostBackend},
    store::{MemoryRecordStore, RecordStoreBackend},
};

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_base_url: Some("http://localhost:5000".to_string()),
        record_store: RecordStoreKind::Memory,
        database_url: None,
        media_host: MediaHostKind::Cloudinary,
        cloudinary_cloud_name: "demo".to_string(),
        cloudinary_api_key: "key".to_string(),
        cloudinary_api_secret: "secret".to_string(),
        // Overwritten with the mock server address
        cloudinary_api_base: "http://127.0.0.1:9".to_string(),
        cloudinary_signature_algorithm: SignatureAlgorithm::Sha1,
        upload_folder: "uploads".to_string(),
        s3_endpoint: None,
        s3_region: "us-east-1".to_string(),
        s3_bucket: "file-service".to_string(),
        s3_access_key: "minioadmin".to_string(),
        s3_secret_key: "minioadmin".to_string(),
        s3_storage_limit: None,
        max_file_size: 1024 * 1024,
        host_timeout_secs: 5,
    }
}

fn config_for(server: &MockServer) -> Config {
    let mut config = test_config();
    config.cloudinary_api_base = server.uri();
    config
}

pub fn test_host(server: &MockServer) -> MediaHostBackend {
    let host = CloudinaryHost::new(&config_for(server)).expect("Failed to build Cloudinary client");
    MediaHostBackend::Cloudinary(host)
}

pub fn test_service(server: &MockServer) -> FileService {
    FileService::new(
        test_host(server),
        RecordStoreBackend::Memory(MemoryRecordStore::new()),
        config_for(server).upload_folder,
    )
}

pub fn test_state(server: &MockServer) -> AppState {
    AppState {
        files: test_service(server),
        config: config_for(server),
    }
}

/// Answers the usage endpoint with the given figures.
pub async fn mount_usage(server: &MockServer, used: u64, limit: Option<u64>) {
    let storage = match limit {
        Some(limit) => serde_json::json!({ "usage": used, "limit": limit }),
        None => serde_json::json!({ "usage": used }),
    };
    Mock::given(method("GET"))
        .and(path("/v1_1/demo/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "storage": storage })))
        .mount(server)
        .await;
}

/// Answers one upload with `public_id` and serves `content` at its secure URL.
/// Mount several to answer consecutive uploads in order.
pub async fn mount_upload(server: &MockServer, public_id: &str, content: &[u8], mime_type: &str) {
    let asset_path = format!("/assets/{}", public_id);

    Mock::given(method("POST"))
        .and(path("/v1_1/demo/image/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "public_id": public_id,
            "secure_url": format!("{}{}", server.uri(), asset_path),
            "bytes": content.len(),
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(asset_path.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", mime_type)
                .set_body_bytes(content.to_vec()),
        )
        .mount(server)
        .await;
}
