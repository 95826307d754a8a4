use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Which media host keeps the image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaHostKind {
    Cloudinary,
    S3,
}

impl FromStr for MediaHostKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cloudinary" => Ok(Self::Cloudinary),
            "s3" => Ok(Self::S3),
            _ => Err(()),
        }
    }
}

/// Where file records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStoreKind {
    Postgres,
    Memory,
}

impl FromStr for RecordStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Digest Cloudinary expects on signed API calls. Accounts default to SHA-1
/// and can be switched to SHA-256 in the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Overrides the base URL derived from request headers.
    pub public_base_url: Option<String>,

    pub record_store: RecordStoreKind,
    pub database_url: Option<String>,

    pub media_host: MediaHostKind,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
    pub cloudinary_api_base: String,
    pub cloudinary_signature_algorithm: SignatureAlgorithm,
    /// Namespace prefix on the host, without slashes.
    #[validate(length(min = 1))]
    pub upload_folder: String,

    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_storage_limit: Option<u64>,

    #[validate(range(min = 1, max = 104857600))] // Max 100MB
    pub max_file_size: u64,
    /// Connect timeout for every host call, and total timeout for the
    /// non-streaming ones. Streamed downloads are never cut off by it.
    #[validate(range(min = 1, max = 600))]
    pub host_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or_default = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let record_store: RecordStoreKind = parse(&var, "RECORD_STORE", RecordStoreKind::Postgres)?;
        let media_host: MediaHostKind = parse(&var, "MEDIA_HOST", MediaHostKind::Cloudinary)?;

        let database_url = var("DATABASE_URL");
        if record_store == RecordStoreKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let cloudinary = |name: &'static str| -> Result<String, ConfigError> {
            match (media_host, var(name)) {
                (_, Some(value)) => Ok(value),
                (MediaHostKind::Cloudinary, None) => Err(ConfigError::Missing(name)),
                (MediaHostKind::S3, None) => Ok(String::new()),
            }
        };

        let s3_storage_limit = match var("S3_STORAGE_LIMIT") {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "S3_STORAGE_LIMIT",
                value: raw,
            })?),
            None => None,
        };

        let config = Config {
            host: or_default("HOST", "0.0.0.0"),
            port: parse(&var, "PORT", 5000)?,
            public_base_url: var("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            record_store,
            database_url,
            media_host,
            cloudinary_cloud_name: cloudinary("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: cloudinary("CLOUDINARY_API_KEY")?,
            cloudinary_api_secret: cloudinary("CLOUDINARY_API_SECRET")?,
            cloudinary_api_base: or_default("CLOUDINARY_API_BASE", "https://api.cloudinary.com")
                .trim_end_matches('/')
                .to_string(),
            cloudinary_signature_algorithm: parse(
                &var,
                "CLOUDINARY_SIGNATURE_ALGORITHM",
                SignatureAlgorithm::Sha1,
            )?,
            upload_folder: or_default("UPLOAD_FOLDER", "uploads").trim_matches('/').to_string(),
            s3_endpoint: var("S3_ENDPOINT"),
            s3_region: or_default("S3_REGION", "us-east-1"),
            s3_bucket: or_default("S3_BUCKET", "file-service"),
            s3_access_key: or_default("S3_ACCESS_KEY", "minioadmin"),
            s3_secret_key: or_default("S3_SECRET_KEY", "minioadmin"),
            s3_storage_limit,
            max_file_size: parse(&var, "MAX_FILE_SIZE", 10_485_760)?,
            host_timeout_secs: parse(&var, "HOST_TIMEOUT_SECS", 30)?,
        };

        // Validate configuration values (e.g. file size range)
        config.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid { var: "HOST", value: raw })
    }

    pub fn host_timeout(&self) -> Duration {
        Duration::from_secs(self.host_timeout_secs)
    }
}

fn parse<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { var: name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const CLOUDINARY: [(&str, &str); 3] = [
        ("CLOUDINARY_CLOUD_NAME", "demo"),
        ("CLOUDINARY_API_KEY", "key"),
        ("CLOUDINARY_API_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_with_minimal_environment() {
        let mut pairs = CLOUDINARY.to_vec();
        pairs.push(("DATABASE_URL", "postgres://localhost/images"));
        let config = load(&pairs).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.record_store, RecordStoreKind::Postgres);
        assert_eq!(config.media_host, MediaHostKind::Cloudinary);
        assert_eq!(config.upload_folder, "uploads");
        assert_eq!(config.cloudinary_api_base, "https://api.cloudinary.com");
        assert_eq!(config.max_file_size, 10_485_760);
        assert_eq!(config.cloudinary_signature_algorithm, SignatureAlgorithm::Sha1);
        assert!(config.public_base_url.is_none());
    }

    #[test]
    fn signature_algorithm_can_be_switched_to_sha256() {
        let mut pairs = CLOUDINARY.to_vec();
        pairs.extend([("RECORD_STORE", "memory"), ("CLOUDINARY_SIGNATURE_ALGORITHM", "SHA-256")]);
        let config = load(&pairs).unwrap();
        assert_eq!(config.cloudinary_signature_algorithm, SignatureAlgorithm::Sha256);

        let mut bad = CLOUDINARY.to_vec();
        bad.extend([("RECORD_STORE", "memory"), ("CLOUDINARY_SIGNATURE_ALGORITHM", "md5")]);
        assert!(matches!(
            load(&bad).unwrap_err(),
            ConfigError::Invalid { var: "CLOUDINARY_SIGNATURE_ALGORITHM", .. }
        ));
    }

    #[test]
    fn postgres_store_requires_database_url() {
        let err = load(&CLOUDINARY).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn cloudinary_requires_credentials() {
        let err = load(&[("RECORD_STORE", "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLOUDINARY_CLOUD_NAME")));
    }

    #[test]
    fn s3_host_does_not_need_cloudinary_credentials() {
        let config = load(&[
            ("RECORD_STORE", "memory"),
            ("MEDIA_HOST", "s3"),
            ("S3_STORAGE_LIMIT", "1048576"),
        ])
        .unwrap();
        assert_eq!(config.media_host, MediaHostKind::S3);
        assert_eq!(config.s3_storage_limit, Some(1_048_576));
    }

    #[test]
    fn rejects_unparseable_and_out_of_range_values() {
        let mut pairs = CLOUDINARY.to_vec();
        pairs.push(("RECORD_STORE", "memory"));

        let mut bad_port = pairs.clone();
        bad_port.push(("PORT", "eighty"));
        assert!(matches!(load(&bad_port).unwrap_err(), ConfigError::Invalid { var: "PORT", .. }));

        let mut too_big = pairs.clone();
        too_big.push(("MAX_FILE_SIZE", "209715200"));
        assert!(matches!(load(&too_big).unwrap_err(), ConfigError::Validation(_)));

        let mut bad_store = pairs;
        bad_store.push(("RECORD_STORE", "mongo"));
        // the later pair wins in the map
        assert!(matches!(
            load(&bad_store).unwrap_err(),
            ConfigError::Invalid { var: "RECORD_STORE", .. }
        ));
    }

    #[test]
    fn trims_slashes_from_folder_and_base_url() {
        let mut pairs = CLOUDINARY.to_vec();
        pairs.extend([
            ("RECORD_STORE", "memory"),
            ("UPLOAD_FOLDER", "/images/"),
            ("PUBLIC_BASE_URL", "https://img.example.com/"),
        ]);
        let config = load(&pairs).unwrap();
        assert_eq!(config.upload_folder, "images");
        assert_eq!(config.public_base_url.as_deref(), Some("https://img.example.com"));
    }
}
