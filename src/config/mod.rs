use std::env;
use std::path::PathBuf;

/// Which blob store the upload pipeline writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Files under a local directory, served back by `/videos/{id}`.
    Local,
    /// An S3-compatible bucket; `/videos/{id}` redirects to it.
    S3,
}

impl StorageKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "fs" | "filesystem" => Some(Self::Local),
            "s3" | "minio" => Some(Self::S3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
        }
    }
}

/// S3 connection settings. Credentials are not part of this struct: they come
/// from the AWS default provider chain (`AWS_ACCESS_KEY_ID`, profiles, IMDS...).
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,

    /// Custom endpoint for S3-compatible stores (MinIO, R2...)
    pub endpoint: Option<String>,

    pub region: String,

    /// Base URL objects are publicly readable under. Defaults to
    /// `{endpoint}/{bucket}` when an endpoint is set.
    pub public_url: Option<String>,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            bucket: "videos".to_string(),
            endpoint: None,
            region: "us-east-1".to_string(),
            public_url: None,
        }
    }
}

/// Upload policy and backend configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 100 MiB)
    pub max_file_size: usize,

    /// Storage backend (default: local)
    pub storage_backend: StorageKind,

    /// Directory for the local backend (default: "videos")
    pub local_storage_dir: PathBuf,

    /// Origin used to build share links. When unset the request's Host header is used.
    pub public_origin: Option<String>,

    /// Check the backend for an existing key before writing (default: false)
    pub verify_unique_ids: bool,

    pub s3: S3Settings,
}

/// Slack on top of `max_file_size` for multipart framing.
pub const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MiB
            storage_backend: StorageKind::Local,
            local_storage_dir: PathBuf::from("videos"),
            public_origin: None,
            verify_unique_ids: false,
            s3: S3Settings::default(),
        }
    }
}

impl UploadConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => StorageKind::parse(&v).unwrap_or_else(|| {
                tracing::warn!("Unknown STORAGE_BACKEND '{}', falling back to local", v);
                StorageKind::Local
            }),
            Err(_) => default.storage_backend,
        };

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_backend,

            local_storage_dir: env::var("LOCAL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.local_storage_dir),

            public_origin: env::var("PUBLIC_ORIGIN")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string()),

            verify_unique_ids: env::var("VERIFY_UNIQUE_IDS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.verify_unique_ids),

            s3: S3Settings {
                bucket: env::var("S3_BUCKET").unwrap_or(default.s3.bucket),
                endpoint: env::var("S3_ENDPOINT").ok(),
                region: env::var("S3_REGION").unwrap_or(default.s3.region),
                public_url: env::var("S3_PUBLIC_URL").ok(),
            },
        }
    }

    /// Local disk under the given directory, default limits
    pub fn development(dir: impl Into<PathBuf>) -> Self {
        Self {
            local_storage_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Largest request body the router accepts on `/upload`.
    pub fn body_limit(&self) -> usize {
        self.max_file_size.saturating_add(MULTIPART_OVERHEAD)
    }
}
