use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Store configuration, chosen once at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend serves documents and canvases.
    pub backend: BackendConfig,
    /// Upper bound on any single store operation, in seconds.
    #[serde(default)]
    pub op_timeout_secs: Option<u64>,
}

impl StoreConfig {
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig::Filesystem { root: root.into() },
            op_timeout_secs: None,
        }
    }

    pub fn s3(bucket: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::S3(S3Config::new(bucket)),
            op_timeout_secs: None,
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: BackendConfig::Memory,
            op_timeout_secs: None,
        }
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::filesystem("./data")
    }
}

/// Backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Local directory tree rooted at `root`.
    Filesystem { root: PathBuf },
    /// S3 or S3-compatible bucket.
    S3(S3Config),
    /// Process-local, non-persistent store.
    Memory,
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filesystem { .. } => "filesystem",
            Self::S3(_) => "s3",
            Self::Memory => "memory",
        }
    }
}

/// Object-storage backend settings.
///
/// Credentials always come from the ambient AWS provider chain (environment,
/// profile, instance role). Region and endpoint fall back to that chain when
/// unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Probe the bucket with `HeadBucket` while connecting.
    #[serde(default = "default_verify_bucket")]
    pub verify_bucket: bool,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint: None,
            force_path_style: false,
            verify_bucket: default_verify_bucket(),
        }
    }
}

fn default_verify_bucket() -> bool {
    true
}
