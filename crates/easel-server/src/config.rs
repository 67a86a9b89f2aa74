use std::net::SocketAddr;
use std::path::Path;

use easel_store::{BackendConfig, S3Config, StoreConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// One week, matching the lifetime of tokens handed out after sign-in.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    /// HS256 secret for bearer tokens. Must be set before serving.
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            store: StoreConfig::default(),
            jwt_secret: String::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        config.apply_env()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> ServerResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`:
    ///
    /// - `EASEL_BIND_ADDR` -- listen address
    /// - `EASEL_STORAGE_ROOT` -- switch to the filesystem backend at this root
    /// - `EASEL_S3_BUCKET` -- switch to the S3 backend (wins over the root)
    /// - `EASEL_S3_REGION` -- region for the S3 backend
    /// - `JWT_SECRET` -- token signing secret
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ServerResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("EASEL_BIND_ADDR") {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::Config(format!("EASEL_BIND_ADDR {addr:?}: {e}")))?;
        }
        if let Some(root) = lookup("EASEL_STORAGE_ROOT") {
            self.store.backend = BackendConfig::Filesystem { root: root.into() };
        }
        if let Some(bucket) = lookup("EASEL_S3_BUCKET") {
            self.store.backend = BackendConfig::S3(S3Config::new(bucket));
        }
        if let Some(region) = lookup("EASEL_S3_REGION") {
            if let BackendConfig::S3(s3) = &mut self.store.backend {
                s3.region = Some(region);
            }
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        Ok(())
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> ServerResult<()> {
        if self.jwt_secret.is_empty() {
            return Err(ServerError::Config(
                "jwt_secret is empty; set it in the config file or JWT_SECRET".into(),
            ));
        }
        if self.token_ttl_secs == 0 {
            return Err(ServerError::Config("token_ttl_secs must be positive".into()));
        }
        Ok(())
    }
}
