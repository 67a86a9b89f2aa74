use std::sync::Arc;

use crate::config::{BackendConfig, StoreConfig};
use crate::error::StoreResult;
use crate::fs::FsStore;
use crate::memory::InMemoryStore;
use crate::observer::StoreObserver;
use crate::s3::S3Store;
use crate::traits::Store;

/// Open the backend named by `config`.
///
/// Fails with a configuration error when the backend is unusable: an
/// unwritable root directory, or an unreachable bucket.
pub async fn open_store(
    config: &StoreConfig,
    observer: Arc<dyn StoreObserver>,
) -> StoreResult<Arc<dyn Store>> {
    let timeout = config.op_timeout();
    let store: Arc<dyn Store> = match &config.backend {
        BackendConfig::Filesystem { root } => Arc::new(
            FsStore::open(root.clone())
                .await?
                .with_observer(observer)
                .with_timeout(timeout),
        ),
        BackendConfig::S3(s3) => Arc::new(
            S3Store::connect(s3)
                .await?
                .with_observer(observer)
                .with_timeout(timeout),
        ),
        BackendConfig::Memory => Arc::new(InMemoryStore::with_observer(observer)),
    };
    tracing::info!(backend = config.backend.name(), "store opened");
    Ok(store)
}
