use std::sync::Arc;

use easel_store::Store;

use crate::auth::AuthProvider;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }
}
