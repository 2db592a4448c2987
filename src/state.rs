//! Shared application state for all routes. The registry is immutable once built.

use crate::config::Registry;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(store: impl Store + 'static, registry: Registry) -> Self {
        AppState {
            store: Arc::new(store),
            registry: Arc::new(registry),
        }
    }
}
