//! Application state shared by all handlers.

use kcst_core::Config;
use kcst_services::FileStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<FileStore>, config: Config) -> Self {
        Self { store, config }
    }
}
