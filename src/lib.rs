pub mod client;
pub mod config;
pub mod db;
pub mod dtr;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod startup;

use std::sync::Arc;

pub use client::HttpDtrStore;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use handlers::MetricsState;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn dtr::DtrStore>,
    pub config: AppConfig,
    pub metrics: Arc<MetricsState>,
}

#[cfg(test)]
pub(crate) fn test_state(store: Arc<dyn dtr::DtrStore>) -> Arc<AppState> {
    let config = AppConfig::from_lookup(|key| {
        (key == "DATABASE_URL").then(|| "postgres://localhost/dtr_test".to_string())
    })
    .unwrap();

    Arc::new(AppState {
        store,
        config,
        metrics: Arc::new(MetricsState::detached()),
    })
}
