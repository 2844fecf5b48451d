pub mod dtr_handler;
pub mod health;
pub mod metrics;

pub use health::health_check;
pub use metrics::{metrics_handler, setup_metrics_recorder, MetricsState};
