mod metrics;
mod service;

pub use metrics::*;
pub use service::{try_start_metrics_service, MetricsService};
