use power_control::{Monitor, Registry};
use power_metrics::MetricsService;
use power_models::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Registry,
    pub monitor: Arc<Monitor>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: Registry,
        monitor: Arc<Monitor>,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            config,
            registry,
            monitor,
            metrics,
        }
    }
}
