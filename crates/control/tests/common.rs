#![allow(dead_code)]

use async_trait::async_trait;
use power_collector::{Fetcher, QueueSource, RawProject};
use power_control::{memory_pool, Registry};
use power_models::{Config, MonitorError, ProjectRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub async fn registry() -> Registry {
    let registry = Registry::new(memory_pool().await.unwrap());
    registry.init().await.unwrap();
    registry
}

pub fn record(request_id: &str, name: &str, capacity_mw: f64, state: &str, utility: &str) -> ProjectRecord {
    RawProject {
        request_id: request_id.to_string(),
        project_name: name.to_string(),
        capacity_mw,
        county: "Loudoun".to_string(),
        state: state.to_string(),
        customer: String::new(),
        status: "Active".to_string(),
        fuel_type: String::new(),
    }
    .into_record(utility, utility, "https://queue.test")
}

pub fn fetcher() -> Fetcher {
    let mut config = Config::default();
    config.monitor.max_retries = 1;
    config.monitor.request_timeout_secs = 5;
    Fetcher::new(&config.monitor).unwrap()
}

/// Fetches currently running across a group of sources, and the highest value seen.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Queue source returning canned projects or a canned failure.
pub struct StaticSource {
    name: String,
    projects: Option<Vec<ProjectRecord>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: Option<Arc<InFlight>>,
}

impl StaticSource {
    pub fn ok(name: &str, projects: Vec<ProjectRecord>) -> Self {
        Self {
            name: name.to_string(),
            projects: Some(projects),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: None,
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            projects: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tracked(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(in_flight) = &self.in_flight {
            in_flight.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(in_flight) = &self.in_flight {
            in_flight.leave();
        }
        match &self.projects {
            Some(projects) => Ok(projects.clone()),
            None => Err(MonitorError::upstream(&self.name, "connection refused")),
        }
    }
}
