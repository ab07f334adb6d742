use power_models::{MonitorError, SyncReport};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

fn metrics_error(e: prometheus::Error) -> MonitorError {
    MonitorError::InternalError {
        reason: e.to_string(),
    }
}

pub struct MetricsService {
    registry: Registry,
    sync_runs_total: IntCounterVec,
    source_errors_total: IntCounterVec,
    projects_fetched_total: IntCounterVec,
    projects_stored_total: IntCounterVec,
    alerts_sent_total: IntCounter,
    sync_duration_seconds: Histogram,
}

impl MetricsService {
    pub fn new() -> Result<Self, MonitorError> {
        let registry = Registry::new();

        let sync_runs_total = IntCounterVec::new(
            Opts::new(
                "power_monitor_sync_runs_total",
                "Monitoring cycles by outcome",
            ),
            &["status"],
        )
        .map_err(metrics_error)?;

        let source_errors_total = IntCounterVec::new(
            Opts::new(
                "power_monitor_source_errors_total",
                "Failed queue source fetches",
            ),
            &["source"],
        )
        .map_err(metrics_error)?;

        let projects_fetched_total = IntCounterVec::new(
            Opts::new(
                "power_monitor_projects_fetched_total",
                "Projects returned by queue sources",
            ),
            &["source"],
        )
        .map_err(metrics_error)?;

        let projects_stored_total = IntCounterVec::new(
            Opts::new(
                "power_monitor_projects_stored_total",
                "Projects written to the registry by outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_error)?;

        let alerts_sent_total = IntCounter::new(
            "power_monitor_alerts_sent_total",
            "Alert e-mails delivered",
        )
        .map_err(metrics_error)?;

        let sync_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "power_monitor_sync_duration_seconds",
                "Monitoring cycle duration in seconds",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(sync_runs_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(source_errors_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(projects_fetched_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(projects_stored_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(alerts_sent_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(sync_duration_seconds.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            sync_runs_total,
            source_errors_total,
            projects_fetched_total,
            projects_stored_total,
            alerts_sent_total,
            sync_duration_seconds,
        })
    }

    pub fn record_source_fetched(&self, source: &str, projects: usize) {
        self.projects_fetched_total
            .with_label_values(&[source])
            .inc_by(projects as u64);
    }

    pub fn record_source_failed(&self, source: &str) {
        self.source_errors_total.with_label_values(&[source]).inc();
    }

    /// Counts a cycle that ran to completion.
    pub fn record_cycle(&self, report: &SyncReport) {
        self.sync_runs_total.with_label_values(&["success"]).inc();
        self.sync_duration_seconds.observe(report.duration_seconds);
        self.projects_stored_total
            .with_label_values(&["new"])
            .inc_by(report.new as u64);
        self.projects_stored_total
            .with_label_values(&["updated"])
            .inc_by(report.updated as u64);
        self.projects_stored_total
            .with_label_values(&["duplicate"])
            .inc_by(report.duplicates as u64);
        self.alerts_sent_total.inc_by(report.alerts_sent as u64);
    }

    pub fn record_cycle_failed(&self) {
        self.sync_runs_total.with_label_values(&["error"]).inc();
    }

    pub fn record_cycle_skipped(&self) {
        self.sync_runs_total.with_label_values(&["skipped"]).inc();
    }

    pub fn get_prometheus_metrics(&self) -> Result<String, MonitorError> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(metrics_error)?;

        String::from_utf8(buffer).map_err(|e| MonitorError::InternalError {
            reason: e.to_string(),
        })
    }
}
