use chrono::Utc;
use futures::future::join_all;
use power_collector::{Fetcher, QueueSource, SourceSet};
use power_metrics::tracing::TracingService;
use power_metrics::MetricsService;
use power_models::{
    MonitorConfig, MonitorError, ProjectRecord, SourceCount, StoreSummary, SyncReport, SyncStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, instrument};

use crate::alerts::AlertNotifier;
use crate::registry::Registry;

struct SourceResult {
    name: String,
    outcome: Result<Vec<ProjectRecord>, MonitorError>,
    elapsed: Duration,
}

/// Runs monitoring cycles. At most one cycle is in flight at a time.
pub struct Monitor {
    registry: Registry,
    sources: SourceSet,
    fetcher: Fetcher,
    notifier: Option<AlertNotifier>,
    metrics: Arc<MetricsService>,
    max_concurrent_sources: usize,
    berkeley_sync_days: i64,
    running: Mutex<()>,
}

impl Monitor {
    pub fn new(
        registry: Registry,
        sources: SourceSet,
        fetcher: Fetcher,
        notifier: Option<AlertNotifier>,
        metrics: Arc<MetricsService>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            registry,
            sources,
            fetcher,
            notifier,
            metrics,
            max_concurrent_sources: config.max_concurrent_sources.max(1),
            berkeley_sync_days: config.berkeley_sync_days,
            running: Mutex::new(()),
        }
    }

    /// Names of the real-time sources, in fetch order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .realtime
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Fetches every source, stores the results and sends alerts for new projects.
    /// Returns `SyncInProgress` without doing anything when a cycle is already running.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, trigger: &str) -> Result<SyncReport, MonitorError> {
        let Ok(_guard) = self.running.try_lock() else {
            TracingService::log_cycle_skipped(trigger);
            self.metrics.record_cycle_skipped();
            return Err(MonitorError::SyncInProgress);
        };

        let started = Instant::now();
        info!(trigger = %trigger, "Starting monitoring cycle");
        match self.cycle(started).await {
            Ok(report) => {
                TracingService::log_cycle_completed(&report);
                self.metrics.record_cycle(&report);
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Monitoring cycle failed");
                self.metrics.record_cycle_failed();
                let duration = started.elapsed().as_secs_f64();
                let message = e.to_string();
                if let Err(log_err) = self
                    .registry
                    .record_run(0, 0, 0, duration, SyncStatus::Error, Some(&message))
                    .await
                {
                    error!(error = %log_err, "Failed to record monitoring run");
                }
                Err(e)
            }
        }
    }

    async fn cycle(&self, started: Instant) -> Result<SyncReport, MonitorError> {
        let mut report = SyncReport {
            total: 0,
            new: 0,
            updated: 0,
            duplicates: 0,
            by_source: Vec::new(),
            errors: Vec::new(),
            berkeley_synced: false,
            alerts_sent: 0,
            duration_seconds: 0.0,
            timestamp: Utc::now(),
        };

        let results = self.fetch_realtime().await;
        let mut fetched = Vec::new();
        let mut succeeded = Vec::new();
        for result in results {
            match result.outcome {
                Ok(projects) => {
                    TracingService::log_source_fetched(
                        &result.name,
                        projects.len(),
                        result.elapsed.as_millis(),
                    );
                    self.metrics.record_source_fetched(&result.name, projects.len());
                    report.by_source.push(SourceCount {
                        source: result.name.clone(),
                        projects: projects.len(),
                    });
                    succeeded.push((result.name, projects.len()));
                    fetched.extend(projects);
                }
                Err(e) => {
                    let message = e.to_string();
                    TracingService::log_source_failed(&result.name, &message);
                    self.metrics.record_source_failed(&result.name);
                    report.by_source.push(SourceCount {
                        source: result.name.clone(),
                        projects: 0,
                    });
                    self.registry
                        .log_sync(&result.name, 0, 0, SyncStatus::Error, Some(&message))
                        .await?;
                    report.errors.push(format!("{}: {}", result.name, message));
                }
            }
        }

        let mut sources_checked = self.sources.realtime.len();
        if self.berkeley_due().await? {
            sources_checked += 1;
            self.sync_berkeley(&mut report).await?;
        } else {
            info!(source = %self.sources.berkeley.name(), "Bulk dataset sync not due");
        }

        let stored = self.registry.store_projects(&fetched).await?;
        let new_by_source = count_by_source(&stored.inserted_records);
        for (name, found) in &succeeded {
            let new = new_by_source.get(name.as_str()).copied().unwrap_or(0);
            self.registry
                .log_sync(name, *found, new, SyncStatus::Success, None)
                .await?;
        }
        report.total += fetched.len();
        add_summary(&mut report, &stored);

        report.alerts_sent = self.send_alerts(&stored.inserted_records).await?;

        report.duration_seconds = started.elapsed().as_secs_f64();
        report.timestamp = Utc::now();
        let error_message = (!report.errors.is_empty()).then(|| report.errors.join("; "));
        self.registry
            .record_run(
                sources_checked,
                report.total,
                report.new,
                report.duration_seconds,
                SyncStatus::Success,
                error_message.as_deref(),
            )
            .await?;

        Ok(report)
    }

    /// Each source runs in its own task, gated by a semaphore of
    /// `max_concurrent_sources` permits. Results come back in source order.
    async fn fetch_realtime(&self) -> Vec<SourceResult> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_sources));
        let mut names = Vec::with_capacity(self.sources.realtime.len());
        let mut handles = Vec::with_capacity(self.sources.realtime.len());

        for source in &self.sources.realtime {
            let source: Arc<dyn QueueSource> = Arc::clone(source);
            let fetcher = self.fetcher.clone();
            let permits = Arc::clone(&permits);
            names.push(source.name().to_string());
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                let start = Instant::now();
                let outcome = source.fetch(&fetcher).await;
                (outcome, start.elapsed())
            }));
        }

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok((outcome, elapsed)) => SourceResult {
                    name,
                    outcome,
                    elapsed,
                },
                Err(e) => SourceResult {
                    outcome: Err(MonitorError::InternalError {
                        reason: format!("{name} fetch task failed: {e}"),
                    }),
                    name,
                    elapsed: Duration::ZERO,
                },
            })
            .collect()
    }

    async fn berkeley_due(&self) -> Result<bool, MonitorError> {
        let last = self
            .registry
            .last_successful_sync(self.sources.berkeley.name())
            .await?;
        Ok(match last {
            None => true,
            Some(at) => Utc::now() - at >= chrono::Duration::days(self.berkeley_sync_days),
        })
    }

    async fn sync_berkeley(&self, report: &mut SyncReport) -> Result<(), MonitorError> {
        let source = &self.sources.berkeley;
        let name = source.name().to_string();
        let start = Instant::now();

        match source.fetch(&self.fetcher).await {
            Ok(projects) => {
                TracingService::log_source_fetched(&name, projects.len(), start.elapsed().as_millis());
                self.metrics.record_source_fetched(&name, projects.len());
                let stored = self.registry.store_projects(&projects).await?;
                self.registry
                    .log_sync(&name, projects.len(), stored.inserted, SyncStatus::Success, None)
                    .await?;
                info!(source = %name, new = stored.inserted, "Bulk dataset stored");
                report.by_source.push(SourceCount {
                    source: name,
                    projects: projects.len(),
                });
                report.total += projects.len();
                add_summary(report, &stored);
                report.berkeley_synced = true;
            }
            Err(e) => {
                let message = e.to_string();
                TracingService::log_source_failed(&name, &message);
                self.metrics.record_source_failed(&name);
                self.registry
                    .log_sync(&name, 0, 0, SyncStatus::Error, Some(&message))
                    .await?;
                report.errors.push(format!("{name}: {message}"));
            }
        }
        Ok(())
    }

    async fn send_alerts(&self, inserted: &[ProjectRecord]) -> Result<usize, MonitorError> {
        let Some(notifier) = &self.notifier else {
            return Ok(0);
        };
        if inserted.is_empty() {
            return Ok(0);
        }
        let subscriptions = self.registry.active_subscriptions().await?;
        Ok(notifier.notify(&subscriptions, inserted).await)
    }
}

fn count_by_source(records: &[ProjectRecord]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for record in records {
        *counts.entry(record.source.as_str()).or_insert(0) += 1;
    }
    counts
}

fn add_summary(report: &mut SyncReport, stored: &StoreSummary) {
    report.new += stored.inserted;
    report.updated += stored.updated;
    report.duplicates += stored.duplicates;
}
