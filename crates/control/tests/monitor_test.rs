mod common;

use common::{fetcher, record, registry, InFlight, StaticSource};
use power_collector::{QueueSource, SourceSet};
use power_control::{Monitor, Registry, Scheduler};
use power_metrics::MetricsService;
use power_models::{Config, MonitorError, ProjectQuery, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn berkeley_record(request_id: &str, name: &str) -> power_models::ProjectRecord {
    let mut project = record(request_id, name, 250.0, "GA", "Southern");
    project.source = "Berkeley Lab".to_string();
    project
}

fn monitor(registry: Registry, realtime: Vec<Arc<dyn QueueSource>>, berkeley: Arc<dyn QueueSource>) -> Monitor {
    monitor_with(Config::default(), registry, realtime, berkeley)
}

fn monitor_with(
    config: Config,
    registry: Registry,
    realtime: Vec<Arc<dyn QueueSource>>,
    berkeley: Arc<dyn QueueSource>,
) -> Monitor {
    Monitor::new(
        registry,
        SourceSet { realtime, berkeley },
        fetcher(),
        None,
        Arc::new(MetricsService::new().unwrap()),
        &config.monitor,
    )
}

#[tokio::test]
async fn cycle_stores_projects_and_logs_sources() {
    let registry = registry().await;
    let caiso: Arc<dyn QueueSource> = Arc::new(StaticSource::ok(
        "CAISO",
        vec![
            record("CAISO_1", "Solar Farm", 400.0, "CA", "CAISO"),
            record("CAISO_2", "Cloud Campus", 300.0, "CA", "CAISO"),
        ],
    ));
    let nyiso: Arc<dyn QueueSource> = Arc::new(StaticSource::failing("NYISO"));
    let berkeley = Arc::new(StaticSource::ok(
        "Berkeley Lab",
        vec![berkeley_record("BERKELEY_1", "Peaker Plant")],
    ));
    let berkeley_source: Arc<dyn QueueSource> = berkeley.clone();
    let monitor = monitor(registry.clone(), vec![caiso, nyiso], berkeley_source);

    let report = monitor.run_cycle("test").await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.new, 3);
    assert_eq!(report.updated, 0);
    assert!(report.berkeley_synced);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("NYISO: "));
    let sources: Vec<(&str, usize)> = report
        .by_source
        .iter()
        .map(|s| (s.source.as_str(), s.projects))
        .collect();
    assert_eq!(sources, vec![("CAISO", 2), ("NYISO", 0), ("Berkeley Lab", 1)]);

    let log = registry.recent_sync_log(50).await.unwrap();
    assert_eq!(log.len(), 3);
    let caiso_entry = log.iter().find(|e| e.source == "CAISO").unwrap();
    assert_eq!((caiso_entry.projects_found, caiso_entry.projects_new), (2, 2));
    assert_eq!(caiso_entry.status, "success");
    let nyiso_entry = log.iter().find(|e| e.source == "NYISO").unwrap();
    assert_eq!(nyiso_entry.status, "error");
    assert!(nyiso_entry.error_message.is_some());

    let runs = registry.recent_runs(20).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].sources_checked, 3);
    assert_eq!(runs[0].requests_stored, 3);

    // Second run: everything known, bulk dataset not due yet.
    let report = monitor.run_cycle("test").await.unwrap();
    assert_eq!(report.new, 0);
    assert_eq!(report.updated, 2);
    assert!(!report.berkeley_synced);
    assert_eq!(berkeley.calls(), 1);
    assert_eq!(
        registry.list_projects(&ProjectQuery::default()).await.unwrap().total,
        3
    );
}

#[tokio::test]
async fn failed_bulk_sync_is_retried_next_cycle() {
    let registry = registry().await;
    let berkeley = Arc::new(StaticSource::failing("Berkeley Lab"));
    let berkeley_source: Arc<dyn QueueSource> = berkeley.clone();
    let monitor = monitor(registry.clone(), vec![], berkeley_source);

    let report = monitor.run_cycle("test").await.unwrap();
    assert!(!report.berkeley_synced);
    assert_eq!(report.errors.len(), 1);

    monitor.run_cycle("test").await.unwrap();
    assert_eq!(berkeley.calls(), 2);
}

#[tokio::test]
async fn overlapping_cycle_is_rejected() {
    let registry = registry().await;
    let slow: Arc<dyn QueueSource> = Arc::new(
        StaticSource::ok("SPP", vec![record("SPP_1", "Cloud Campus", 300.0, "KS", "SPP")])
            .with_delay(Duration::from_millis(500)),
    );
    let berkeley: Arc<dyn QueueSource> = Arc::new(StaticSource::ok("Berkeley Lab", vec![]));
    let monitor = Arc::new(monitor(registry, vec![slow], berkeley));

    let running = {
        let monitor = monitor.clone();
        tokio::spawn(async move { monitor.run_cycle("first").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = monitor.run_cycle("second").await;
    assert!(matches!(second, Err(MonitorError::SyncInProgress)));

    let first = running.await.unwrap().unwrap();
    assert_eq!(first.new, 1);
}

#[tokio::test]
async fn sources_fetched_concurrently_keep_their_order() {
    let registry = registry().await;
    let realtime: Vec<Arc<dyn QueueSource>> = vec![
        Arc::new(
            StaticSource::ok("A", vec![record("A_1", "Alpha", 150.0, "VA", "A")])
                .with_delay(Duration::from_millis(200)),
        ),
        Arc::new(StaticSource::ok("B", vec![record("B_1", "Beta", 160.0, "VA", "B")])),
        Arc::new(StaticSource::ok("C", vec![])),
    ];
    let berkeley: Arc<dyn QueueSource> = Arc::new(StaticSource::ok("Berkeley Lab", vec![]));
    let monitor = monitor(registry, realtime, berkeley);

    let report = monitor.run_cycle("test").await.unwrap();
    let names: Vec<&str> = report.by_source.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C", "Berkeley Lab"]);
    assert_eq!(monitor.source_names(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn concurrent_fetches_respect_the_limit() {
    let registry = registry().await;
    let in_flight = Arc::new(InFlight::default());
    let realtime: Vec<Arc<dyn QueueSource>> = ["A", "B", "C", "D", "E"]
        .into_iter()
        .map(|name| -> Arc<dyn QueueSource> {
            Arc::new(
                StaticSource::ok(name, vec![])
                    .with_delay(Duration::from_millis(100))
                    .tracked(in_flight.clone()),
            )
        })
        .collect();
    let berkeley: Arc<dyn QueueSource> = Arc::new(StaticSource::ok("Berkeley Lab", vec![]));

    let mut config = Config::default();
    config.monitor.max_concurrent_sources = 2;
    let monitor = monitor_with(config, registry, realtime, berkeley);

    let report = monitor.run_cycle("test").await.unwrap();
    assert_eq!(report.by_source.len(), 6);
    assert_eq!(in_flight.peak(), 2);
}

#[tokio::test]
async fn scheduler_runs_on_startup_and_stops_on_shutdown() {
    let registry = registry().await;
    let source: Arc<dyn QueueSource> = Arc::new(StaticSource::ok(
        "MISO",
        vec![record("MISO_1", "Cloud Campus", 300.0, "IL", "MISO")],
    ));
    let berkeley: Arc<dyn QueueSource> = Arc::new(StaticSource::ok("Berkeley Lab", vec![]));
    let monitor = Arc::new(monitor(registry.clone(), vec![source], berkeley));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = Scheduler::new(
        monitor,
        SchedulerConfig {
            enabled: true,
            interval_hours: 6,
            daily_at: "08:00".to_string(),
            run_on_startup: true,
        },
    )
    .spawn(shutdown_rx);

    let mut runs = Vec::new();
    for _ in 0..50 {
        runs = registry.recent_runs(20).await.unwrap();
        if !runs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(runs.len(), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn disabled_scheduler_returns_immediately() {
    let registry = registry().await;
    let berkeley: Arc<dyn QueueSource> = Arc::new(StaticSource::ok("Berkeley Lab", vec![]));
    let monitor = Arc::new(monitor(registry.clone(), vec![], berkeley));
    let (_tx, rx) = watch::channel(false);

    let mut config = Config::default().scheduler;
    config.enabled = false;
    Scheduler::new(monitor, config).run(rx).await;
    assert!(registry.recent_runs(20).await.unwrap().is_empty());
}
