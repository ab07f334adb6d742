use axum::{http::StatusCode, routing::get, Json, Router};
use power_collector::sources::{MisoSource, QueueSource, SppSource};
use power_collector::Fetcher;
use power_models::{Config, MonitorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn fetcher() -> Fetcher {
    let mut config = Config::default();
    config.monitor.max_retries = 1;
    config.monitor.request_timeout_secs = 5;
    Fetcher::new(&config.monitor).unwrap()
}

#[tokio::test]
async fn miso_source_reads_json_feed() {
    let router = Router::new().route(
        "/api/giqueue/getprojects",
        get(|| async {
            Json(serde_json::json!([
                {"jNumber": "J1", "projectName": "Cloud Campus", "summerNetMW": 500, "state": "IL"},
                {"jNumber": "J2", "projectName": "Small", "summerNetMW": 10, "state": "IL"}
            ]))
        }),
    );
    let base = spawn(router).await;

    let source = MisoSource::new(format!("{base}/api/giqueue/getprojects"));
    let projects = source.fetch(&fetcher()).await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].request_id, "MISO_J1");
    assert_eq!(projects[0].source, "MISO");
}

#[tokio::test]
async fn http_error_status_is_upstream_error() {
    let router = Router::new().route(
        "/csv",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    let base = spawn(router).await;

    let source = SppSource::new(format!("{base}/csv"));
    let err = source.fetch(&fetcher()).await.unwrap_err();
    match err {
        MonitorError::Upstream { source_name, reason } => {
            assert_eq!(source_name, "SPP");
            assert!(reason.contains("503"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn user_agent_is_sent() {
    let router = Router::new().route(
        "/ua",
        get(|headers: axum::http::HeaderMap| async move {
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        }),
    );
    let base = spawn(router).await;

    let body = fetcher().text("test", &format!("{base}/ua")).await.unwrap();
    assert!(body.starts_with("Mozilla/5.0"), "{body}");
}

#[tokio::test]
async fn connection_failures_are_retried_then_reported() {
    let mut config = Config::default();
    config.monitor.max_retries = 2;
    config.monitor.backoff_base_secs = 0;
    config.monitor.request_timeout_secs = 2;
    let fetcher = Fetcher::new(&config.monitor).unwrap();

    // Nothing listens on the discard port.
    let err = fetcher
        .bytes("test", "http://127.0.0.1:9/unreachable")
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Upstream { .. }));
}

fn retrying_fetcher(max_retries: u32) -> Fetcher {
    let mut config = Config::default();
    config.monitor.max_retries = max_retries;
    config.monitor.backoff_base_secs = 0;
    config.monitor.request_timeout_secs = 2;
    Fetcher::new(&config.monitor).unwrap()
}

#[tokio::test]
async fn dropped_connections_use_every_attempt() {
    // Accepts each connection and closes it before any response is written.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    {
        let accepted = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });
    }

    let err = retrying_fetcher(3)
        .bytes("test", &format!("http://{addr}/queue.xlsx"))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Upstream { .. }));
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn error_status_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = {
        let hits = hits.clone();
        Router::new().route(
            "/queue.csv",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::BAD_GATEWAY, "upstream down")
                }
            }),
        )
    };
    let base = spawn(router).await;

    let err = retrying_fetcher(3)
        .bytes("test", &format!("{base}/queue.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Upstream { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
