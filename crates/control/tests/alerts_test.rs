mod common;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use common::record;
use power_control::AlertNotifier;
use power_models::{AlertSubscription, AlertsConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

type Captured = Arc<Mutex<Vec<(String, Value)>>>;

async fn spawn_resend(status: StatusCode) -> (String, Captured) {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route(
            "/emails",
            post(
                move |State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    captured.lock().unwrap().push((auth, body));
                    (status, Json(serde_json::json!({"id": "email_1"})))
                },
            ),
        )
        .with_state(captured.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}/emails"), captured)
}

fn notifier(url: String) -> AlertNotifier {
    AlertNotifier::from_config(&AlertsConfig {
        resend_api_key: Some("re_test".into()),
        from_email: "alerts@powermonitor.com".into(),
        resend_url: url,
    })
    .unwrap()
    .unwrap()
}

fn subscription(id: i64, email: &str, min_capacity: f64, states: &[&str]) -> AlertSubscription {
    AlertSubscription {
        id,
        email: email.to_string(),
        min_capacity,
        states: states.iter().map(|s| s.to_string()).collect(),
        project_types: vec![],
        active: true,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn sends_one_email_per_matching_subscription() {
    let (url, captured) = spawn_resend(StatusCode::OK).await;
    let notifier = notifier(url);

    let projects = vec![
        record("PJM_1", "Cloud Campus", 300.0, "VA", "PJM"),
        record("ERCOT_1", "Wind Ranch", 900.0, "TX", "ERCOT"),
    ];
    let subscriptions = vec![
        subscription(1, "va@example.com", 200.0, &["VA"]),
        subscription(2, "big@example.com", 1000.0, &[]),
        subscription(3, "all@example.com", 100.0, &[]),
    ];

    let sent = notifier.notify(&subscriptions, &projects).await;
    assert_eq!(sent, 2);

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 2);
    let (auth, first) = &captured[0];
    assert_eq!(auth, "Bearer re_test");
    assert_eq!(first["from"], "alerts@powermonitor.com");
    assert_eq!(first["to"], serde_json::json!(["va@example.com"]));
    assert!(first["subject"]
        .as_str()
        .unwrap()
        .starts_with("⚡ 1 New Power Project(s) - "));
    let html = first["html"].as_str().unwrap();
    assert!(html.contains("Cloud Campus"));
    assert!(!html.contains("Wind Ranch"));

    let (_, second) = &captured[1];
    assert_eq!(second["to"], serde_json::json!(["all@example.com"]));
    assert!(second["subject"].as_str().unwrap().contains(" 2 New Power Project(s)"));
}

#[tokio::test]
async fn delivery_failure_is_not_counted() {
    let (url, captured) = spawn_resend(StatusCode::UNPROCESSABLE_ENTITY).await;
    let notifier = notifier(url);

    let projects = vec![record("PJM_1", "Cloud Campus", 300.0, "VA", "PJM")];
    let subscriptions = vec![
        subscription(1, "a@example.com", 100.0, &[]),
        subscription(2, "b@example.com", 100.0, &[]),
    ];

    assert_eq!(notifier.notify(&subscriptions, &projects).await, 0);
    // Both subscriptions were attempted.
    assert_eq!(captured.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn nothing_sent_without_projects() {
    let (url, captured) = spawn_resend(StatusCode::OK).await;
    let notifier = notifier(url);
    let subscriptions = vec![subscription(1, "a@example.com", 0.0, &[])];

    assert_eq!(notifier.notify(&subscriptions, &[]).await, 0);
    assert!(captured.lock().unwrap().is_empty());
}
