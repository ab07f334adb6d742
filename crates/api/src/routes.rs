use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::*;
use crate::pages::*;
use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Dashboard pages
        .route("/", get(index_page))
        .route("/projects", get(projects_page))
        .route("/alerts", get(alerts_page))
        .route("/monitoring", get(monitoring_page))
        // Projects
        .route("/api/projects", get(list_projects))
        .route("/api/projects/filters", get(project_filters))
        .route("/api/stats", get(stats))
        .route("/api/rescore", post(rescore))
        .route("/export/:format", get(export))
        // Monitoring
        .route("/api/monitoring", get(monitoring))
        .route("/api/sync", post(sync))
        .route("/run-monitor", post(run_monitor))
        .route("/cron/daily-monitor", get(cron_daily_monitor))
        // Alerts
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/:id", delete(delete_alert))
        .route("/alerts/subscribe", post(subscribe_form))
        // Operations
        .route("/init", get(init_database))
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
}

pub fn build_router(state: AppState) -> Router {
    create_router().with_state(state)
}
