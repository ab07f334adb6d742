use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use chrono::Utc;
use power_models::{
    AlertSubscription, DashboardStats, ErrorShape, FilterOptions, MonitorError, MonitoringOverview,
    Project, ProjectPage, ProjectQuery, RescoreResponse, SubscribeRequest, SyncReport,
};
use serde_json::json;
use tracing::{error, info, instrument};

const RECENT_RUNS: i64 = 20;
const RECENT_SYNC_LOG: i64 = 50;

type ApiError = (StatusCode, Json<ErrorShape>);

fn api_error(e: MonitorError) -> ApiError {
    error!("Request failed: {}", e);
    (
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(e.to_error_shape()),
    )
}

/// Redirect back to a page with a one-shot status banner in the query string.
fn redirect_with(path: &str, status: &str, message: &str) -> Redirect {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("status", status)
        .append_pair("message", message)
        .finish();
    Redirect::to(&format!("{path}?{query}"))
}

#[instrument(skip(state))]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ProjectPage>, ApiError> {
    state
        .registry
        .list_projects(&query)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn project_filters(
    State(state): State<AppState>,
) -> Result<Json<FilterOptions>, ApiError> {
    state
        .registry
        .filter_options()
        .await
        .map(Json)
        .map_err(api_error)
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let mut stats = state.registry.dashboard_stats().await.map_err(api_error)?;
    stats.sources = state.monitor.source_names();
    Ok(Json(stats))
}

#[instrument(skip(state))]
pub async fn monitoring(
    State(state): State<AppState>,
) -> Result<Json<MonitoringOverview>, ApiError> {
    let runs = state
        .registry
        .recent_runs(RECENT_RUNS)
        .await
        .map_err(api_error)?;
    let source_stats = state.registry.source_stats().await.map_err(api_error)?;
    let sync_log = state
        .registry
        .recent_sync_log(RECENT_SYNC_LOG)
        .await
        .map_err(api_error)?;
    Ok(Json(MonitoringOverview {
        runs,
        source_stats,
        sync_log,
    }))
}

#[instrument(skip(state))]
pub async fn sync(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    info!("Manual sync requested");
    state
        .monitor
        .run_cycle("api")
        .await
        .map(Json)
        .map_err(api_error)
}

#[instrument(skip(state))]
pub async fn run_monitor(State(state): State<AppState>) -> Redirect {
    match state.monitor.run_cycle("dashboard").await {
        Ok(report) => redirect_with(
            "/monitoring",
            "success",
            &format!("Monitoring completed: {} new projects found", report.new),
        ),
        Err(e) => redirect_with("/monitoring", "error", &format!("Monitoring failed: {e}")),
    }
}

#[instrument(skip(state))]
pub async fn cron_daily_monitor(State(state): State<AppState>) -> Response {
    match state.monitor.run_cycle("cron").await {
        Ok(report) => Json(json!({
            "status": "success",
            "message": format!("Monitoring completed: {} new projects stored", report.new),
            "result": report,
        }))
        .into_response(),
        Err(e) => {
            error!("Cron monitoring failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn list_alerts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertSubscription>>, ApiError> {
    state
        .registry
        .active_subscriptions()
        .await
        .map(Json)
        .map_err(api_error)
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn create_alert(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<AlertSubscription>), ApiError> {
    let subscription = state
        .registry
        .create_subscription(payload)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// HTML form variant of subscribe; `states` may repeat.
#[instrument(skip_all)]
pub async fn subscribe_form(State(state): State<AppState>, body: String) -> Redirect {
    let mut request = SubscribeRequest {
        email: String::new(),
        min_capacity: None,
        states: Vec::new(),
        project_types: Vec::new(),
    };
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            "email" => request.email = value.trim().to_string(),
            "min_capacity" if !value.trim().is_empty() => match value.trim().parse() {
                Ok(mw) => request.min_capacity = Some(mw),
                Err(_) => {
                    return redirect_with("/alerts", "error", "Minimum capacity must be a number")
                }
            },
            "states" => request.states.push(value.into_owned()),
            "project_types" => request.project_types.push(value.into_owned()),
            _ => {}
        }
    }
    if request.email.is_empty() {
        return redirect_with("/alerts", "error", "Email address is required");
    }

    match state.registry.create_subscription(request).await {
        Ok(_) => redirect_with("/alerts", "success", "Successfully subscribed to alerts!"),
        Err(MonitorError::AlreadySubscribed { .. }) => {
            redirect_with("/alerts", "warning", "Email address already subscribed")
        }
        Err(e) => redirect_with("/alerts", "error", &e.to_string()),
    }
}

#[instrument(skip(state))]
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .deactivate_subscription(id)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn rescore(State(state): State<AppState>) -> Result<Json<RescoreResponse>, ApiError> {
    let updated = state.registry.rescore_all().await.map_err(api_error)?;
    Ok(Json(RescoreResponse { updated }))
}

#[instrument(skip(state))]
pub async fn export(State(state): State<AppState>, Path(format): Path<String>) -> Response {
    if format != "json" && format != "csv" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid format" })),
        )
            .into_response();
    }

    let projects = match state.registry.all_projects().await {
        Ok(projects) => projects,
        Err(e) => return api_error(e).into_response(),
    };
    if format == "json" {
        return Json(projects).into_response();
    }

    match projects_csv(&projects) {
        Ok(body) => {
            let disposition = format!(
                "attachment; filename=power_projects_{}.csv",
                Utc::now().format("%Y%m%d")
            );
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => api_error(e).into_response(),
    }
}

pub const CSV_COLUMNS: [&str; 12] = [
    "request_id",
    "project_name",
    "capacity_mw",
    "county",
    "state",
    "utility",
    "customer",
    "status",
    "project_type",
    "hunter_score",
    "source",
    "first_seen",
];

pub fn projects_csv(projects: &[Project]) -> Result<String, MonitorError> {
    let csv_error = |e: csv::Error| MonitorError::InternalError {
        reason: format!("CSV export failed: {e}"),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS).map_err(csv_error)?;
    for p in projects {
        let capacity = p.capacity_mw.to_string();
        let score = p.hunter_score.to_string();
        let first_seen = p.first_seen.to_rfc3339();
        writer
            .write_record([
                p.request_id.as_str(),
                p.project_name.as_str(),
                capacity.as_str(),
                p.county.as_str(),
                p.state.as_str(),
                p.utility.as_str(),
                p.customer.as_str(),
                p.status.as_str(),
                p.project_type.as_str(),
                score.as_str(),
                p.source.as_str(),
                first_seen.as_str(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(|e| MonitorError::InternalError {
        reason: format!("CSV export failed: {e}"),
    })?;
    String::from_utf8(bytes).map_err(|e| MonitorError::InternalError {
        reason: e.to_string(),
    })
}

#[instrument(skip(state))]
pub async fn init_database(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.registry.init().await.map_err(api_error)?;
    Ok("Database initialized successfully!")
}

pub async fn health_check() -> &'static str {
    "OK"
}

#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    match state.metrics.get_prometheus_metrics() {
        Ok(metrics) => Ok(metrics),
        Err(e) => {
            error!("Failed to get metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
