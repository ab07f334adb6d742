use chrono::{DateTime, Duration, Utc};
use power_collector::score_record;
use power_models::{
    AlertSubscription, DashboardStats, FilterOptions, MonitorError, MonitoringRun, Project,
    ProjectPage, ProjectQuery, ProjectRecord, ProjectType, ScoreBands, SourceStat, StateStat,
    StoreSummary, SubscribeRequest, SyncLogEntry, SyncStatus, TypeStat, UtilityStat,
    DEFAULT_ALERT_MIN_CAPACITY,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::migrations::run_migrations;

const PROJECT_COLUMNS: &str = "id, request_id, project_name, capacity_mw, county, state, customer, \
     utility, status, fuel_type, source, source_url, project_type, hunter_score, hunter_notes, \
     data_hash, first_seen, last_updated";

const RECENT_DAYS: i64 = 30;
const HIGH_CAPACITY_MW: f64 = 200.0;
const TOP_STATES: i64 = 10;

/// Opens (creating if needed) the SQLite database file.
pub async fn open_pool(database_path: &Path) -> Result<SqlitePool, MonitorError> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| MonitorError::DatabaseError {
            reason: format!("Failed to open {}: {e}", database_path.display()),
        })
}

/// A single-connection in-memory database; every connection would otherwise see its own.
pub async fn memory_pool() -> Result<SqlitePool, MonitorError> {
    Ok(SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?)
}

#[derive(Clone)]
pub struct Registry {
    pool: SqlitePool,
}

impl Registry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init(&self) -> Result<(), MonitorError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| MonitorError::DatabaseError {
                reason: e.to_string(),
            })
    }

    /// Upserts a batch of records in one transaction.
    ///
    /// A known `request_id` updates the row in place; an unseen `request_id` whose
    /// `data_hash` is already stored is the same project reported twice and is skipped.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn store_projects(
        &self,
        records: &[ProjectRecord],
    ) -> Result<StoreSummary, MonitorError> {
        let now = Utc::now();
        let mut summary = StoreSummary::default();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let existing: Option<i64> =
                sqlx::query_scalar("SELECT id FROM projects WHERE request_id = ?")
                    .bind(&record.request_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some(id) = existing {
                sqlx::query(
                    r#"
                    UPDATE projects SET
                        project_name = ?, capacity_mw = ?, county = ?, state = ?, customer = ?,
                        utility = ?, status = ?, fuel_type = ?, source = ?, source_url = ?,
                        project_type = ?, hunter_score = ?, hunter_notes = ?, data_hash = ?,
                        last_updated = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&record.project_name)
                .bind(record.capacity_mw)
                .bind(&record.county)
                .bind(&record.state)
                .bind(&record.customer)
                .bind(&record.utility)
                .bind(&record.status)
                .bind(&record.fuel_type)
                .bind(&record.source)
                .bind(&record.source_url)
                .bind(record.project_type.as_str())
                .bind(record.hunter_score)
                .bind(&record.hunter_notes)
                .bind(&record.data_hash)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                summary.updated += 1;
                continue;
            }

            let duplicate: Option<i64> =
                sqlx::query_scalar("SELECT id FROM projects WHERE data_hash = ? LIMIT 1")
                    .bind(&record.data_hash)
                    .fetch_optional(&mut *tx)
                    .await?;
            if duplicate.is_some() {
                summary.duplicates += 1;
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO projects (
                    request_id, project_name, capacity_mw, county, state, customer, utility,
                    status, fuel_type, source, source_url, project_type, hunter_score,
                    hunter_notes, data_hash, first_seen, last_updated
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.request_id)
            .bind(&record.project_name)
            .bind(record.capacity_mw)
            .bind(&record.county)
            .bind(&record.state)
            .bind(&record.customer)
            .bind(&record.utility)
            .bind(&record.status)
            .bind(&record.fuel_type)
            .bind(&record.source)
            .bind(&record.source_url)
            .bind(record.project_type.as_str())
            .bind(record.hunter_score)
            .bind(&record.hunter_notes)
            .bind(&record.data_hash)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            summary.inserted += 1;
            summary.inserted_records.push(record.clone());
        }

        tx.commit().await?;
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            duplicates = summary.duplicates,
            "Stored projects"
        );
        Ok(summary)
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a ProjectQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(min) = query.min_capacity {
            builder.push(" AND capacity_mw >= ").push_bind(min);
        }
        if let Some(state) = ProjectQuery::text_filter(&query.state) {
            builder
                .push(" AND state = ")
                .push_bind(state.to_uppercase());
        }
        if let Some(kind) = ProjectQuery::text_filter(&query.project_type) {
            builder
                .push(" AND project_type = ")
                .push_bind(kind.to_lowercase());
        }
        if let Some(source) = ProjectQuery::text_filter(&query.source) {
            builder
                .push(" AND (source = ")
                .push_bind(source)
                .push(" OR utility = ")
                .push_bind(source)
                .push(")");
        }
        if let Some(search) = ProjectQuery::text_filter(&query.search) {
            let pattern = format!("%{}%", escape_like(search));
            builder
                .push(" AND (project_name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR customer LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR county LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(score) = query.min_score {
            builder.push(" AND hunter_score >= ").push_bind(score);
        }
    }

    #[instrument(skip(self))]
    pub async fn list_projects(&self, query: &ProjectQuery) -> Result<ProjectPage, MonitorError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects"));
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY capacity_mw DESC, id ASC LIMIT ")
            .push_bind(query.per_page() as i64)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let rows = select.build().fetch_all(&self.pool).await?;

        let per_page = query.per_page();
        Ok(ProjectPage {
            projects: rows.iter().map(row_to_project).collect::<Result<_, _>>()?,
            page: query.page(),
            per_page,
            total,
            pages: (total + per_page as i64 - 1) / per_page as i64,
        })
    }

    /// Every project, largest first, for exports.
    pub async fn all_projects(&self) -> Result<Vec<Project>, MonitorError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY capacity_mw DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_project).collect()
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, MonitorError> {
        let states: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT state FROM projects WHERE state != '' ORDER BY state",
        )
        .fetch_all(&self.pool)
        .await?;
        let project_types: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT project_type FROM projects WHERE project_type != '' ORDER BY project_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(FilterOptions {
            states,
            project_types,
        })
    }

    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, MonitorError> {
        let totals = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN first_seen >= ? THEN 1 ELSE 0 END), 0) AS recent,
                COALESCE(SUM(CASE WHEN capacity_mw >= ? THEN 1 ELSE 0 END), 0) AS high_capacity,
                COALESCE(SUM(CASE WHEN project_type = 'datacenter' THEN 1 ELSE 0 END), 0) AS datacenter,
                CAST(COALESCE(SUM(capacity_mw), 0) AS REAL) AS total_mw,
                COALESCE(SUM(CASE WHEN hunter_score >= 70 THEN 1 ELSE 0 END), 0) AS high,
                COALESCE(SUM(CASE WHEN hunter_score >= 40 AND hunter_score < 70 THEN 1 ELSE 0 END), 0) AS medium,
                COALESCE(SUM(CASE WHEN hunter_score < 40 THEN 1 ELSE 0 END), 0) AS low
            FROM projects
            "#,
        )
        .bind(Utc::now() - Duration::days(RECENT_DAYS))
        .bind(HIGH_CAPACITY_MW)
        .fetch_one(&self.pool)
        .await?;

        let by_utility = sqlx::query(
            r#"
            SELECT utility, COUNT(*) AS count, CAST(COALESCE(SUM(capacity_mw), 0) AS REAL) AS total_mw
            FROM projects GROUP BY utility ORDER BY count DESC, utility
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(UtilityStat {
                utility: row.try_get("utility")?,
                count: row.try_get("count")?,
                total_mw: row.try_get("total_mw")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let by_state = self.state_stats("count DESC, state", -1).await?;
        let top_states = self.state_stats("total_mw DESC, state", TOP_STATES).await?;

        let by_type = sqlx::query(
            "SELECT project_type, COUNT(*) AS count FROM projects GROUP BY project_type ORDER BY count DESC, project_type",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(TypeStat {
                project_type: row.try_get("project_type")?,
                count: row.try_get("count")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(DashboardStats {
            total_projects: totals.try_get("total")?,
            recent_projects: totals.try_get("recent")?,
            high_capacity: totals.try_get("high_capacity")?,
            datacenter_projects: totals.try_get("datacenter")?,
            total_capacity_mw: totals.try_get("total_mw")?,
            by_utility,
            by_state,
            top_states,
            by_type,
            score_bands: ScoreBands {
                high: totals.try_get("high")?,
                medium: totals.try_get("medium")?,
                low: totals.try_get("low")?,
            },
            sources: Vec::new(),
        })
    }

    async fn state_stats(&self, order_by: &str, limit: i64) -> Result<Vec<StateStat>, MonitorError> {
        let rows = sqlx::query(&format!(
            "SELECT state, COUNT(*) AS count, CAST(COALESCE(SUM(capacity_mw), 0) AS REAL) AS total_mw \
             FROM projects WHERE state != '' GROUP BY state ORDER BY {order_by} LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                Ok(StateStat {
                    state: row.try_get("state")?,
                    count: row.try_get("count")?,
                    total_mw: row.try_get("total_mw")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    pub async fn source_stats(&self) -> Result<Vec<SourceStat>, MonitorError> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS count, MAX(last_updated) AS last_update \
             FROM projects GROUP BY source ORDER BY count DESC, source",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                Ok(SourceStat {
                    source: row.try_get("source")?,
                    count: row.try_get("count")?,
                    last_update: row.try_get("last_update")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    pub async fn log_sync(
        &self,
        source: &str,
        projects_found: usize,
        projects_new: usize,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<i64, MonitorError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_log (source, sync_time, projects_found, projects_new, status, error_message)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source)
        .bind(Utc::now())
        .bind(projects_found as i64)
        .bind(projects_new as i64)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn last_successful_sync(
        &self,
        source: &str,
    ) -> Result<Option<DateTime<Utc>>, MonitorError> {
        Ok(sqlx::query_scalar(
            "SELECT sync_time FROM sync_log WHERE source = ? AND status = 'success' \
             ORDER BY sync_time DESC LIMIT 1",
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn recent_sync_log(&self, limit: i64) -> Result<Vec<SyncLogEntry>, MonitorError> {
        let rows = sqlx::query(
            "SELECT id, source, sync_time, projects_found, projects_new, status, error_message \
             FROM sync_log ORDER BY sync_time DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                Ok(SyncLogEntry {
                    id: row.try_get("id")?,
                    source: row.try_get("source")?,
                    sync_time: row.try_get("sync_time")?,
                    projects_found: row.try_get("projects_found")?,
                    projects_new: row.try_get("projects_new")?,
                    status: row.try_get("status")?,
                    error_message: row.try_get("error_message")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    pub async fn record_run(
        &self,
        sources_checked: usize,
        requests_found: usize,
        requests_stored: usize,
        duration_seconds: f64,
        status: SyncStatus,
        error_message: Option<&str>,
    ) -> Result<i64, MonitorError> {
        let result = sqlx::query(
            r#"
            INSERT INTO monitoring_runs (
                run_date, sources_checked, requests_found, requests_stored,
                duration_seconds, status, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Utc::now())
        .bind(sources_checked as i64)
        .bind(requests_found as i64)
        .bind(requests_stored as i64)
        .bind(duration_seconds)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<MonitoringRun>, MonitorError> {
        let rows = sqlx::query(
            "SELECT id, run_date, sources_checked, requests_found, requests_stored, \
             duration_seconds, status, error_message \
             FROM monitoring_runs ORDER BY run_date DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                Ok(MonitoringRun {
                    id: row.try_get("id")?,
                    run_date: row.try_get("run_date")?,
                    sources_checked: row.try_get("sources_checked")?,
                    requests_found: row.try_get("requests_found")?,
                    requests_stored: row.try_get("requests_stored")?,
                    duration_seconds: row.try_get("duration_seconds")?,
                    status: row.try_get("status")?,
                    error_message: row.try_get("error_message")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_subscription(
        &self,
        request: SubscribeRequest,
    ) -> Result<AlertSubscription, MonitorError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(MonitorError::InvalidRequest {
                reason: "A valid email address is required".to_string(),
            });
        }

        let min_capacity = request.min_capacity.unwrap_or(DEFAULT_ALERT_MIN_CAPACITY);
        if !min_capacity.is_finite() || min_capacity < 0.0 {
            return Err(MonitorError::InvalidRequest {
                reason: format!("min_capacity must be a non-negative number, got {min_capacity}"),
            });
        }

        let states: Vec<String> = request
            .states
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let project_types = request
            .project_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                ProjectType::from_str(t)
                    .map(|kind| kind.as_str().to_string())
                    .map_err(|reason| MonitorError::InvalidRequest { reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM alert_subscriptions WHERE email = ? AND active = 1 LIMIT 1",
        )
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;
        if existing.is_some() {
            return Err(MonitorError::AlreadySubscribed { email });
        }

        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO alert_subscriptions (email, min_capacity, states, project_types, active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&email)
        .bind(min_capacity)
        .bind(json_list(&states)?)
        .bind(json_list(&project_types)?)
        .bind(created_at)
        .execute(&self.pool)
        .await;
        // The partial unique index settles concurrent subscribes for one address.
        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(MonitorError::AlreadySubscribed { email });
            }
            Err(e) => return Err(e.into()),
        };

        info!("Created alert subscription for {}", email);
        Ok(AlertSubscription {
            id: result.last_insert_rowid(),
            email,
            min_capacity,
            states,
            project_types,
            active: true,
            created_at,
        })
    }

    pub async fn active_subscriptions(&self) -> Result<Vec<AlertSubscription>, MonitorError> {
        let rows = sqlx::query(
            "SELECT id, email, min_capacity, states, project_types, active, created_at \
             FROM alert_subscriptions WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_subscription).collect()
    }

    pub async fn deactivate_subscription(&self, id: i64) -> Result<(), MonitorError> {
        let result = sqlx::query("UPDATE alert_subscriptions SET active = 0 WHERE id = ? AND active = 1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MonitorError::SubscriptionNotFound { id });
        }
        info!("Deactivated alert subscription {}", id);
        Ok(())
    }

    /// Recomputes type and hunter score for every stored project; returns rows changed.
    #[instrument(skip(self))]
    pub async fn rescore_all(&self) -> Result<usize, MonitorError> {
        let projects = self.all_projects().await?;
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for project in &projects {
            let mut record = project.to_record();
            score_record(&mut record);
            if record.hunter_score == project.hunter_score
                && record.hunter_notes == project.hunter_notes
                && record.project_type == project.project_type
            {
                continue;
            }
            sqlx::query(
                "UPDATE projects SET project_type = ?, hunter_score = ?, hunter_notes = ? WHERE id = ?",
            )
            .bind(record.project_type.as_str())
            .bind(record.hunter_score)
            .bind(&record.hunter_notes)
            .bind(project.id)
            .execute(&mut *tx)
            .await?;
            updated += 1;
        }

        tx.commit().await?;
        info!(scanned = projects.len(), updated, "Rescored projects");
        Ok(updated)
    }
}

fn json_list(values: &[String]) -> Result<String, MonitorError> {
    serde_json::to_string(values).map_err(|e| MonitorError::InternalError {
        reason: e.to_string(),
    })
}

/// Search text is matched literally, so LIKE wildcards in it are escaped.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_json_list(column: &str, raw: &str, id: i64) -> Result<Vec<String>, MonitorError> {
    serde_json::from_str(raw).map_err(|e| MonitorError::InternalError {
        reason: format!("subscription {id} has a malformed {column} list: {e}"),
    })
}

fn row_to_project(row: &SqliteRow) -> Result<Project, MonitorError> {
    let id: i64 = row.try_get("id")?;
    let project_type: String = row.try_get("project_type")?;
    let project_type = project_type
        .parse::<ProjectType>()
        .map_err(|reason| MonitorError::InternalError {
            reason: format!("project {id}: {reason}"),
        })?;
    Ok(Project {
        id,
        request_id: row.try_get("request_id")?,
        project_name: row.try_get("project_name")?,
        capacity_mw: row.try_get("capacity_mw")?,
        county: row.try_get("county")?,
        state: row.try_get("state")?,
        customer: row.try_get("customer")?,
        utility: row.try_get("utility")?,
        status: row.try_get("status")?,
        fuel_type: row.try_get("fuel_type")?,
        source: row.try_get("source")?,
        source_url: row.try_get("source_url")?,
        project_type,
        hunter_score: row.try_get("hunter_score")?,
        hunter_notes: row.try_get("hunter_notes")?,
        data_hash: row.try_get("data_hash")?,
        first_seen: row.try_get("first_seen")?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn row_to_subscription(row: &SqliteRow) -> Result<AlertSubscription, MonitorError> {
    let id: i64 = row.try_get("id")?;
    let states: String = row.try_get("states")?;
    let project_types: String = row.try_get("project_types")?;
    Ok(AlertSubscription {
        id,
        email: row.try_get("email")?,
        min_capacity: row.try_get("min_capacity")?,
        states: parse_json_list("states", &states, id)?,
        project_types: parse_json_list("project_types", &project_types, id)?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
    })
}
