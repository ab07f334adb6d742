use sqlx::{Pool, Sqlite};
use tracing::info;

/// Embedded migration scripts. Every statement is idempotent so the set can run on each start.
const MIGRATION_001_INITIAL: &str = include_str!("../migrations/001_initial.sql");
const MIGRATION_002_MONITORING_RUNS: &str = include_str!("../migrations/002_monitoring_runs.sql");
const MIGRATION_003_ALERT_SUBSCRIPTIONS: &str =
    include_str!("../migrations/003_alert_subscriptions.sql");
const MIGRATION_004_UNIQUE_ACTIVE_SUBSCRIPTION: &str =
    include_str!("../migrations/004_unique_active_subscription.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("001 initial schema", MIGRATION_001_INITIAL),
    ("002 monitoring runs", MIGRATION_002_MONITORING_RUNS),
    ("003 alert subscriptions", MIGRATION_003_ALERT_SUBSCRIPTIONS),
    ("004 unique active subscription", MIGRATION_004_UNIQUE_ACTIVE_SUBSCRIPTION),
];

pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    for (name, script) in MIGRATIONS {
        info!("Running migration {}", name);
        sqlx::query(script).execute(pool).await?;
    }

    info!("All migrations completed successfully");
    Ok(())
}
