use power_models::{LoggingConfig, SyncReport};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    if config.json {
        builder.json().try_init()?;
    } else {
        builder.try_init()?;
    }
    Ok(())
}

pub struct TracingService;

impl TracingService {
    pub fn log_source_fetched(source: &str, projects: usize, elapsed_ms: u128) {
        info!(
            source = %source,
            projects = projects,
            elapsed_ms = elapsed_ms as u64,
            "Source fetched"
        );
    }

    pub fn log_source_failed(source: &str, error_message: &str) {
        error!(
            source = %source,
            error_message = %error_message,
            "Source failed"
        );
    }

    pub fn log_cycle_completed(report: &SyncReport) {
        info!(
            total = report.total,
            new = report.new,
            updated = report.updated,
            duplicates = report.duplicates,
            errors = report.errors.len(),
            berkeley_synced = report.berkeley_synced,
            alerts_sent = report.alerts_sent,
            duration_seconds = report.duration_seconds,
            "Monitoring cycle completed"
        );
    }

    pub fn log_cycle_skipped(trigger: &str) {
        warn!(trigger = %trigger, "Monitoring cycle already running, skipped");
    }

    pub fn log_alert_sent(email: &str, projects: usize) {
        info!(email = %email, projects = projects, "Alert e-mail sent");
    }
}
