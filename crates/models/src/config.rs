use crate::MonitorError;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an explicit TOML config file.
pub const CONFIG_PATH_ENV: &str = "POWER_MONITOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "configs/default.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub monitor: MonitorConfig,
    pub sources: SourcesConfig,
    pub scheduler: SchedulerConfig,
    pub alerts: AlertsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub max_request_body_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub dir: String,
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub min_capacity_mw: f64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub max_concurrent_sources: usize,
    pub berkeley_sync_days: i64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub caiso_url: String,
    pub nyiso_url: String,
    pub isone_url: String,
    pub spp_url: String,
    pub miso_url: String,
    pub ercot_url: Option<String>,
    pub pjm_export_urls: Vec<String>,
    pub pjm_dataminer_url: String,
    pub berkeley_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    /// UTC wall-clock time of the daily run, `HH:MM`.
    pub daily_at: String,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AlertsConfig {
    pub resend_api_key: Option<String>,
    pub from_email: String,
    pub resend_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
                max_request_body_size_mb: 2,
            },
            data: DataConfig {
                dir: "/app/data".to_string(),
                database_path: "/app/data/power_monitor.db".to_string(),
            },
            monitor: MonitorConfig {
                min_capacity_mw: 100.0,
                request_timeout_secs: 60,
                max_retries: 3,
                backoff_base_secs: 2,
                max_concurrent_sources: 4,
                berkeley_sync_days: 7,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            },
            sources: SourcesConfig {
                caiso_url: "http://www.caiso.com/PublishedDocuments/PublicQueueReport.xlsx".to_string(),
                nyiso_url: "https://www.nyiso.com/documents/20142/1407078/NYISO-Interconnection-Queue.xlsx".to_string(),
                isone_url: "https://irtt.iso-ne.com/reports/external".to_string(),
                spp_url: "https://opsportal.spp.org/Studies/GenerateActiveCSV".to_string(),
                miso_url: "https://www.misoenergy.org/api/giqueue/getprojects".to_string(),
                ercot_url: None,
                pjm_export_urls: vec![
                    "https://services.pjm.com/PJMPlanningApi/api/Queue/ExportToXls".to_string(),
                    "https://www.pjm.com/-/media/planning/services-requests/interconnection-queues/queue.ashx".to_string(),
                ],
                pjm_dataminer_url: "https://dataminer2.pjm.com/feed/gen_queues/json".to_string(),
                berkeley_urls: vec![
                    "https://emp.lbl.gov/sites/default/files/2025-12/queued_up_2025_data_file.xlsx".to_string(),
                    "https://emp.lbl.gov/sites/default/files/queued_up_2025_data_file.xlsx".to_string(),
                    "https://eta-publications.lbl.gov/sites/default/files/2025-12/queued_up_2025_data_file.xlsx".to_string(),
                    "https://emp.lbl.gov/sites/default/files/2024-04/queued_up_2024_data_file.xlsx".to_string(),
                    "https://eta-publications.lbl.gov/sites/default/files/2024-04/queued_up_2024_data_file.xlsx".to_string(),
                ],
            },
            scheduler: SchedulerConfig {
                enabled: true,
                interval_hours: 6,
                daily_at: "08:00".to_string(),
                run_on_startup: true,
            },
            alerts: AlertsConfig {
                resend_api_key: None,
                from_email: "alerts@powermonitor.com".to_string(),
                resend_url: "https://api.resend.com/emails".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

impl Config {
    /// Layered provider: defaults, optional TOML file, `POWER_MONITOR_*`
    /// variables, then the plain deployment variables (`DATABASE_PATH`, ...).
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        let file = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if Path::new(&file).exists() {
            figment = figment.merge(Toml::file(file));
        }

        figment
            .merge(Env::prefixed("POWER_MONITOR_").ignore(&["config"]).split("__"))
            .merge(
                Env::raw()
                    .only(&["database_path", "data_dir", "port", "resend_api_key", "from_email"])
                    .map(|key| match key.as_str().to_ascii_lowercase().as_str() {
                        "database_path" => "data.database_path".into(),
                        "data_dir" => "data.dir".into(),
                        "port" => "server.port".into(),
                        "resend_api_key" => "alerts.resend_api_key".into(),
                        "from_email" => "alerts.from_email".into(),
                        _ => key.into(),
                    }),
            )
    }

    pub fn load() -> Result<Self, MonitorError> {
        let config: Config = Self::figment()
            .extract()
            .map_err(|e| MonitorError::ConfigError { reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.monitor.min_capacity_mw < 0.0 {
            return Err(MonitorError::ConfigError {
                reason: "monitor.min_capacity_mw must not be negative".to_string(),
            });
        }
        if self.monitor.max_concurrent_sources == 0 {
            return Err(MonitorError::ConfigError {
                reason: "monitor.max_concurrent_sources must be at least 1".to_string(),
            });
        }
        if self.scheduler.interval_hours == 0 {
            return Err(MonitorError::ConfigError {
                reason: "scheduler.interval_hours must be at least 1".to_string(),
            });
        }
        self.scheduler.daily_time()?;
        Ok(())
    }
}

impl SchedulerConfig {
    pub fn daily_time(&self) -> Result<chrono::NaiveTime, MonitorError> {
        chrono::NaiveTime::parse_from_str(&self.daily_at, "%H:%M").map_err(|e| MonitorError::ConfigError {
            reason: format!("scheduler.daily_at '{}' is not HH:MM: {}", self.daily_at, e),
        })
    }
}

impl AlertsConfig {
    /// Alerts are sent only when an API key is configured and non-empty.
    pub fn enabled(&self) -> bool {
        self.resend_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_deployment_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data.dir, "/app/data");
        assert_eq!(config.data.database_path, "/app/data/power_monitor.db");
        assert_eq!(config.monitor.min_capacity_mw, 100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deployment_variables_override_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("DATABASE_PATH", "/tmp/pm/test.db");
            jail.set_env("DATA_DIR", "/tmp/pm");
            jail.set_env("PORT", "9090");
            jail.set_env("RESEND_API_KEY", "re_123");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.data.database_path, "/tmp/pm/test.db");
            assert_eq!(config.data.dir, "/tmp/pm");
            assert_eq!(config.server.port, 9090);
            assert!(config.alerts.enabled());
            Ok(())
        });
    }

    #[test]
    fn prefixed_variables_reach_nested_sections() {
        Jail::expect_with(|jail| {
            jail.set_env("POWER_MONITOR_MONITOR__MIN_CAPACITY_MW", "250");
            jail.set_env("POWER_MONITOR_SCHEDULER__ENABLED", "false");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.monitor.min_capacity_mw, 250.0);
            assert!(!config.scheduler.enabled);
            Ok(())
        });
    }

    #[test]
    fn toml_file_is_layered_under_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "monitor.toml",
                r#"
                [server]
                bind = "127.0.0.1"
                port = 7000
                max_request_body_size_mb = 2

                [scheduler]
                enabled = false
                interval_hours = 12
                daily_at = "06:30"
                run_on_startup = false
                "#,
            )?;
            jail.set_env(CONFIG_PATH_ENV, "monitor.toml");
            jail.set_env("PORT", "7001");

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.server.bind, "127.0.0.1");
            assert_eq!(config.server.port, 7001);
            assert_eq!(config.scheduler.interval_hours, 12);
            assert_eq!(
                config.scheduler.daily_time().map_err(|e| e.to_string())?,
                chrono::NaiveTime::from_hms_opt(6, 30, 0).unwrap()
            );
            Ok(())
        });
    }

    #[test]
    fn invalid_daily_time_is_rejected() {
        let mut config = Config::default();
        config.scheduler.daily_at = "8 o'clock".to_string();
        assert!(matches!(config.validate(), Err(MonitorError::ConfigError { .. })));
    }

    #[test]
    fn empty_api_key_disables_alerts() {
        let mut config = Config::default();
        config.alerts.resend_api_key = Some("  ".to_string());
        assert!(!config.alerts.enabled());
    }
}
