use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncLogEntry {
    pub id: i64,
    pub source: String,
    pub sync_time: DateTime<Utc>,
    pub projects_found: i64,
    pub projects_new: i64,
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringRun {
    pub id: i64,
    pub run_date: DateTime<Utc>,
    pub sources_checked: i64,
    pub requests_found: i64,
    pub requests_stored: i64,
    pub duration_seconds: f64,
    pub status: String,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceCount {
    pub source: String,
    pub projects: usize,
}

/// Outcome of one monitoring cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub total: usize,
    pub new: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub by_source: Vec<SourceCount>,
    pub errors: Vec<String>,
    pub berkeley_synced: bool,
    pub alerts_sent: usize,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSummary {
    pub inserted: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub inserted_records: Vec<crate::ProjectRecord>,
}
