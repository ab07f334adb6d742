use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UtilityStat {
    pub utility: String,
    pub count: i64,
    pub total_mw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateStat {
    pub state: String,
    pub count: i64,
    pub total_mw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeStat {
    pub project_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceStat {
    pub source: String,
    pub count: i64,
    pub last_update: Option<DateTime<Utc>>,
}

/// Hunter score distribution: high (70+), medium (40-69), low (<40).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBands {
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_projects: i64,
    pub recent_projects: i64,
    pub high_capacity: i64,
    pub datacenter_projects: i64,
    pub total_capacity_mw: f64,
    pub by_utility: Vec<UtilityStat>,
    pub by_state: Vec<StateStat>,
    pub top_states: Vec<StateStat>,
    pub by_type: Vec<TypeStat>,
    pub score_bands: ScoreBands,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Body of `GET /api/monitoring`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoringOverview {
    pub runs: Vec<crate::MonitoringRun>,
    pub source_stats: Vec<SourceStat>,
    pub sync_log: Vec<crate::SyncLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescoreResponse {
    pub updated: usize,
}
