use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALERT_MIN_CAPACITY: f64 = 200.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertSubscription {
    pub id: i64,
    pub email: String,
    pub min_capacity: f64,
    pub states: Vec<String>,
    pub project_types: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub min_capacity: Option<f64>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub project_types: Vec<String>,
}

impl AlertSubscription {
    /// Whether a newly stored project falls inside this subscription's filters.
    pub fn matches(&self, project: &crate::ProjectRecord) -> bool {
        if project.capacity_mw < self.min_capacity {
            return false;
        }
        if !self.states.is_empty()
            && !project.state.is_empty()
            && !self.states.iter().any(|s| s.eq_ignore_ascii_case(&project.state))
        {
            return false;
        }
        if !self.project_types.is_empty()
            && !self
                .project_types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(project.project_type.as_str()))
        {
            return false;
        }
        true
    }
}
