use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_NAME_LEN: usize = 500;
pub const MAX_COUNTY_LEN: usize = 200;
pub const MAX_CUSTOMER_LEN: usize = 500;
pub const MAX_STATE_LEN: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Datacenter,
    Storage,
    Solar,
    Wind,
    Gas,
    Nuclear,
    Hydro,
    Other,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Datacenter => "datacenter",
            ProjectType::Storage => "storage",
            ProjectType::Solar => "solar",
            ProjectType::Wind => "wind",
            ProjectType::Gas => "gas",
            ProjectType::Nuclear => "nuclear",
            ProjectType::Hydro => "hydro",
            ProjectType::Other => "other",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "datacenter" => Ok(ProjectType::Datacenter),
            "storage" => Ok(ProjectType::Storage),
            "solar" => Ok(ProjectType::Solar),
            "wind" => Ok(ProjectType::Wind),
            "gas" => Ok(ProjectType::Gas),
            "nuclear" => Ok(ProjectType::Nuclear),
            "hydro" => Ok(ProjectType::Hydro),
            "other" => Ok(ProjectType::Other),
            _ => Err(format!("Invalid project type: {s}")),
        }
    }
}

/// A normalized queue entry as produced by a collector source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub request_id: String,
    pub project_name: String,
    pub capacity_mw: f64,
    pub county: String,
    pub state: String,
    pub customer: String,
    pub utility: String,
    pub status: String,
    pub fuel_type: String,
    pub source: String,
    pub source_url: String,
    pub project_type: ProjectType,
    pub hunter_score: i64,
    pub hunter_notes: String,
    pub data_hash: String,
}

/// A project as stored in the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub request_id: String,
    pub project_name: String,
    pub capacity_mw: f64,
    pub county: String,
    pub state: String,
    pub customer: String,
    pub utility: String,
    pub status: String,
    pub fuel_type: String,
    pub source: String,
    pub source_url: String,
    pub project_type: ProjectType,
    pub hunter_score: i64,
    pub hunter_notes: String,
    pub data_hash: String,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Project {
    /// The collector-side view of a stored project, used when re-scoring.
    pub fn to_record(&self) -> ProjectRecord {
        ProjectRecord {
            request_id: self.request_id.clone(),
            project_name: self.project_name.clone(),
            capacity_mw: self.capacity_mw,
            county: self.county.clone(),
            state: self.state.clone(),
            customer: self.customer.clone(),
            utility: self.utility.clone(),
            status: self.status.clone(),
            fuel_type: self.fuel_type.clone(),
            source: self.source.clone(),
            source_url: self.source_url.clone(),
            project_type: self.project_type,
            hunter_score: self.hunter_score,
            hunter_notes: self.hunter_notes.clone(),
            data_hash: self.data_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectQuery {
    pub min_capacity: Option<f64>,
    pub state: Option<String>,
    pub project_type: Option<String>,
    pub source: Option<String>,
    pub search: Option<String>,
    pub min_score: Option<i64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProjectQuery {
    pub const DEFAULT_PER_PAGE: u32 = 50;
    pub const MAX_PER_PAGE: u32 = 1000;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() as i64 - 1) * self.per_page() as i64
    }

    /// Text filters with blank values dropped, as HTML forms submit empty fields.
    pub fn text_filter(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterOptions {
    pub states: Vec<String>,
    pub project_types: Vec<String>,
}

/// Truncates on a character boundary.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
