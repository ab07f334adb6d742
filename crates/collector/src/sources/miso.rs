use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use serde_json::Value;
use tracing::info;

use super::QueueSource;
use crate::extract::{extract_capacity, json_first, json_text};
use crate::fetcher::Fetcher;
use crate::record::RawProject;

const NAME: &str = "MISO";

/// MISO generator interconnection queue API (a JSON array of projects).
pub struct MisoSource {
    url: String,
}

impl MisoSource {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    pub fn parse(&self, data: &Value, min_capacity_mw: f64) -> Result<Vec<ProjectRecord>, MonitorError> {
        let entries = data
            .as_array()
            .ok_or_else(|| MonitorError::parse(NAME, "expected a JSON array of projects"))?;

        let projects = entries
            .iter()
            .filter_map(|entry| {
                let capacity_mw = ["summerNetMW", "winterNetMW"]
                    .iter()
                    .find_map(|k| extract_capacity(&json_text(entry.get(*k)), min_capacity_mw))?;

                let id = match json_first(entry, &["jNumber", "queueNumber"]) {
                    id if id.is_empty() => "UNK".to_string(),
                    id => id,
                };

                Some(
                    RawProject {
                        request_id: format!("{NAME}_{id}"),
                        project_name: json_text(entry.get("projectName")),
                        capacity_mw,
                        county: json_text(entry.get("county")),
                        state: json_text(entry.get("state")),
                        customer: json_text(entry.get("interconnectionEntity")),
                        status: json_text(entry.get("status")),
                        fuel_type: json_text(entry.get("fuelType")),
                    }
                    .into_record(NAME, NAME, &self.url),
                )
            })
            .collect();

        Ok(projects)
    }
}

#[async_trait]
impl QueueSource for MisoSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let data = fetcher.json(NAME, &self.url).await?;
        let projects = self.parse(&data, fetcher.min_capacity_mw())?;
        info!(source = NAME, projects = projects.len(), "Parsed queue API response");
        Ok(projects)
    }
}
