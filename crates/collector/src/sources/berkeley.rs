//! Berkeley Lab "Queued Up" dataset: every ISO's queue in a single annual workbook.

use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use tracing::{debug, info};

use super::{PjmCache, QueueSource};
use crate::extract::extract_capacity;
use crate::fetcher::Fetcher;
use crate::record::RawProject;
use crate::table::{cell, Table};

pub const NAME: &str = "Berkeley Lab";
const REFERER: &str = "https://emp.lbl.gov/queues";
/// The real workbook is tens of megabytes; anything small is an error page.
const MIN_WORKBOOK_BYTES: usize = 100_000;

const ENTITY_MAP: &[(&[&str], &str)] = &[
    (&["PJM"], "PJM"),
    (&["MISO"], "MISO"),
    (&["CAISO"], "CAISO"),
    (&["ERCOT"], "ERCOT"),
    (&["SPP"], "SPP"),
    (&["NYISO"], "NYISO"),
    (&["ISO-NE", "ISONE"], "ISO-NE"),
];

/// Maps the dataset's entity column onto the utility names used by the direct sources.
pub fn utility_for_entity(entity: &str) -> String {
    let entity = entity.trim().to_uppercase();
    if entity.is_empty() {
        return "Other".to_string();
    }
    ENTITY_MAP
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| entity.contains(n)))
        .map(|(_, utility)| utility.to_string())
        .unwrap_or_else(|| entity.chars().take(20).collect())
}

pub struct BerkeleyLabSource {
    urls: Vec<String>,
    pjm_cache: PjmCache,
}

impl BerkeleyLabSource {
    pub fn new(urls: Vec<String>, pjm_cache: PjmCache) -> Self {
        Self { urls, pjm_cache }
    }

    pub fn parse(&self, table: &Table, source_url: &str, min_capacity_mw: f64) -> Vec<ProjectRecord> {
        let entity = table.column_containing(&["entity", "iso", "rto", "region"]);
        let capacity = table.column_containing(&["capacity_mw", "mw", "capacity"]);
        let name = table.column_containing(&["project_name", "project", "name"]);
        let id = table.column_containing(&["queue_id", "request_id", "id"]);
        let state = table.column_containing(&["state"]);
        let county = table.column_containing(&["county"]);
        let status = table.column_containing(&["queue_status", "status"]);
        let fuel = table.column_containing(&["resource", "fuel", "type"]);

        table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let capacity_mw = extract_capacity(cell(row, capacity), min_capacity_mw)?;
                let utility = utility_for_entity(cell(row, entity));
                let request_id = match cell(row, id) {
                    "" => idx.to_string(),
                    value => value.to_string(),
                };
                Some(
                    RawProject {
                        request_id: format!("{utility}_{request_id}"),
                        project_name: cell(row, name).to_string(),
                        capacity_mw,
                        county: cell(row, county).to_string(),
                        state: cell(row, state).to_string(),
                        customer: String::new(),
                        status: cell(row, status).to_string(),
                        fuel_type: cell(row, fuel).to_string(),
                    }
                    .into_record(&utility, NAME, source_url),
                )
            })
            .collect()
    }

    async fn download(&self, fetcher: &Fetcher) -> Result<(String, Table), MonitorError> {
        for url in &self.urls {
            info!(url = %url, "Berkeley Lab: trying download");
            match fetcher.bytes_with_referer(NAME, url, Some(REFERER)).await {
                Ok(body) if body.len() > MIN_WORKBOOK_BYTES => {
                    info!(url = %url, megabytes = body.len() as f64 / 1_048_576.0, "Berkeley Lab: downloaded");
                    match Table::from_workbook(NAME, &body) {
                        Ok(table) => return Ok((url.clone(), table)),
                        Err(e) => debug!(url = %url, error = %e, "Berkeley Lab: unreadable workbook"),
                    }
                }
                Ok(body) => debug!(url = %url, bytes = body.len(), "Berkeley Lab: response too small"),
                Err(e) => debug!(url = %url, error = %e, "Berkeley Lab: download failed"),
            }
        }
        Err(MonitorError::upstream(
            NAME,
            "could not download the data file from any known URL",
        ))
    }
}

#[async_trait]
impl QueueSource for BerkeleyLabSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let (url, table) = self.download(fetcher).await?;
        info!(rows = table.len(), "Berkeley Lab: processing workbook");

        let projects = self.parse(&table, &url, fetcher.min_capacity_mw());
        let pjm: Vec<ProjectRecord> = projects
            .iter()
            .filter(|p| p.utility == "PJM")
            .cloned()
            .collect();
        info!(
            projects = projects.len(),
            pjm_cached = pjm.len(),
            "Berkeley Lab: parsed dataset"
        );
        self.pjm_cache.replace(pjm).await;
        Ok(projects)
    }
}
