//! PJM has no free machine-readable queue feed, so several approaches are tried in turn.

use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use serde_json::Value;
use tracing::{debug, info};

use super::{CapacityColumns, PjmCache, QueueSource, StateRule, TableMapping};
use crate::extract::{extract_capacity, json_first};
use crate::fetcher::Fetcher;
use crate::record::RawProject;
use crate::table::Table;

const NAME: &str = "PJM";
const REFERER: &str = "https://www.pjm.com/planning/services-requests/interconnection-queues";
/// Smaller responses are error or login pages rather than the export.
const MIN_EXPORT_BYTES: usize = 10_000;

static EXPORT_MAPPING: TableMapping = TableMapping {
    utility: NAME,
    prefix: NAME,
    state: StateRule::Column(&["State"], ""),
    capacity: CapacityColumns::Matching(&["MW", "CAPACITY"]),
    id: &["Queue Number", "Queue_Number", "Queue ID"],
    name: &["Project Name", "Name"],
    county: &["County"],
    customer: &["Developer", "Interconnection Customer"],
    fuel: &["Fuel", "Fuel Type"],
    status: &["Status"],
};

pub struct PjmSource {
    cache: PjmCache,
    export_urls: Vec<String>,
    dataminer_url: String,
}

impl PjmSource {
    pub fn new(cache: PjmCache, export_urls: Vec<String>, dataminer_url: String) -> Self {
        Self {
            cache,
            export_urls,
            dataminer_url,
        }
    }

    pub fn parse_export(
        &self,
        url: &str,
        workbook: &[u8],
        min_capacity_mw: f64,
    ) -> Result<Vec<ProjectRecord>, MonitorError> {
        let table = Table::from_workbook(NAME, workbook)?;
        EXPORT_MAPPING.map(&table, url, min_capacity_mw)
    }

    pub fn parse_dataminer(&self, data: &Value, min_capacity_mw: f64) -> Vec<ProjectRecord> {
        let Some(entries) = data.as_array() else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|item| {
                let capacity_mw =
                    extract_capacity(&json_first(item, &["mw", "MW", "capacity"]), min_capacity_mw)?;
                let id = match json_first(item, &["queue_number", "id"]) {
                    id if id.is_empty() => "UNK".to_string(),
                    id => id,
                };
                Some(
                    RawProject {
                        request_id: format!("{NAME}_{id}"),
                        project_name: json_first(item, &["project_name", "name"]),
                        capacity_mw,
                        county: json_first(item, &["county"]),
                        state: json_first(item, &["state"]),
                        customer: json_first(item, &["developer"]),
                        status: json_first(item, &["status"]),
                        fuel_type: json_first(item, &["fuel"]),
                    }
                    .into_record(NAME, NAME, &self.dataminer_url),
                )
            })
            .collect()
    }

    async fn try_exports(&self, fetcher: &Fetcher) -> Option<Vec<ProjectRecord>> {
        for url in &self.export_urls {
            debug!(url = %url, "PJM: trying queue export");
            let body = match fetcher.bytes_with_referer(NAME, url, Some(REFERER)).await {
                Ok(body) if body.len() > MIN_EXPORT_BYTES => body,
                Ok(body) => {
                    debug!(url = %url, bytes = body.len(), "PJM: export response too small");
                    continue;
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "PJM: export unavailable");
                    continue;
                }
            };
            match self.parse_export(url, &body, fetcher.min_capacity_mw()) {
                Ok(projects) if !projects.is_empty() => return Some(projects),
                Ok(_) => debug!(url = %url, "PJM: export contained no qualifying projects"),
                Err(e) => debug!(url = %url, error = %e, "PJM: export could not be parsed"),
            }
        }
        None
    }

    async fn try_dataminer(&self, fetcher: &Fetcher) -> Option<Vec<ProjectRecord>> {
        match fetcher.json(NAME, &self.dataminer_url).await {
            Ok(data) => {
                let projects = self.parse_dataminer(&data, fetcher.min_capacity_mw());
                (!projects.is_empty()).then_some(projects)
            }
            Err(e) => {
                debug!(error = %e, "PJM: Data Miner feed unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl QueueSource for PjmSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let cached = self.cache.snapshot().await;
        if !cached.is_empty() {
            info!(projects = cached.len(), "PJM: using projects from last Berkeley Lab sync");
            return Ok(cached);
        }

        if let Some(projects) = self.try_exports(fetcher).await {
            info!(projects = projects.len(), "PJM: parsed queue export");
            return Ok(projects);
        }

        if let Some(projects) = self.try_dataminer(fetcher).await {
            info!(projects = projects.len(), "PJM: parsed Data Miner feed");
            return Ok(projects);
        }

        info!("PJM: no data available until the next Berkeley Lab sync");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(cache: PjmCache) -> PjmSource {
        PjmSource::new(cache, Vec::new(), "https://dataminer.test/json".into())
    }

    #[test]
    fn dataminer_items() {
        let data = json!([
            {"queue_number": "AG1-100", "project_name": "Ashburn Campus", "mw": 900,
             "county": "Loudoun", "state": "VA", "developer": "QTS", "fuel": "Load"},
            {"id": 55, "name": "Peaker", "MW": "250", "state": "PA", "fuel": "Natural Gas"},
            {"queue_number": "AG1-101", "mw": 30}
        ]);
        let projects = source(PjmCache::default()).parse_dataminer(&data, 100.0);
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].request_id, "PJM_AG1-100");
        assert_eq!(projects[0].hunter_score, 70);
        assert_eq!(projects[1].request_id, "PJM_55");
        assert_eq!(projects[1].source_url, "https://dataminer.test/json");
    }

    #[test]
    fn dataminer_non_array_is_empty() {
        let projects = source(PjmCache::default()).parse_dataminer(&json!({"items": []}), 100.0);
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn cache_wins_over_network() {
        let cache = PjmCache::default();
        let cached = source(PjmCache::default()).parse_dataminer(
            &json!([{"queue_number": "AF2-001", "mw": 400, "state": "VA"}]),
            100.0,
        );
        cache.replace(cached).await;

        let mut config = power_models::Config::default();
        config.monitor.max_retries = 1;
        let fetcher = Fetcher::new(&config.monitor).unwrap();

        // No URLs are reachable from the test; the cache must short-circuit them.
        let pjm = PjmSource::new(cache, vec!["http://127.0.0.1:9/queue.xlsx".into()], String::new());
        let projects = pjm.fetch(&fetcher).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].request_id, "PJM_AF2-001");
    }
}
