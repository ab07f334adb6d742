//! Interconnection queue sources, one per grid operator plus the Berkeley Lab dataset.

use async_trait::async_trait;
use power_models::{Config, MonitorError, ProjectRecord};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::extract::extract_capacity;
use crate::fetcher::Fetcher;
use crate::record::RawProject;
use crate::table::{cell, Table};

pub mod berkeley;
pub mod caiso;
pub mod ercot;
pub mod isone;
pub mod miso;
pub mod nyiso;
pub mod pjm;
pub mod spp;
pub mod workbook;

pub use berkeley::BerkeleyLabSource;
pub use isone::IsoNeSource;
pub use miso::MisoSource;
pub use pjm::PjmSource;
pub use spp::SppSource;
pub use workbook::WorkbookSource;

#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Name recorded in the sync log.
    fn name(&self) -> &str;

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError>;
}

/// PJM projects taken from the most recent Berkeley Lab sync.
#[derive(Clone, Default)]
pub struct PjmCache(Arc<RwLock<Vec<ProjectRecord>>>);

impl PjmCache {
    pub async fn replace(&self, projects: Vec<ProjectRecord>) {
        *self.0.write().await = projects;
    }

    pub async fn snapshot(&self) -> Vec<ProjectRecord> {
        self.0.read().await.clone()
    }
}

/// The real-time operator feeds plus the less frequent Berkeley Lab source.
pub struct SourceSet {
    pub realtime: Vec<Arc<dyn QueueSource>>,
    pub berkeley: Arc<dyn QueueSource>,
}

impl SourceSet {
    pub fn from_config(config: &Config) -> Self {
        let sources = &config.sources;
        let pjm_cache = PjmCache::default();

        let mut realtime: Vec<Arc<dyn QueueSource>> = vec![
            Arc::new(caiso::source(sources.caiso_url.clone())),
            Arc::new(nyiso::source(sources.nyiso_url.clone())),
            Arc::new(IsoNeSource::new(sources.isone_url.clone())),
            Arc::new(MisoSource::new(sources.miso_url.clone())),
        ];
        match &sources.ercot_url {
            Some(url) if !url.trim().is_empty() => {
                realtime.push(Arc::new(ercot::source(url.clone())));
            }
            _ => tracing::info!("ERCOT: no queue report URL configured, source disabled"),
        }
        realtime.push(Arc::new(SppSource::new(sources.spp_url.clone())));
        realtime.push(Arc::new(PjmSource::new(
            pjm_cache.clone(),
            sources.pjm_export_urls.clone(),
            sources.pjm_dataminer_url.clone(),
        )));

        Self {
            realtime,
            berkeley: Arc::new(BerkeleyLabSource::new(
                sources.berkeley_urls.clone(),
                pjm_cache,
            )),
        }
    }
}

pub(crate) enum StateRule {
    Fixed(&'static str),
    Column(&'static [&'static str], &'static str),
}

pub(crate) enum CapacityColumns {
    /// Named columns, first present one per candidate, in order.
    Named(&'static [&'static str]),
    /// Any column whose header mentions one of the keywords.
    Matching(&'static [&'static str]),
}

/// Column layout of an operator's tabular queue report.
pub(crate) struct TableMapping {
    pub utility: &'static str,
    /// Prefix for request ids, usually the utility name.
    pub prefix: &'static str,
    pub state: StateRule,
    pub capacity: CapacityColumns,
    pub id: &'static [&'static str],
    pub name: &'static [&'static str],
    pub county: &'static [&'static str],
    pub customer: &'static [&'static str],
    pub fuel: &'static [&'static str],
    pub status: &'static [&'static str],
}

impl TableMapping {
    /// Rows whose first capacity column yielding a value clears `min_capacity_mw`.
    pub fn map(
        &self,
        table: &Table,
        source_url: &str,
        min_capacity_mw: f64,
    ) -> Result<Vec<ProjectRecord>, MonitorError> {
        let capacity_columns: Vec<usize> = match self.capacity {
            CapacityColumns::Named(names) => {
                names.iter().filter_map(|n| table.column(&[*n])).collect()
            }
            CapacityColumns::Matching(keywords) => table.columns_matching(keywords),
        };
        if capacity_columns.is_empty() {
            return Err(MonitorError::parse(
                self.utility,
                format!("no capacity column among headers {:?}", table.headers),
            ));
        }

        let id = table.column(self.id);
        let name = table.column(self.name);
        let county = table.column(self.county);
        let customer = table.column(self.customer);
        let fuel = table.column(self.fuel);
        let status = table.column(self.status);
        let state = match self.state {
            StateRule::Fixed(_) => None,
            StateRule::Column(names, _) => table.column(names),
        };

        let projects = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(idx, row)| {
                let capacity_mw = capacity_columns
                    .iter()
                    .find_map(|&c| extract_capacity(cell(row, Some(c)), min_capacity_mw))?;

                let state = match self.state {
                    StateRule::Fixed(s) => s.to_string(),
                    StateRule::Column(_, default) => {
                        let value = cell(row, state);
                        (if value.is_empty() { default } else { value }).to_string()
                    }
                };
                let request_id = match cell(row, id) {
                    "" => idx.to_string(),
                    value => value.to_string(),
                };

                Some(
                    RawProject {
                        request_id: format!("{}_{}", self.prefix, request_id),
                        project_name: cell(row, name).to_string(),
                        capacity_mw,
                        county: cell(row, county).to_string(),
                        state,
                        customer: cell(row, customer).to_string(),
                        status: cell(row, status).to_string(),
                        fuel_type: cell(row, fuel).to_string(),
                    }
                    .into_record(self.utility, self.utility, source_url),
                )
            })
            .collect();

        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: TableMapping = TableMapping {
        utility: "TEST",
        prefix: "TEST",
        state: StateRule::Column(&["State", "ST"], "ZZ"),
        capacity: CapacityColumns::Named(&["Summer MW", "Winter MW"]),
        id: &["Queue ID"],
        name: &["Project Name"],
        county: &["County"],
        customer: &["Developer"],
        fuel: &["Fuel"],
        status: &["Status"],
    };

    fn table() -> Table {
        Table {
            headers: ["Queue ID", "Project Name", "Summer MW", "Winter MW", "ST", "Fuel"]
                .map(String::from)
                .to_vec(),
            rows: vec![
                ["Q1", "Alpha", "", "250", "NM", "Gas"].map(String::from).to_vec(),
                ["", "Beta", "300", "310", "", "Solar"].map(String::from).to_vec(),
                ["Q3", "Gamma", "50", "60", "TX", "Wind"].map(String::from).to_vec(),
            ],
        }
    }

    #[test]
    fn maps_rows_above_threshold() {
        let projects = MAPPING.map(&table(), "https://test", 100.0).unwrap();
        assert_eq!(projects.len(), 2);

        assert_eq!(projects[0].request_id, "TEST_Q1");
        assert_eq!(projects[0].capacity_mw, 250.0);
        assert_eq!(projects[0].state, "NM");
        assert_eq!(projects[0].status, "Active");
        assert_eq!(projects[0].source, "TEST");

        // falls back to row index and default state
        assert_eq!(projects[1].request_id, "TEST_1");
        assert_eq!(projects[1].capacity_mw, 300.0);
        assert_eq!(projects[1].state, "ZZ");
    }

    #[test]
    fn missing_capacity_columns_is_an_error() {
        let mut t = table();
        t.headers[2] = "Summer".into();
        t.headers[3] = "Winter".into();
        assert!(matches!(
            MAPPING.map(&t, "", 100.0),
            Err(MonitorError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn pjm_cache_replaces_contents() {
        let cache = PjmCache::default();
        assert!(cache.snapshot().await.is_empty());
        let projects = MAPPING.map(&table(), "", 100.0).unwrap();
        cache.replace(projects.clone()).await;
        cache.replace(projects).await;
        assert_eq!(cache.snapshot().await.len(), 2);
    }

    #[test]
    fn ercot_only_when_configured() {
        let mut config = Config::default();
        let set = SourceSet::from_config(&config);
        let names: Vec<&str> = set.realtime.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["CAISO", "NYISO", "ISO-NE", "MISO", "SPP", "PJM"]);

        config.sources.ercot_url = Some("https://ercot.test/queue.xlsx".into());
        let set = SourceSet::from_config(&config);
        assert_eq!(set.realtime.len(), 7);
        assert_eq!(set.realtime[4].name(), "ERCOT");
        assert_eq!(set.berkeley.name(), "Berkeley Lab");
    }
}
