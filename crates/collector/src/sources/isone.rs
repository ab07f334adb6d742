use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use tracing::info;

use super::{CapacityColumns, QueueSource, StateRule, TableMapping};
use crate::fetcher::Fetcher;
use crate::table::Table;

static MAPPING: TableMapping = TableMapping {
    utility: "ISO-NE",
    prefix: "ISONE",
    state: StateRule::Column(&["ST", "State"], "MA"),
    capacity: CapacityColumns::Named(&["Net MW", "Summer MW", "Winter MW", "MW", "Capacity"]),
    id: &["QP", "Queue Position"],
    name: &["Alternative Name", "Unit", "Project"],
    county: &["County"],
    customer: &["Developer"],
    fuel: &["Fuel Type", "Fuel"],
    status: &["Status"],
};

/// ISO New England interconnection request tracking page (an HTML table).
pub struct IsoNeSource {
    url: String,
}

impl IsoNeSource {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    pub fn parse(&self, html: &str, min_capacity_mw: f64) -> Result<Vec<ProjectRecord>, MonitorError> {
        let table = Table::from_html(MAPPING.utility, html)?;
        MAPPING.map(&table, &self.url, min_capacity_mw)
    }
}

#[async_trait]
impl QueueSource for IsoNeSource {
    fn name(&self) -> &str {
        MAPPING.utility
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let body = fetcher.text(MAPPING.utility, &self.url).await?;
        let projects = self.parse(&body, fetcher.min_capacity_mw())?;
        info!(source = "ISO-NE", projects = projects.len(), "Parsed request tracking table");
        Ok(projects)
    }
}
