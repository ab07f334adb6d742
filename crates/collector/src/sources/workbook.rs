use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use tracing::info;

use super::{QueueSource, TableMapping};
use crate::fetcher::Fetcher;
use crate::table::Table;

/// An operator that publishes its queue as a single spreadsheet download.
pub struct WorkbookSource {
    mapping: &'static TableMapping,
    url: String,
}

impl WorkbookSource {
    pub(crate) fn new(mapping: &'static TableMapping, url: String) -> Self {
        Self { mapping, url }
    }

    pub fn parse(
        &self,
        workbook: &[u8],
        min_capacity_mw: f64,
    ) -> Result<Vec<ProjectRecord>, MonitorError> {
        let table = Table::from_workbook(self.mapping.utility, workbook)?;
        self.mapping.map(&table, &self.url, min_capacity_mw)
    }
}

#[async_trait]
impl QueueSource for WorkbookSource {
    fn name(&self) -> &str {
        self.mapping.utility
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let body = fetcher.bytes(self.mapping.utility, &self.url).await?;
        let projects = self.parse(&body, fetcher.min_capacity_mw())?;
        info!(
            source = self.mapping.utility,
            bytes = body.len(),
            projects = projects.len(),
            "Parsed queue workbook"
        );
        Ok(projects)
    }
}
