use async_trait::async_trait;
use power_models::{MonitorError, ProjectRecord};
use tracing::info;

use super::{CapacityColumns, QueueSource, StateRule, TableMapping};
use crate::fetcher::Fetcher;
use crate::table::Table;

static MAPPING: TableMapping = TableMapping {
    utility: "SPP",
    prefix: "SPP",
    state: StateRule::Column(&["State"], ""),
    capacity: CapacityColumns::Matching(&["MW"]),
    id: &["Generation Interconnection Number", "Request ID"],
    name: &["Project Name", "Facility Name"],
    county: &["Nearest Town or County", "County"],
    customer: &["Developer"],
    fuel: &["Fuel Type", "Generation Type"],
    status: &["Status"],
};

/// Southwest Power Pool active requests CSV. The export opens with a few metadata lines
/// before the header row.
pub struct SppSource {
    url: String,
}

impl SppSource {
    pub fn new(url: String) -> Self {
        Self { url }
    }

    pub fn parse(&self, csv: &str, min_capacity_mw: f64) -> Result<Vec<ProjectRecord>, MonitorError> {
        let table = Table::from_csv(MAPPING.utility, csv)?;
        MAPPING.map(&table, &self.url, min_capacity_mw)
    }
}

#[async_trait]
impl QueueSource for SppSource {
    fn name(&self) -> &str {
        MAPPING.utility
    }

    async fn fetch(&self, fetcher: &Fetcher) -> Result<Vec<ProjectRecord>, MonitorError> {
        let body = fetcher.text(MAPPING.utility, &self.url).await?;
        let projects = self.parse(&body, fetcher.min_capacity_mw())?;
        info!(source = "SPP", projects = projects.len(), "Parsed active requests");
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\"Southwest Power Pool\",,,,,\n\
        \"Active GI Requests as of 05/01/2024\",,,,,\n\
        Generation Interconnection Number, Nearest Town or County,State,Capacity (MW),Fuel Type,Status\n\
        GEN-2024-001,Finney,KS,400,Wind,IA FULLY EXECUTED\n\
        GEN-2024-002,Ford,KS,75,Solar,DISIS STAGE\n\
        GEN-2024-003,Tulsa,OK,\"1,200\",Gas,\n";

    #[test]
    fn parses_requests_after_metadata() {
        let source = SppSource::new("https://spp.test/csv".into());
        let projects = source.parse(CSV, 100.0).unwrap();
        assert_eq!(projects.len(), 2);

        assert_eq!(projects[0].request_id, "SPP_GEN-2024-001");
        assert_eq!(projects[0].county, "Finney");
        assert_eq!(projects[0].state, "KS");
        assert_eq!(projects[0].fuel_type, "Wind");
        assert_eq!(projects[0].status, "IA FULLY EXECUTED");
        assert_eq!(projects[0].source_url, "https://spp.test/csv");

        assert_eq!(projects[1].capacity_mw, 1200.0);
        assert_eq!(projects[1].status, "Active");
    }
}
