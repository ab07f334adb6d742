//! California ISO public queue report.

use super::{CapacityColumns, StateRule, TableMapping, WorkbookSource};

pub(crate) static MAPPING: TableMapping = TableMapping {
    utility: "CAISO",
    prefix: "CAISO",
    state: StateRule::Fixed("CA"),
    capacity: CapacityColumns::Matching(&["MW", "CAPACITY"]),
    id: &["Queue Position", "Queue ID"],
    name: &["Project Name", "Generating Facility"],
    county: &["County"],
    customer: &["Interconnection Customer", "Developer"],
    fuel: &["Fuel", "Fuel-1", "Type"],
    status: &["Status", "Application Status"],
};

pub fn source(url: String) -> WorkbookSource {
    WorkbookSource::new(&MAPPING, url)
}
