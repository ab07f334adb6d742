//! ERCOT GIS report. Registered only when a report URL is configured.

use super::{CapacityColumns, StateRule, TableMapping, WorkbookSource};

pub(crate) static MAPPING: TableMapping = TableMapping {
    utility: "ERCOT",
    prefix: "ERCOT",
    state: StateRule::Fixed("TX"),
    capacity: CapacityColumns::Matching(&["MW", "CAPACITY"]),
    id: &["INR", "Queue ID", "GINR Number"],
    name: &["Project Name"],
    county: &["County"],
    customer: &["Interconnecting Entity", "Developer"],
    fuel: &["Fuel", "Technology"],
    status: &["Status", "GIM Study Phase"],
};

pub fn source(url: String) -> WorkbookSource {
    WorkbookSource::new(&MAPPING, url)
}
