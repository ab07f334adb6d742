use super::{CapacityColumns, StateRule, TableMapping, WorkbookSource};

pub(crate) static MAPPING: TableMapping = TableMapping {
    utility: "NYISO",
    prefix: "NYISO",
    state: StateRule::Fixed("NY"),
    capacity: CapacityColumns::Matching(&["MW", "CAPACITY"]),
    id: &["Queue Pos.", "Queue Position"],
    name: &["Project Name", "Proposed Name"],
    county: &["County"],
    customer: &["Developer", "Interconnection Customer"],
    fuel: &["Type", "Fuel"],
    status: &["Status", "S"],
};

pub fn source(url: String) -> WorkbookSource {
    WorkbookSource::new(&MAPPING, url)
}
