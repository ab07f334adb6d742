use power_models::{
    truncate_chars, ProjectRecord, ProjectType, MAX_COUNTY_LEN, MAX_CUSTOMER_LEN, MAX_NAME_LEN,
    MAX_STATE_LEN,
};

use crate::classify::{classify_project, hunter_score, DATACENTER_SCORE_THRESHOLD};
use crate::extract::data_hash;

/// Fields read from a queue row before normalization and scoring.
#[derive(Debug, Clone, Default)]
pub struct RawProject {
    pub request_id: String,
    pub project_name: String,
    pub capacity_mw: f64,
    pub county: String,
    pub state: String,
    pub customer: String,
    pub status: String,
    pub fuel_type: String,
}

fn clean(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

impl RawProject {
    /// Normalizes the row and attaches classification, hunter score and dedup hash.
    pub fn into_record(self, utility: &str, source: &str, source_url: &str) -> ProjectRecord {
        let mut project_name = truncate_chars(&clean(&self.project_name), MAX_NAME_LEN);
        if project_name.is_empty() {
            project_name = "Unknown".to_string();
        }
        let mut status = clean(&self.status);
        if status.is_empty() {
            status = "Active".to_string();
        }

        let mut record = ProjectRecord {
            request_id: clean(&self.request_id),
            project_name,
            capacity_mw: self.capacity_mw,
            county: truncate_chars(&clean(&self.county), MAX_COUNTY_LEN),
            state: truncate_chars(&clean(&self.state), MAX_STATE_LEN).to_uppercase(),
            customer: truncate_chars(&clean(&self.customer), MAX_CUSTOMER_LEN),
            utility: utility.to_string(),
            status,
            fuel_type: clean(&self.fuel_type),
            source: source.to_string(),
            source_url: source_url.to_string(),
            project_type: ProjectType::Other,
            hunter_score: 0,
            hunter_notes: String::new(),
            data_hash: String::new(),
        };

        score_record(&mut record);
        record.data_hash = data_hash(
            &record.project_name,
            record.capacity_mw,
            &record.state,
            &record.utility,
        );
        record
    }
}

/// Recomputes project type, hunter score and notes from the record's own fields.
pub fn score_record(record: &mut ProjectRecord) {
    record.project_type =
        classify_project(&record.project_name, &record.customer, &record.fuel_type);
    let scored = hunter_score(record);
    if scored.score >= DATACENTER_SCORE_THRESHOLD {
        record.project_type = ProjectType::Datacenter;
    }
    record.hunter_score = scored.score;
    record.hunter_notes = scored.notes;
}
