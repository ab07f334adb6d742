//! Interconnection queue collection: fetching operator reports, reading their tables and
//! normalizing rows into scored [`power_models::ProjectRecord`]s.

pub mod classify;
pub mod extract;
pub mod fetcher;
pub mod record;
pub mod sources;
pub mod table;

pub use classify::{classify_project, hunter_score, HunterScore};
pub use extract::{data_hash, extract_capacity};
pub use fetcher::Fetcher;
pub use record::{score_record, RawProject};
pub use sources::{PjmCache, QueueSource, SourceSet};
pub use table::Table;
