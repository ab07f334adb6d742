pub mod alert;
pub mod config;
pub mod error;
pub mod project;
pub mod stats;
pub mod sync;

pub use alert::*;
pub use config::*;
pub use error::*;
pub use project::*;
pub use stats::*;
pub use sync::*;
