pub mod alerts;
pub mod migrations;
pub mod monitor;
pub mod registry;
pub mod scheduler;

pub use alerts::*;
pub use migrations::*;
pub use monitor::*;
pub use registry::*;
pub use scheduler::*;
