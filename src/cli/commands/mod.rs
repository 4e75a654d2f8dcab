//! CLI command implementations.

mod config;
mod doctor;
mod fetch;
mod index;
mod search;
mod serve;
mod stats;

pub use config::run_config;
pub use doctor::run_doctor;
pub use fetch::run_fetch;
pub use index::run_index;
pub use search::{run_search, SearchArgs};
pub use serve::run_serve;
pub use stats::run_stats;
