//! Command implementations.

pub mod config;
pub mod endpoint;
pub mod query;

pub use config::run_config;
pub use endpoint::run_endpoint;
pub use query::{run_build, run_query};
