//! Process glue for the `parlour` chat server: configuration, logging setup,
//! listener binding, signal handling and shutdown.

pub mod config;

pub mod run;
pub use run::Parlour;

mod tracing_config;
pub use tracing_config::build_subscriber;
