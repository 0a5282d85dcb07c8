pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod sink;
pub mod types;
