// Sales pipeline: source, cleaning, normalization, categorization, aggregation

pub mod aggregate;
pub mod categorize;
pub mod cleaning;
pub mod context;
pub mod normalize;
pub mod runner;
pub mod source;

pub use context::{RunContext, RunReport, RunState};
pub use runner::{PipelineRunner, RunParams};
