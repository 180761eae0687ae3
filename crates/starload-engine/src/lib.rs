//! ETL orchestration engine.
//!
//! Wires the three source connectors through the transformer and loader
//! into the warehouse, with one audited run per source flow. Entry points
//! are [`Pipeline::run`] for a single source and [`Pipeline::run_all`] for
//! a whole sweep.

#![warn(clippy::pedantic)]

pub mod config;
pub mod connectors;
pub mod errors;
pub mod load;
pub mod orchestrator;
pub mod recorder;
pub mod result;
pub mod transform;

pub use config::types::PipelineConfig;
pub use errors::PipelineError;
pub use orchestrator::Pipeline;
pub use result::{FlowReport, RunSummary};
