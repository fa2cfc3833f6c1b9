//! The conversion pipeline: type mapping, DDL emission, row copying,
//! trigger synthesis, and the orchestrator that sequences them.

pub mod copier;
pub mod ddl;
pub mod defaults;
pub mod orchestrator;
pub mod triggers;
pub mod types;

pub use orchestrator::{convert, ConvertOptions};
