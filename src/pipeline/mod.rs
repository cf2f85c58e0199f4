// Data processing pipeline: ingestion, processing stages, and export

pub mod export;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod report;

pub use pipeline::{Pipeline, TransformOutput};
