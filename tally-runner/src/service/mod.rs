//! Service layer
//!
//! Services contain the business logic of a run: materializing the artifact
//! and sequencing the stages of the report pipeline.
//!
//! Collaborators are trait-based to enable testing and dependency injection.

mod artifact;
mod pipeline;

pub use artifact::CsvArtifactWriter;
pub use pipeline::{PipelineSettings, ReportPipeline, Trigger};
