//! Tally Core
//!
//! Core types and abstractions for the Tally report pipeline.
//!
//! This crate contains:
//! - Domain types: queries, tables, artifacts, recipients, receipts, run reports
//! - Errors: the failure taxonomy shared by every stage

pub mod domain;
pub mod error;

pub use domain::artifact::{Artifact, ArtifactFormat, artifact_path};
pub use domain::delivery::{DeliveryReceipt, SecurityMode};
pub use domain::query::{QueryParam, QuerySpec};
pub use domain::recipients::Recipients;
pub use domain::run::{RunReport, RunState};
pub use domain::table::{TabularResult, Value};
pub use error::{ErrorKind, PipelineError, Result, RunFailure, Stage};
