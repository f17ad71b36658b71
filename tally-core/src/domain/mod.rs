//! Core domain types
//!
//! This module contains the data model shared by every stage of the pipeline.
//! The source crate produces tables, the runner turns them into artifacts, and
//! the mail crate turns artifacts into delivered messages.

pub mod artifact;
pub mod delivery;
pub mod query;
pub mod recipients;
pub mod run;
pub mod table;
