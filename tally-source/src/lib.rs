//! Tally Source
//!
//! Reads report data from the relational store.
//!
//! - `db`: connection settings and connection lifecycle
//! - `client`: the [`RowSource`] seam and its MySQL implementation
//! - `repository`: the fixed report queries

pub mod client;
pub mod db;
mod decode;
pub mod repository;

pub use client::{MySqlRowSource, RowSource};
pub use db::SourceConfig;
