//! Repository Module
//!
//! Fixed report queries. Each repository builds [`tally_core::QuerySpec`]
//! values; execution is left to a [`crate::RowSource`].

pub mod leads;

// Re-export for convenience
pub use leads as leads_repository;
