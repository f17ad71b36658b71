//! Artifact domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A report file materialized on disk
///
/// Created fresh by one run and handed to the composer, which only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: ArtifactFormat,
    pub row_count: usize,
}

/// On-disk format of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactFormat {
    Csv,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Csv => "csv",
        }
    }
}

impl Artifact {
    /// Base file name, used as the attachment name
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("report.{}", self.format.extension()))
    }
}

/// Builds the artifact path for one run
///
/// The run date and run id are both part of the name, so concurrent runs
/// never touch the same file.
pub fn artifact_path(
    dir: &Path,
    stem: &str,
    run_date: NaiveDate,
    run_id: Uuid,
    format: ArtifactFormat,
) -> PathBuf {
    dir.join(format!(
        "{}_{}_{}.{}",
        stem,
        run_date.format("%Y-%m-%d"),
        run_id.simple(),
        format.extension()
    ))
}
