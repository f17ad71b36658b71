//! Artifact writer service
//!
//! Materializes a tabular result as a CSV file. Any previous file at the
//! target path is removed first, and the new content is written to a
//! temporary sibling and renamed into place, so the target path only ever
//! holds a complete file.

use std::io::{self, ErrorKind, Write};
use std::path::Path;
use tally_core::{Artifact, ArtifactFormat, PipelineError, Result, TabularResult};
use tracing::debug;

/// Service trait for writing artifacts
pub trait ArtifactWriter: Send + Sync {
    /// Writes `result` to `path`, replacing whatever was there
    fn write(&self, result: &TabularResult, path: &Path) -> Result<Artifact>;
}

/// CSV implementation of ArtifactWriter
///
/// Header row first, then one record per row. Nulls are empty fields and
/// fields are quoted only when they need it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvArtifactWriter;

impl CsvArtifactWriter {
    pub fn new() -> Self {
        Self
    }

    fn write_records(result: &TabularResult, out: impl Write) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(result.columns())?;
        for row in result.rows() {
            writer.write_record(row.iter().map(|value| value.render().unwrap_or_default()))?;
        }
        writer.flush()
    }
}

impl ArtifactWriter for CsvArtifactWriter {
    fn write(&self, result: &TabularResult, path: &Path) -> Result<Artifact> {
        let failed = |source: io::Error| PipelineError::ArtifactWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed previous artifact at {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(failed(e)),
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut partial = tempfile::Builder::new()
            .prefix(".tally-")
            .suffix(".partial")
            .tempfile_in(dir)
            .map_err(failed)?;

        Self::write_records(result, partial.as_file_mut()).map_err(failed)?;
        partial.as_file().sync_all().map_err(failed)?;
        partial.persist(path).map_err(|e| failed(e.error))?;

        debug!(
            "Wrote {} row(s) to {}",
            result.row_count(),
            path.display()
        );

        Ok(Artifact {
            path: path.to_path_buf(),
            format: ArtifactFormat::Csv,
            row_count: result.row_count(),
        })
    }
}

/// Reads an artifact back as a table
///
/// Every non-empty field becomes text and every empty field becomes null.
#[cfg(test)]
pub fn read_table(path: &Path) -> io::Result<TabularResult> {
    use tally_core::Value;

    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let row = record?
            .iter()
            .map(|field| match field {
                "" => Value::Null,
                text => Value::Text(text.to_string()),
            })
            .collect();
        rows.push(row);
    }

    TabularResult::new(columns, rows).map_err(io::Error::other)
}
