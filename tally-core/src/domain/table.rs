//! Tabular result types

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A single nullable cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Textual form used in delimited files
    ///
    /// Returns `None` for nulls. Floats use the shortest representation
    /// that parses back to the same value.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(v) => Some(v.to_string()),
            Value::Unsigned(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Text(v) => Some(v.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// An in-memory table with named columns and ordered rows
///
/// Column order matches the projection order of the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Creates a table, checking that every row has one value per column
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PipelineError::query_failed(format!(
                "row {} has {} value(s), expected {}",
                idx,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Creates a table with no rows
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of this table as it reads back from a delimited file
    ///
    /// Every value becomes text; nulls and empty strings both become null.
    pub fn to_text(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|value| match value.render() {
                        Some(text) if !text.is_empty() => Value::Text(text),
                        _ => Value::Null,
                    })
                    .collect()
            })
            .collect();

        Self {
            columns: self.columns.clone(),
            rows,
        }
    }
}
