//! Query domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A parameterized query and its bound parameters
///
/// The text uses positional `?` placeholders. Parameters are bound by the
/// driver, so values never become part of the query text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    text: String,
    params: Vec<QueryParam>,
}

/// A typed query parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryParam {
    Integer(i64),
    Date(NaiveDate),
    Text(String),
}

impl QuerySpec {
    pub fn new(text: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Counts `?` placeholders that sit outside quoted literals
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;

        for c in self.text.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"' | '`') => quote = Some(c),
                (None, '?') => count += 1,
                (None, _) => {}
            }
        }

        count
    }

    /// Checks that every placeholder has exactly one bound parameter
    pub fn validate(&self) -> Result<()> {
        let placeholders = self.placeholder_count();
        if placeholders != self.params.len() {
            return Err(PipelineError::query_failed(format!(
                "query has {} placeholder(s) but {} bound parameter(s)",
                placeholders,
                self.params.len()
            )));
        }
        Ok(())
    }
}
