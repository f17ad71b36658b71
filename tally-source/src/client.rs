//! Row source client
//!
//! Executes one parameterized query per call and returns the complete result
//! set. Partial results are never returned.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{Column, Executor, Statement};
use tally_core::{PipelineError, QueryParam, QuerySpec, Result, TabularResult};
use tracing::{debug, info};

use crate::db::{self, SourceConfig};
use crate::decode;

/// Source of tabular report data
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Executes the query and collects every row
    ///
    /// Fails with `SourceUnavailable` when no connection can be opened and
    /// `QueryFailed` when execution or decoding fails.
    async fn fetch(&self, spec: &QuerySpec) -> Result<TabularResult>;
}

/// MySQL implementation of [`RowSource`]
pub struct MySqlRowSource {
    config: SourceConfig,
}

impl MySqlRowSource {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    async fn execute(&self, conn: &mut MySqlConnection, spec: &QuerySpec) -> Result<TabularResult> {
        let work = async {
            let statement = (&mut *conn)
                .prepare(spec.text())
                .await
                .map_err(|e| PipelineError::query_failed(format!("prepare failed: {}", e)))?;

            let columns: Vec<String> = statement
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();

            let rows = bind_params(sqlx::query(spec.text()), spec.params())
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| PipelineError::query_failed(e.to_string()))?;

            debug!("Decoding {} row(s) across {} column(s)", rows.len(), columns.len());

            let values = rows
                .iter()
                .map(|row| decode::decode_row(row, columns.len()))
                .collect::<Result<Vec<_>>>()?;

            TabularResult::new(columns, values)
        };

        match tokio::time::timeout(self.config.query_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::QueryFailed {
                message: format!("query timed out after {:?}", self.config.query_timeout),
                timed_out: true,
            }),
        }
    }
}

#[async_trait]
impl RowSource for MySqlRowSource {
    async fn fetch(&self, spec: &QuerySpec) -> Result<TabularResult> {
        spec.validate()?;

        let mut conn = db::connect(&self.config).await?;
        info!(
            "Connected to {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );

        let result = self.execute(&mut conn, spec).await;
        db::close(conn).await;

        let table = result?;
        info!("Fetched {} row(s)", table.row_count());
        Ok(table)
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [QueryParam],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            QueryParam::Integer(v) => query.bind(*v),
            QueryParam::Date(d) => query.bind(*d),
            QueryParam::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}
