//! Database connection handling
//!
//! One connection per fetch. The connection is opened with a bounded wait and
//! closed by [`close`] on every exit path.

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use std::time::Duration;
use tally_core::{PipelineError, Result};

/// Connection settings for the report database
///
/// Populated from injected configuration; never embedded in query text.
#[derive(Clone)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Maximum time to wait for the connection handshake
    pub connect_timeout: Duration,
    /// Maximum time a single query may run
    pub query_timeout: Duration,
}

impl SourceConfig {
    pub const DEFAULT_PORT: u16 = 3306;

    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(60),
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Opens a connection, failing with `SourceUnavailable` on error or timeout
pub async fn connect(config: &SourceConfig) -> Result<MySqlConnection> {
    tracing::debug!(
        "Connecting to {}:{}/{}",
        config.host,
        config.port,
        config.database
    );

    let options = config.connect_options();
    match tokio::time::timeout(config.connect_timeout, MySqlConnection::connect_with(&options))
        .await
    {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(PipelineError::source_unavailable(format!(
            "{}:{}: {}",
            config.host, config.port, e
        ))),
        Err(_) => Err(PipelineError::SourceUnavailable {
            message: format!(
                "{}:{}: connect timed out after {:?}",
                config.host, config.port, config.connect_timeout
            ),
            timed_out: true,
        }),
    }
}

/// Closes a connection
///
/// A failed graceful close is logged and the socket is dropped; it never
/// replaces the outcome of the query.
pub async fn close(conn: MySqlConnection) {
    match conn.close().await {
        Ok(()) => tracing::debug!("Database connection closed"),
        Err(e) => tracing::warn!("Database connection did not close cleanly: {}", e),
    }
}
