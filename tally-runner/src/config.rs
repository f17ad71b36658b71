//! Runner configuration
//!
//! Connection settings and credentials are injected through the environment,
//! where the deployment's secret store places them. Nothing is hardcoded.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tally_mail::{SecurityPolicy, TransportConfig};
use tally_source::SourceConfig;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Report database connection
    pub source: SourceConfig,

    /// Mail endpoint connection
    pub transport: TransportConfig,

    /// Sender address for report messages
    pub sender: String,

    /// Recipients used when the trigger supplies none
    pub default_recipients: String,

    /// Pipeline whose leads are reported
    pub pipeline_id: i64,

    /// Directory that receives per-run artifacts
    pub artifact_dir: PathBuf,

    /// File name prefix for artifacts
    pub artifact_stem: String,

    /// Refuse to send a report with no rows
    pub require_rows: bool,
}

impl Config {
    /// Creates a configuration with defaults for everything but connections
    pub fn new(source: SourceConfig, transport: TransportConfig, sender: String) -> Self {
        Self {
            default_recipients: sender.clone(),
            source,
            transport,
            sender,
            pipeline_id: 33,
            artifact_dir: std::env::temp_dir().join("tally"),
            artifact_stem: "leads_export".to_string(),
            require_rows: false,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Required:
    /// - TALLY_DB_HOST, TALLY_DB_USER, TALLY_DB_PASSWORD, TALLY_DB_NAME
    /// - TALLY_SMTP_HOST, TALLY_SMTP_USER, TALLY_SMTP_PASSWORD
    /// - TALLY_MAIL_FROM
    ///
    /// Optional:
    /// - TALLY_DB_PORT (default: 3306)
    /// - TALLY_DB_CONNECT_TIMEOUT (seconds, default: 10)
    /// - TALLY_DB_QUERY_TIMEOUT (seconds, default: 60)
    /// - TALLY_SMTP_PORT (default: 587)
    /// - TALLY_SMTP_SECURITY (auto | implicit | starttls, default: auto)
    /// - TALLY_SMTP_TIMEOUT (seconds, default: 30)
    /// - TALLY_SMTP_HELO (default: local hostname)
    /// - TALLY_DEFAULT_RECIPIENTS (default: TALLY_MAIL_FROM)
    /// - TALLY_PIPELINE_ID (default: 33)
    /// - TALLY_ARTIFACT_DIR (default: $TMPDIR/tally)
    /// - TALLY_REQUIRE_ROWS (default: false)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let mut source = SourceConfig::new(
            env.required("TALLY_DB_HOST")?,
            env.required("TALLY_DB_USER")?,
            env.required("TALLY_DB_PASSWORD")?,
            env.required("TALLY_DB_NAME")?,
        );
        source.port = env.parsed("TALLY_DB_PORT", SourceConfig::DEFAULT_PORT)?;
        source.connect_timeout = env.seconds("TALLY_DB_CONNECT_TIMEOUT", source.connect_timeout)?;
        source.query_timeout = env.seconds("TALLY_DB_QUERY_TIMEOUT", source.query_timeout)?;

        let mut transport = TransportConfig::new(
            env.required("TALLY_SMTP_HOST")?,
            env.parsed("TALLY_SMTP_PORT", 587)?,
            env.required("TALLY_SMTP_USER")?,
            env.required("TALLY_SMTP_PASSWORD")?,
        );
        transport.security = env.parsed("TALLY_SMTP_SECURITY", SecurityPolicy::Auto)?;
        transport.timeout = env.seconds("TALLY_SMTP_TIMEOUT", transport.timeout)?;
        transport.hello_name = env.get("TALLY_SMTP_HELO");

        let mut config = Self::new(source, transport, env.required("TALLY_MAIL_FROM")?);

        if let Some(recipients) = env.get("TALLY_DEFAULT_RECIPIENTS") {
            config.default_recipients = recipients;
        }
        if let Some(dir) = env.get("TALLY_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }
        config.pipeline_id = env.parsed("TALLY_PIPELINE_ID", config.pipeline_id)?;
        config.require_rows = env.parsed("TALLY_REQUIRE_ROWS", false)?;

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.host.is_empty() {
            anyhow::bail!("database host cannot be empty");
        }

        if self.source.database.is_empty() {
            anyhow::bail!("database name cannot be empty");
        }

        if self.transport.host.is_empty() {
            anyhow::bail!("SMTP host cannot be empty");
        }

        if self.transport.port == 0 {
            anyhow::bail!("SMTP port must be greater than 0");
        }

        if !self.sender.contains('@') {
            anyhow::bail!("sender '{}' is not an email address", self.sender);
        }

        if self.source.connect_timeout.is_zero()
            || self.source.query_timeout.is_zero()
            || self.transport.timeout.is_zero()
        {
            anyhow::bail!("timeouts must be greater than 0");
        }

        if self.artifact_stem.is_empty() || self.artifact_stem.contains(std::path::is_separator) {
            anyhow::bail!("artifact stem must be a plain file name prefix");
        }

        Ok(())
    }
}

/// Environment lookup with typed accessors
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("{} environment variable not set", key))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
            None => Ok(default),
        }
    }

    fn seconds(&self, key: &str, default: Duration) -> Result<Duration> {
        self.parsed(key, default.as_secs()).map(Duration::from_secs)
    }
}
