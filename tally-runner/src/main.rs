//! Tally Runner
//!
//! Produces and mails the daily leads report for one trigger.
//!
//! Architecture:
//! - Configuration: connection settings and credentials from the environment
//! - Source: one parameterized query against the report database
//! - Services: artifact writing and stage sequencing
//! - Mail: message composition and SMTP delivery
//!
//! The runner does not schedule itself. Each invocation is one run for one
//! date and recipient list; the outcome is printed to stdout as a JSON run
//! report and mirrored in the exit code (0 delivered, 75 retryable failure,
//! 1 terminal failure, 78 invalid configuration).

mod config;
mod service;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tally_core::{PipelineError, Recipients, RunFailure, RunReport, Stage};
use tally_mail::{Composer, ComposerConfig, DeliveryClient, SmtpTransport};
use tally_source::MySqlRowSource;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::Config;
use crate::service::{CsvArtifactWriter, PipelineSettings, ReportPipeline, Trigger};

/// Exit code for invalid configuration (EX_CONFIG)
const EXIT_CONFIG: u8 = 78;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Daily leads report: extract, write CSV, and mail it", long_about = None)]
struct Cli {
    /// Report date (YYYY-MM-DD); defaults to today in UTC
    #[arg(long, env = "TALLY_RUN_DATE")]
    run_date: Option<NaiveDate>,

    /// Comma-separated recipient list; defaults to TALLY_DEFAULT_RECIPIENTS
    #[arg(long, env = "TALLY_RECIPIENTS")]
    recipients: Option<String>,

    /// Pretty-print the run report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the run report
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_runner=info,tally_source=info,tally_mail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    info!("Starting Tally Runner");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    info!(
        "Loaded configuration: database={}:{}/{}, smtp={}:{} ({}), artifact_dir={}",
        config.source.host,
        config.source.port,
        config.source.database,
        config.transport.host,
        config.transport.port,
        config.transport.security_mode(),
        config.artifact_dir.display()
    );

    if let Err(e) = std::fs::create_dir_all(&config.artifact_dir) {
        error!(
            "Cannot create artifact directory {}: {}",
            config.artifact_dir.display(),
            e
        );
        return ExitCode::from(EXIT_CONFIG);
    }

    let run_date = cli
        .run_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let recipients = cli
        .recipients
        .unwrap_or_else(|| config.default_recipients.clone());

    let report = match Recipients::parse(&recipients) {
        Ok(recipients) => build_pipeline(&config).run(&Trigger::new(run_date, recipients)).await,
        Err(e) => rejected_trigger(run_date, e),
    };

    if let Err(e) = print_report(&report, cli.pretty) {
        error!("Failed to print run report: {:#}", e);
    }

    if report.is_success() {
        info!("Run {} delivered", report.run_id);
    }

    ExitCode::from(report.exit_code() as u8)
}

/// Loads and validates configuration from the environment
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load config from environment")?;
    config.validate()?;
    Ok(config)
}

/// Wires the production collaborators into a pipeline
fn build_pipeline(config: &Config) -> ReportPipeline<SmtpTransport> {
    let composer = Composer::new(ComposerConfig {
        sender: config.sender.clone(),
        require_rows: config.require_rows,
    });

    ReportPipeline::new(
        Arc::new(MySqlRowSource::new(config.source.clone())),
        Arc::new(CsvArtifactWriter::new()),
        composer,
        DeliveryClient::new(SmtpTransport),
        config.transport.clone(),
        PipelineSettings {
            pipeline_id: config.pipeline_id,
            artifact_dir: config.artifact_dir.clone(),
            artifact_stem: config.artifact_stem.clone(),
        },
    )
}

/// Report for a trigger whose input could not be accepted
fn rejected_trigger(run_date: NaiveDate, error: PipelineError) -> RunReport {
    let failure = RunFailure::new(Stage::Trigger, error);
    error!("Trigger rejected: {}", failure);
    RunReport::failed(Uuid::new_v4(), run_date, chrono::Utc::now(), None, &failure)
}

fn print_report(report: &RunReport, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tally_core::ErrorKind;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_trigger() {
        let cli = Cli::try_parse_from([
            "tally",
            "--run-date",
            "2025-08-04",
            "--recipients",
            "a@example.com, b@example.com",
        ])
        .unwrap();

        assert_eq!(cli.run_date, NaiveDate::from_ymd_opt(2025, 8, 4));
        assert_eq!(cli.recipients.as_deref(), Some("a@example.com, b@example.com"));
        assert!(!cli.pretty);
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["tally", "--run-date", "04/08/2025"]).is_err());
    }

    #[test]
    fn test_rejected_trigger_is_terminal() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 4).unwrap();
        let err = Recipients::parse("a@example.com,,b@example.com").unwrap_err();

        let report = rejected_trigger(date, err);

        assert_eq!(report.failed_stage, Some(Stage::Trigger));
        assert_eq!(report.error_kind, Some(ErrorKind::InvalidRecipients));
        assert_eq!(report.exit_code(), 1);
    }
}
