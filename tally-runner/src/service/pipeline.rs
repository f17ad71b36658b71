//! Report pipeline service
//!
//! Runs one report end to end:
//! - Idle → Extracted: fetch the leads table and write the artifact
//! - Extracted → Delivered: compose the message and send it
//!
//! A failure at any step moves the run to Failed with the failing stage
//! attached. Later steps are never attempted, and an artifact that was
//! already written stays on disk.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use tally_core::{
    Artifact, ArtifactFormat, DeliveryReceipt, Recipients, RunFailure, RunReport, RunState,
    Stage, TabularResult, artifact_path,
};
use tally_mail::{Composer, DeliveryClient, MailTransport, TransportConfig};
use tally_source::RowSource;
use tally_source::repository::leads_repository;
use tracing::{error, info};
use uuid::Uuid;

use crate::service::artifact::ArtifactWriter;

/// One external trigger
#[derive(Debug, Clone)]
pub struct Trigger {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub recipients: Recipients,
}

impl Trigger {
    pub fn new(run_date: NaiveDate, recipients: Recipients) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run_date,
            recipients,
        }
    }
}

/// Settings that shape each run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub pipeline_id: i64,
    pub artifact_dir: PathBuf,
    pub artifact_stem: String,
}

/// Tracks the state of one run
struct Run {
    id: Uuid,
    state: RunState,
}

impl Run {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            state: RunState::Idle,
        }
    }

    fn advance(&mut self, next: RunState) {
        info!("Run {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}

/// Fetch → write → compose → send
pub struct ReportPipeline<T: MailTransport> {
    source: Arc<dyn RowSource>,
    writer: Arc<dyn ArtifactWriter>,
    composer: Composer,
    delivery: DeliveryClient<T>,
    transport: TransportConfig,
    settings: PipelineSettings,
}

impl<T: MailTransport> ReportPipeline<T> {
    pub fn new(
        source: Arc<dyn RowSource>,
        writer: Arc<dyn ArtifactWriter>,
        composer: Composer,
        delivery: DeliveryClient<T>,
        transport: TransportConfig,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            writer,
            composer,
            delivery,
            transport,
            settings,
        }
    }

    /// Artifact location for a trigger
    pub fn artifact_path(&self, trigger: &Trigger) -> PathBuf {
        artifact_path(
            &self.settings.artifact_dir,
            &self.settings.artifact_stem,
            trigger.run_date,
            trigger.run_id,
            ArtifactFormat::Csv,
        )
    }

    /// Executes one run and reports its outcome
    pub async fn run(&self, trigger: &Trigger) -> RunReport {
        let started_at = chrono::Utc::now();
        let mut run = Run::new(trigger.run_id);

        info!(
            "Starting run {} for {} ({} recipient(s))",
            trigger.run_id,
            trigger.run_date,
            trigger.recipients.len()
        );

        let artifact = match self.extract(trigger).await {
            Ok(artifact) => artifact,
            Err(failure) => {
                run.advance(RunState::Failed);
                error!("Run {} failed: {}", trigger.run_id, failure);
                return RunReport::failed(trigger.run_id, trigger.run_date, started_at, None, &failure);
            }
        };
        run.advance(RunState::Extracted);

        match self.deliver(&artifact, trigger).await {
            Ok(receipt) => {
                run.advance(RunState::Delivered);
                RunReport::delivered(trigger.run_id, trigger.run_date, started_at, artifact, receipt)
            }
            Err(failure) => {
                run.advance(RunState::Failed);
                error!(
                    "Run {} failed: {} (artifact kept at {})",
                    trigger.run_id,
                    failure,
                    artifact.path.display()
                );
                RunReport::failed(
                    trigger.run_id,
                    trigger.run_date,
                    started_at,
                    Some(artifact),
                    &failure,
                )
            }
        }
    }

    async fn extract(&self, trigger: &Trigger) -> Result<Artifact, RunFailure> {
        let table: TabularResult = leads_repository::fetch_daily(
            self.source.as_ref(),
            self.settings.pipeline_id,
            trigger.run_date,
        )
        .await
        .map_err(|e| RunFailure::new(Stage::Fetch, e))?;

        let path = self.artifact_path(trigger);
        let artifact = self
            .writer
            .write(&table, &path)
            .map_err(|e| RunFailure::new(Stage::Write, e))?;

        info!(
            "Wrote {} row(s) to {}",
            artifact.row_count,
            artifact.path.display()
        );
        Ok(artifact)
    }

    async fn deliver(
        &self,
        artifact: &Artifact,
        trigger: &Trigger,
    ) -> Result<DeliveryReceipt, RunFailure> {
        let message = self
            .composer
            .compose(artifact, trigger.run_date, &trigger.recipients)
            .await
            .map_err(|e| RunFailure::new(Stage::Compose, e))?;

        self.delivery
            .send(&message, &self.transport)
            .await
            .map_err(|e| RunFailure::new(Stage::Send, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::artifact::{CsvArtifactWriter, read_table};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tally_core::{ErrorKind, PipelineError, QuerySpec, Value};
    use tally_mail::ComposerConfig;
    use tally_mail::fake::{FakeFailure, FakeTransport};

    /// Row source that returns a canned table and records queries
    struct FakeSource {
        table: Option<TabularResult>,
        queries: Mutex<Vec<QuerySpec>>,
    }

    impl FakeSource {
        fn returning(table: TabularResult) -> Arc<Self> {
            Arc::new(Self {
                table: Some(table),
                queries: Mutex::new(Vec::new()),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                table: None,
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RowSource for FakeSource {
        async fn fetch(&self, spec: &QuerySpec) -> tally_core::Result<TabularResult> {
            self.queries.lock().unwrap().push(spec.clone());
            self.table
                .clone()
                .ok_or_else(|| PipelineError::source_unavailable("connection refused"))
        }
    }

    /// Writer that writes normally and then deletes the file
    struct VanishingWriter;

    impl ArtifactWriter for VanishingWriter {
        fn write(&self, result: &TabularResult, path: &Path) -> tally_core::Result<Artifact> {
            let artifact = CsvArtifactWriter::new().write(result, path)?;
            std::fs::remove_file(path).unwrap();
            Ok(artifact)
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 4).unwrap()
    }

    fn leads() -> TabularResult {
        TabularResult::new(
            leads_repository::COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![
                vec![Value::Integer(11), Value::Integer(3), Value::Integer(2), Value::Integer(1)],
                vec![Value::Integer(12), Value::Integer(0), Value::Integer(4), Value::Null],
            ],
        )
        .unwrap()
    }

    fn pipeline(
        source: Arc<dyn RowSource>,
        writer: Arc<dyn ArtifactWriter>,
        transport: FakeTransport,
        dir: &Path,
    ) -> ReportPipeline<FakeTransport> {
        ReportPipeline::new(
            source,
            writer,
            Composer::new(ComposerConfig::new("reports@example.com")),
            DeliveryClient::new(transport),
            TransportConfig::new("smtp.example.com", 587, "reports", "secret"),
            PipelineSettings {
                pipeline_id: 33,
                artifact_dir: dir.to_path_buf(),
                artifact_stem: "leads_export".to_string(),
            },
        )
    }

    fn trigger(recipients: &str) -> Trigger {
        Trigger::new(date(), Recipients::parse(recipients).unwrap())
    }

    #[tokio::test]
    async fn test_run_delivers_report() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::returning(leads());
        let transport = FakeTransport::new();
        let pipeline = pipeline(
            source.clone(),
            Arc::new(CsvArtifactWriter::new()),
            transport.clone(),
            dir.path(),
        );

        let trigger = trigger("ops@example.com, sales@example.com");
        let report = pipeline.run(&trigger).await;

        assert!(report.is_success(), "{:?}", report.error_message);
        assert_eq!(report.state, RunState::Delivered);
        assert_eq!(report.exit_code(), 0);

        let artifact = report.artifact.unwrap();
        assert_eq!(artifact.path, pipeline.artifact_path(&trigger));
        assert_eq!(artifact.row_count, 2);
        assert_eq!(read_table(&artifact.path).unwrap(), leads().to_text());

        let receipt = report.receipt.unwrap();
        assert_eq!(receipt.accepted, vec!["ops@example.com", "sales@example.com"]);

        let queries = source.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].placeholder_count(), 4);

        let state = transport.state();
        assert_eq!(state.sent.len(), 1);
        assert!(state.closed);
        let wire = String::from_utf8(state.sent[0].data.clone()).unwrap();
        assert!(wire.contains("Subject: Daily Leads Report - 2025-08-04"));
        assert!(wire.contains("Content-Transfer-Encoding: base64"));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let pipeline = pipeline(
            FakeSource::unavailable(),
            Arc::new(CsvArtifactWriter::new()),
            transport.clone(),
            dir.path(),
        );

        let report = pipeline.run(&trigger("ops@example.com")).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failed_stage, Some(Stage::Fetch));
        assert_eq!(report.error_kind, Some(ErrorKind::SourceUnavailable));
        assert!(report.retryable);
        assert_eq!(report.exit_code(), 75);
        assert!(report.artifact.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(transport.state().connections, 0);
    }

    #[tokio::test]
    async fn test_missing_artifact_never_opens_transport() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new();
        let pipeline = pipeline(
            FakeSource::returning(leads()),
            Arc::new(VanishingWriter),
            transport.clone(),
            dir.path(),
        );

        let report = pipeline.run(&trigger("ops@example.com")).await;

        assert_eq!(report.failed_stage, Some(Stage::Compose));
        assert_eq!(report.error_kind, Some(ErrorKind::AttachmentUnavailable));
        assert!(!report.retryable);
        assert_eq!(transport.state().connections, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_keeps_artifact_and_closes_transport() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::failing(FakeFailure::Authentication);
        let pipeline = pipeline(
            FakeSource::returning(leads()),
            Arc::new(CsvArtifactWriter::new()),
            transport.clone(),
            dir.path(),
        );

        let report = pipeline.run(&trigger("ops@example.com")).await;

        assert_eq!(report.failed_stage, Some(Stage::Send));
        assert_eq!(report.error_kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(report.exit_code(), 1);

        let artifact = report.artifact.unwrap();
        assert!(artifact.path.exists());

        let state = transport.state();
        assert_eq!(state.connections, 1);
        assert!(state.closed);
        assert!(state.sent.is_empty());
    }

    #[tokio::test]
    async fn test_runs_use_distinct_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            FakeSource::returning(leads()),
            Arc::new(CsvArtifactWriter::new()),
            FakeTransport::new(),
            dir.path(),
        );

        let first = pipeline.run(&trigger("ops@example.com")).await;
        let second = pipeline.run(&trigger("ops@example.com")).await;

        let first = first.artifact.unwrap().path;
        let second = second.artifact.unwrap().path;
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }
}
