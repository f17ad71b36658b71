//! Message composer
//!
//! Builds the report message from an artifact. Reads the file once and has
//! no network side effects.

use chrono::NaiveDate;
use std::io::ErrorKind;
use tally_core::{Artifact, PipelineError, Recipients, Result};
use tracing::{debug, info};

use crate::message::{ATTACHMENT_CONTENT_TYPE, Attachment, Message};

/// Composer settings
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Sender address (`From`)
    pub sender: String,
    /// Fail with `EmptyReport` instead of sending an artifact with no rows
    pub require_rows: bool,
}

impl ComposerConfig {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            require_rows: false,
        }
    }
}

/// Builds report messages
#[derive(Debug, Clone)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Composes the report message for `run_date`
    ///
    /// Fails with `AttachmentUnavailable` when the artifact has disappeared
    /// or cannot be read.
    pub async fn compose(
        &self,
        artifact: &Artifact,
        run_date: NaiveDate,
        recipients: &Recipients,
    ) -> Result<Message> {
        if self.config.require_rows && artifact.row_count == 0 {
            return Err(PipelineError::EmptyReport(run_date.to_string()));
        }

        let bytes = tokio::fs::read(&artifact.path).await.map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => "file does not exist".to_string(),
                _ => e.to_string(),
            };
            PipelineError::AttachmentUnavailable {
                path: artifact.path.clone(),
                reason,
            }
        })?;

        debug!(
            "Read {} byte(s) from {}",
            bytes.len(),
            artifact.path.display()
        );

        let attachment = Attachment {
            file_name: artifact.file_name(),
            content_type: ATTACHMENT_CONTENT_TYPE.to_string(),
            bytes,
        };

        let message = Message::build(
            &self.config.sender,
            recipients.clone(),
            subject(run_date),
            html_body(run_date),
            attachment,
            &artifact.path,
        )?;

        info!(
            "Composed '{}' for {} recipient(s) with attachment {}",
            message.subject,
            message.envelope_recipients().len(),
            message.attachment.file_name
        );

        Ok(message)
    }
}

/// Subject line for a run date
pub fn subject(run_date: NaiveDate) -> String {
    format!("Daily Leads Report - {}", run_date.format("%Y-%m-%d"))
}

/// HTML body for a run date
pub fn html_body(run_date: NaiveDate) -> String {
    format!(
        "<h3>Daily Leads Report</h3>\n\
         <p>Please find the attached CSV file with the leads data for {}.</p>\n\
         <p>Regards,<br>Tally Reports</p>\n",
        run_date.format("%Y-%m-%d")
    )
}
