//! Run domain types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::Artifact;
use super::delivery::DeliveryReceipt;
use crate::error::{ErrorKind, RunFailure, Stage};

/// Pipeline run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Extracted,
    Delivered,
    Failed,
}

/// Outcome of one run, reported back to the external scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub state: RunState,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub artifact: Option<Artifact>,
    pub receipt: Option<DeliveryReceipt>,
    pub failed_stage: Option<Stage>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub retryable: bool,
}

impl RunReport {
    pub fn delivered(
        run_id: Uuid,
        run_date: NaiveDate,
        started_at: chrono::DateTime<chrono::Utc>,
        artifact: Artifact,
        receipt: DeliveryReceipt,
    ) -> Self {
        Self {
            run_id,
            run_date,
            state: RunState::Delivered,
            started_at,
            completed_at: chrono::Utc::now(),
            artifact: Some(artifact),
            receipt: Some(receipt),
            failed_stage: None,
            error_kind: None,
            error_message: None,
            retryable: false,
        }
    }

    pub fn failed(
        run_id: Uuid,
        run_date: NaiveDate,
        started_at: chrono::DateTime<chrono::Utc>,
        artifact: Option<Artifact>,
        failure: &RunFailure,
    ) -> Self {
        Self {
            run_id,
            run_date,
            state: RunState::Failed,
            started_at,
            completed_at: chrono::Utc::now(),
            artifact,
            receipt: None,
            failed_stage: Some(failure.stage),
            error_kind: Some(failure.error.kind()),
            error_message: Some(failure.error.to_string()),
            retryable: failure.error.is_retryable(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Delivered
    }

    /// Process exit code for the external scheduler
    ///
    /// 0 on delivery, 75 (EX_TEMPFAIL) when a later run may succeed,
    /// 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match (self.state, self.retryable) {
            (RunState::Delivered, _) => 0,
            (_, true) => 75,
            _ => 1,
        }
    }
}
