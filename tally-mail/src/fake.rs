//! In-memory mail transport for tests
//!
//! Records every connection, authentication, message, and close so tests can
//! assert on the session lifecycle without an SMTP server.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use std::sync::{Arc, Mutex, MutexGuard};
use tally_core::{PipelineError, Result, SecurityMode};

use crate::transport::{MailTransport, TransportConfig, TransportSession};

/// Step at which the fake transport fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Connect,
    Authentication,
    Send,
}

/// A message captured by the fake transport
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipients: Vec<String>,
    pub data: Vec<u8>,
}

/// Everything the fake transport observed
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub connections: usize,
    pub modes: Vec<SecurityMode>,
    pub authenticated: bool,
    pub closed: bool,
    pub sent: Vec<SentMessage>,
}

/// Transport that never touches the network
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    failure: Option<FakeFailure>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failure: FakeFailure) -> Self {
        Self {
            failure: Some(failure),
            state: Arc::default(),
        }
    }

    /// Snapshot of the recorded state
    pub fn state(&self) -> FakeState {
        lock(&self.state).clone()
    }
}

#[async_trait]
impl MailTransport for FakeTransport {
    async fn connect(
        &self,
        config: &TransportConfig,
        mode: SecurityMode,
    ) -> Result<Box<dyn TransportSession>> {
        if self.failure == Some(FakeFailure::Connect) {
            return Err(PipelineError::transport_unreachable(format!(
                "{}:{}: connection refused",
                config.host, config.port
            )));
        }

        {
            let mut state = lock(&self.state);
            state.connections += 1;
            state.modes.push(mode);
        }

        Ok(Box::new(FakeSession {
            failure: self.failure,
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    failure: Option<FakeFailure>,
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl TransportSession for FakeSession {
    async fn authenticate(&mut self, _credentials: &Credentials) -> Result<()> {
        if self.failure == Some(FakeFailure::Authentication) {
            return Err(PipelineError::AuthenticationFailed(
                "535 5.7.8 Authentication credentials invalid".to_string(),
            ));
        }
        lock(&self.state).authenticated = true;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<String> {
        if self.failure == Some(FakeFailure::Send) {
            return Err(PipelineError::send_failed("550 5.1.1 Recipient rejected"));
        }
        lock(&self.state).sent.push(SentMessage {
            recipients: envelope.to().iter().map(|a| a.to_string()).collect(),
            data: message.to_vec(),
        });
        Ok("250 2.0.0 OK queued".to_string())
    }

    async fn close(&mut self) {
        lock(&self.state).closed = true;
    }
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
