//! Delivery client
//!
//! Sends one message per session: connect, authenticate, transmit, close.
//! The session is closed on every path, including failed authentication.

use tally_core::{DeliveryReceipt, PipelineError, Result};
use tracing::{error, info};

use crate::message::Message;
use crate::transport::{MailTransport, TransportConfig, TransportSession};

/// Delivers composed messages through a [`MailTransport`]
pub struct DeliveryClient<T: MailTransport> {
    transport: T,
}

impl<T: MailTransport> DeliveryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `message` to every envelope recipient
    ///
    /// No retries; the first failure is returned after the session closes.
    pub async fn send(&self, message: &Message, config: &TransportConfig) -> Result<DeliveryReceipt> {
        let recipients = message.envelope_recipients();
        if recipients.is_empty() {
            return Err(PipelineError::InvalidRecipients(
                "message has no envelope recipients".to_string(),
            ));
        }

        let mode = config.security_mode();
        info!(
            "Delivering '{}' via {}:{} ({})",
            message.subject, config.host, config.port, mode
        );

        let mut session = self.transport.connect(config, mode).await?;
        let outcome = transmit(session.as_mut(), message, config).await;
        session.close().await;

        match outcome {
            Ok(response) => {
                info!("Delivered to {} recipient(s): {}", recipients.len(), response);
                Ok(DeliveryReceipt {
                    accepted: recipients,
                    response,
                    security: mode,
                })
            }
            Err(e) => {
                error!("Delivery failed: {}", e);
                Err(e)
            }
        }
    }
}

async fn transmit(
    session: &mut dyn TransportSession,
    message: &Message,
    config: &TransportConfig,
) -> Result<String> {
    session.authenticate(&config.credentials()).await?;
    info!("Authenticated as {}", config.user);
    session.send(message.envelope(), message.formatted()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeFailure, FakeTransport};
    use crate::message::{ATTACHMENT_CONTENT_TYPE, Attachment};
    use std::path::Path;
    use tally_core::{Recipients, SecurityMode};

    fn message(recipients: &str) -> Message {
        Message::build(
            "reports@example.com",
            Recipients::parse(recipients).unwrap(),
            "Daily Leads Report - 2025-08-04".to_string(),
            "<p>report</p>".to_string(),
            Attachment {
                file_name: "leads.csv".to_string(),
                content_type: ATTACHMENT_CONTENT_TYPE.to_string(),
                bytes: b"creator_id\n1\n".to_vec(),
            },
            Path::new("/tmp/leads.csv"),
        )
        .unwrap()
    }

    fn config(port: u16) -> TransportConfig {
        TransportConfig::new("smtp.example.com", port, "reports", "secret")
    }

    #[tokio::test]
    async fn test_send_success_closes_session() {
        let transport = FakeTransport::new();
        let client = DeliveryClient::new(transport.clone());

        let receipt = client
            .send(&message("a@example.com, b@example.com"), &config(587))
            .await
            .unwrap();

        assert_eq!(receipt.accepted, vec!["a@example.com", "b@example.com"]);
        assert_eq!(receipt.security, SecurityMode::StartTls);

        let state = transport.state();
        assert_eq!(state.connections, 1);
        assert_eq!(state.modes, vec![SecurityMode::StartTls]);
        assert!(state.authenticated);
        assert!(state.closed);
        assert_eq!(state.sent.len(), 1);
        assert_eq!(state.sent[0].recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn test_implicit_tls_on_465() {
        let transport = FakeTransport::new();
        let client = DeliveryClient::new(transport.clone());

        let receipt = client.send(&message("a@example.com"), &config(465)).await.unwrap();
        assert_eq!(receipt.security, SecurityMode::ImplicitTls);
        assert_eq!(transport.state().modes, vec![SecurityMode::ImplicitTls]);
    }

    #[tokio::test]
    async fn test_auth_failure_closes_session() {
        let transport = FakeTransport::failing(FakeFailure::Authentication);
        let client = DeliveryClient::new(transport.clone());

        let err = client.send(&message("a@example.com"), &config(587)).await.unwrap_err();

        assert!(matches!(err, PipelineError::AuthenticationFailed(_)));
        assert!(!err.is_retryable());

        let state = transport.state();
        assert!(state.closed);
        assert!(state.sent.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_closes_session() {
        let transport = FakeTransport::failing(FakeFailure::Send);
        let client = DeliveryClient::new(transport.clone());

        let err = client.send(&message("a@example.com"), &config(587)).await.unwrap_err();

        assert!(matches!(err, PipelineError::SendFailed { .. }));
        assert!(transport.state().closed);
    }

    #[tokio::test]
    async fn test_unreachable_opens_no_session() {
        let transport = FakeTransport::failing(FakeFailure::Connect);
        let client = DeliveryClient::new(transport.clone());

        let err = client.send(&message("a@example.com"), &config(587)).await.unwrap_err();

        assert!(matches!(err, PipelineError::TransportUnreachable { .. }));
        let state = transport.state();
        assert_eq!(state.connections, 0);
        assert!(!state.closed);
    }
}
