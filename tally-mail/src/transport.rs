//! SMTP transport
//!
//! [`MailTransport`] opens sessions; [`TransportSession`] is one live,
//! secured connection. The lettre-backed [`SmtpTransport`] is the production
//! implementation.
//!
//! Security policy: port 465 connects with implicit TLS. Every other port
//! connects in plaintext and must upgrade with STARTTLS before credentials
//! are sent. A server that does not offer STARTTLS is treated as unreachable.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::Error as SmtpError;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::transport::smtp::response::Response;
use std::time::Duration;
use tally_core::{PipelineError, Result, SecurityMode};
use tracing::{debug, warn};

/// How to pick the security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPolicy {
    /// Derive from the port (465 → implicit TLS, otherwise STARTTLS)
    #[default]
    Auto,
    /// Always use the given mode
    Force(SecurityMode),
}

impl std::str::FromStr for SecurityPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(SecurityPolicy::Auto),
            "implicit" | "tls" | "smtps" => Ok(SecurityPolicy::Force(SecurityMode::ImplicitTls)),
            "starttls" => Ok(SecurityPolicy::Force(SecurityMode::StartTls)),
            other => Err(format!(
                "unknown security mode '{}' (expected auto, implicit, or starttls)",
                other
            )),
        }
    }
}

/// Connection settings for the mail endpoint
#[derive(Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub security: SecurityPolicy,
    /// Bound on session setup (connect, greeting, TLS) and on each SMTP exchange
    pub timeout: Duration,
    /// Name sent in EHLO; the local hostname when unset
    pub hello_name: Option<String>,
}

impl TransportConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            security: SecurityPolicy::Auto,
            timeout: Duration::from_secs(30),
            hello_name: None,
        }
    }

    /// Resolves the security mode for this endpoint
    pub fn security_mode(&self) -> SecurityMode {
        match self.security {
            SecurityPolicy::Auto => SecurityMode::for_port(self.port),
            SecurityPolicy::Force(mode) => mode,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .field("timeout", &self.timeout)
            .field("hello_name", &self.hello_name)
            .finish()
    }
}

/// Opens transport sessions
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connects and secures a session in the given mode
    ///
    /// Fails with `TransportUnreachable`.
    async fn connect(
        &self,
        config: &TransportConfig,
        mode: SecurityMode,
    ) -> Result<Box<dyn TransportSession>>;
}

/// One live connection to the mail endpoint
#[async_trait]
pub trait TransportSession: Send {
    /// Fails with `AuthenticationFailed` when the credential is rejected
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()>;

    /// Transmits a message; returns the server's final response
    ///
    /// Fails with `SendFailed` on any protocol rejection.
    async fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<String>;

    /// Ends the session. Never fails; errors are logged.
    async fn close(&mut self);
}

/// lettre-backed SMTP transport
///
/// lettre only bounds the TCP connect, so every later step (greeting, TLS,
/// EHLO, AUTH, the transaction, QUIT) runs under `TransportConfig::timeout`
/// here.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpTransport;

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn connect(
        &self,
        config: &TransportConfig,
        mode: SecurityMode,
    ) -> Result<Box<dyn TransportSession>> {
        debug!("Connecting to {}:{} ({})", config.host, config.port, mode);

        let conn = match tokio::time::timeout(config.timeout, open(config, mode)).await {
            Ok(conn) => conn?,
            Err(_) => {
                return Err(PipelineError::TransportUnreachable {
                    message: format!(
                        "{}:{}: no usable session after {:?}",
                        config.host, config.port, config.timeout
                    ),
                    timed_out: true,
                });
            }
        };

        Ok(Box::new(SmtpSession {
            conn: Some(conn),
            timeout: config.timeout,
        }))
    }
}

/// Connects, reads the greeting, and secures the channel
async fn open(config: &TransportConfig, mode: SecurityMode) -> Result<AsyncSmtpConnection> {
    let hello = match &config.hello_name {
        Some(name) => ClientId::Domain(name.clone()),
        None => ClientId::default(),
    };
    let tls = TlsParameters::new(config.host.clone()).map_err(|e| {
        PipelineError::transport_unreachable(format!("TLS setup for {}: {}", config.host, e))
    })?;
    let server = (config.host.as_str(), config.port);

    match mode {
        SecurityMode::ImplicitTls => AsyncSmtpConnection::connect_tokio1(
            server,
            Some(config.timeout),
            &hello,
            Some(tls),
            None,
        )
        .await
        .map_err(|e| connect_error(config, e)),
        SecurityMode::StartTls => {
            let mut conn = AsyncSmtpConnection::connect_tokio1(
                server,
                Some(config.timeout),
                &hello,
                None,
                None,
            )
            .await
            .map_err(|e| connect_error(config, e))?;

            if !conn.can_starttls() {
                conn.abort().await;
                return Err(PipelineError::transport_unreachable(format!(
                    "{}:{} does not offer STARTTLS",
                    config.host, config.port
                )));
            }

            if let Err(e) = conn.starttls(tls, &hello).await {
                conn.abort().await;
                return Err(connect_error(config, e));
            }
            Ok(conn)
        }
    }
}

struct SmtpSession {
    conn: Option<AsyncSmtpConnection>,
    /// Bound on each command exchange
    timeout: Duration,
}

impl SmtpSession {
    fn conn(&mut self) -> Result<&mut AsyncSmtpConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| PipelineError::send_failed("session already closed"))
    }
}

#[async_trait]
impl TransportSession for SmtpSession {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let timeout = self.timeout;
        let conn = self.conn()?;
        let attempt = conn.auth(&[Mechanism::Plain, Mechanism::Login], credentials);

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(auth_error(e)),
            Err(_) => Err(PipelineError::TransportUnreachable {
                message: format!("authentication timed out after {:?}", timeout),
                timed_out: true,
            }),
        }
    }

    async fn send(&mut self, envelope: &Envelope, message: &[u8]) -> Result<String> {
        let timeout = self.timeout;
        let conn = self.conn()?;

        match tokio::time::timeout(timeout, conn.send(envelope, message)).await {
            Ok(Ok(response)) => Ok(describe(&response)),
            Ok(Err(e)) => Err(PipelineError::SendFailed {
                timed_out: e.is_timeout(),
                message: e.to_string(),
            }),
            Err(_) => Err(PipelineError::SendFailed {
                message: format!("transaction timed out after {:?}", timeout),
                timed_out: true,
            }),
        }
    }

    async fn close(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        match tokio::time::timeout(self.timeout, conn.quit()).await {
            Ok(Ok(_)) => {
                debug!("SMTP connection closed");
                return;
            }
            Ok(Err(e)) => warn!("SMTP QUIT failed, dropping connection: {}", e),
            Err(_) => warn!("SMTP QUIT timed out after {:?}, dropping connection", self.timeout),
        }

        if tokio::time::timeout(self.timeout, conn.abort()).await.is_err() {
            warn!("SMTP abort timed out; socket released on drop");
        }
    }
}

/// Splits AUTH failures into rejected credentials and a broken transport
///
/// Only a permanent reply or a client-side refusal (no shared mechanism)
/// means the credential itself is unusable.
fn auth_error(e: SmtpError) -> PipelineError {
    if e.is_permanent() || e.is_client() {
        PipelineError::AuthenticationFailed(e.to_string())
    } else {
        PipelineError::TransportUnreachable {
            timed_out: e.is_timeout(),
            message: format!("connection failed during authentication: {}", e),
        }
    }
}

fn connect_error(config: &TransportConfig, e: SmtpError) -> PipelineError {
    PipelineError::TransportUnreachable {
        timed_out: e.is_timeout(),
        message: format!("{}:{}: {}", config.host, config.port, e),
    }
}

fn describe(response: &Response) -> String {
    let text: Vec<&str> = response.message().collect();
    format!("{} {}", response.code(), text.join(" "))
}
