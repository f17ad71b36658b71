//! Delivery domain types

use serde::{Deserialize, Serialize};

/// How the mail transport connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityMode {
    /// TLS from the first byte (SMTPS)
    ImplicitTls,
    /// Plaintext connect, then a mandatory STARTTLS upgrade
    StartTls,
}

impl SecurityMode {
    /// Conventional implicit-TLS submission port
    pub const IMPLICIT_TLS_PORT: u16 = 465;

    /// Mode implied by a port: 465 is implicit TLS, everything else upgrades
    pub fn for_port(port: u16) -> Self {
        if port == Self::IMPLICIT_TLS_PORT {
            SecurityMode::ImplicitTls
        } else {
            SecurityMode::StartTls
        }
    }
}

impl std::fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityMode::ImplicitTls => f.write_str("implicit-tls"),
            SecurityMode::StartTls => f.write_str("starttls"),
        }
    }
}

/// Acknowledgement returned by the transport after a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Envelope recipients the transport accepted
    pub accepted: Vec<String>,
    /// Final server response to the message data
    pub response: String,
    pub security: SecurityMode,
}
