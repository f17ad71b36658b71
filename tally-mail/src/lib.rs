//! Tally Mail
//!
//! Turns a report artifact into a MIME message and delivers it over SMTP.
//!
//! - [`composer`]: reads the artifact once and builds the [`Message`]
//! - [`transport`]: the SMTP connection seam and its lettre implementation
//! - [`delivery`]: connect, authenticate, send, and always close
//!
//! # Example
//!
//! ```no_run
//! use tally_core::{Artifact, ArtifactFormat, Recipients};
//! use tally_mail::{Composer, ComposerConfig, DeliveryClient, SmtpTransport, TransportConfig};
//!
//! # async fn run() -> tally_core::Result<()> {
//! let composer = Composer::new(ComposerConfig::new("reports@example.com"));
//! let artifact = Artifact {
//!     path: "/var/tally/leads.csv".into(),
//!     format: ArtifactFormat::Csv,
//!     row_count: 12,
//! };
//! let recipients = Recipients::parse("ops@example.com, sales@example.com")?;
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 8, 4).unwrap();
//!
//! let message = composer.compose(&artifact, date, &recipients).await?;
//!
//! let config = TransportConfig::new("smtp.example.com", 587, "reports", "secret");
//! let receipt = DeliveryClient::new(SmtpTransport).send(&message, &config).await?;
//! println!("accepted: {:?}", receipt.accepted);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod delivery;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod message;
pub mod transport;

pub use composer::{Composer, ComposerConfig};
pub use delivery::DeliveryClient;
pub use message::{Attachment, Message};
pub use transport::{MailTransport, SecurityPolicy, SmtpTransport, TransportConfig, TransportSession};
