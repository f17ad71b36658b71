//! Message types
//!
//! A [`Message`] carries both its readable parts and the wire form rendered
//! from them. The wire form is built once, from the attachment bytes held in
//! memory, so what is sent is exactly what was read.

use lettre::address::Envelope;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment as MimeAttachment, Body, Mailbox, MultiPart, SinglePart};
use std::path::Path;
use tally_core::{PipelineError, Recipients, Result};

/// Content type used for report attachments
pub const ATTACHMENT_CONTENT_TYPE: &str = "application/octet-stream";

/// A binary attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A transport-ready mail message
#[derive(Debug, Clone)]
pub struct Message {
    pub sender: String,
    pub recipients: Recipients,
    pub subject: String,
    pub html_body: String,
    pub attachment: Attachment,
    envelope: Envelope,
    formatted: Vec<u8>,
}

impl Message {
    /// Renders the multipart wire form
    ///
    /// The envelope lists each distinct recipient once. `source_path` is only
    /// used to label errors.
    pub fn build(
        sender: &str,
        recipients: Recipients,
        subject: String,
        html_body: String,
        attachment: Attachment,
        source_path: &Path,
    ) -> Result<Self> {
        let from: Mailbox = sender.parse().map_err(|e| {
            PipelineError::InvalidRecipients(format!("sender '{}' is invalid: {}", sender, e))
        })?;

        let mut builder = lettre::Message::builder().from(from).subject(subject.clone());
        for address in recipients.distinct() {
            let to: Mailbox = address.parse().map_err(|e| {
                PipelineError::InvalidRecipients(format!("'{}' is invalid: {}", address, e))
            })?;
            builder = builder.to(to);
        }

        let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
            PipelineError::AttachmentUnavailable {
                path: source_path.to_path_buf(),
                reason: format!("bad content type '{}': {}", attachment.content_type, e),
            }
        })?;

        // Force base64 regardless of content; lettre would pick 7bit for plain CSV.
        let body = Body::new_with_encoding(attachment.bytes.clone(), ContentTransferEncoding::Base64)
            .map_err(|_| PipelineError::AttachmentUnavailable {
                path: source_path.to_path_buf(),
                reason: "attachment could not be base64 encoded".to_string(),
            })?;

        let mime = builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(html_body.clone()))
                    .singlepart(MimeAttachment::new(attachment.file_name.clone()).body(body, content_type)),
            )
            .map_err(|e| PipelineError::InvalidRecipients(format!("cannot build message: {}", e)))?;

        Ok(Self {
            sender: sender.to_string(),
            recipients,
            subject,
            html_body,
            attachment,
            envelope: mime.envelope().clone(),
            formatted: mime.formatted(),
        })
    }

    /// SMTP envelope (MAIL FROM / RCPT TO)
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Addresses the envelope will be sent to
    pub fn envelope_recipients(&self) -> Vec<String> {
        self.envelope.to().iter().map(|a| a.to_string()).collect()
    }

    /// RFC 5322 wire form
    pub fn formatted(&self) -> &[u8] {
        &self.formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(bytes: &[u8]) -> Attachment {
        Attachment {
            file_name: "leads.csv".to_string(),
            content_type: ATTACHMENT_CONTENT_TYPE.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn build(recipients: &str, bytes: &[u8]) -> Result<Message> {
        Message::build(
            "reports@example.com",
            Recipients::parse(recipients)?,
            "Daily Leads Report - 2025-08-04".to_string(),
            "<h3>Daily Leads Report</h3>".to_string(),
            attachment(bytes),
            Path::new("/tmp/leads.csv"),
        )
    }

    #[test]
    fn test_envelope_deduplicates_recipients() {
        let message = build("a@example.com, b@example.com, a@example.com", b"x").unwrap();
        assert_eq!(message.recipients.len(), 3);
        assert_eq!(
            message.envelope_recipients(),
            vec!["a@example.com".to_string(), "b@example.com".to_string()]
        );
    }

    #[test]
    fn test_formatted_has_multipart_structure() {
        let message = build("a@example.com", b"creator_id\n1\n").unwrap();
        let text = String::from_utf8(message.formatted().to_vec()).unwrap();

        assert!(text.contains("Subject: Daily Leads Report - 2025-08-04"));
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("text/html"));
        assert!(text.contains("application/octet-stream"));
        assert!(text.contains("Content-Transfer-Encoding: base64"));
        assert!(text.contains("attachment; filename=\"leads.csv\""));
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let err = Message::build(
            "not an address",
            Recipients::parse("a@example.com").unwrap(),
            "s".to_string(),
            "b".to_string(),
            attachment(b"x"),
            Path::new("/tmp/leads.csv"),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRecipients(_)));
    }
}
