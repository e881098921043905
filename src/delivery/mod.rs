//! Email delivery of generated e-books

mod postmark;

pub use postmark::PostmarkMailer;

use crate::error::DeliveryError;
use async_trait::async_trait;
use std::path::Path;

/// MIME type used for generated e-book attachments
pub const MOBI_CONTENT_TYPE: &str = "application/x-mobipocket-ebook";

/// One outgoing message with a single file attachment
#[derive(Clone, Copy, Debug)]
pub struct OutgoingMail<'a> {
    /// Recipient address
    pub to: &'a str,
    /// Subject line (the article title)
    pub subject: &'a str,
    /// File to attach
    pub attachment: &'a Path,
}

/// Sends generated files to recipients
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `mail`, returning once the mail service has accepted it
    async fn send(&self, mail: OutgoingMail<'_>) -> Result<(), DeliveryError>;

    /// Name of the implementation (for logging)
    fn name(&self) -> &'static str;
}
