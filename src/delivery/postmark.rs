//! Mailer backed by the Postmark HTTP API

use super::{MOBI_CONTENT_TYPE, Mailer, OutgoingMail};
use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Postmark-Server-Token";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Message<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    attachments: [Attachment<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Attachment<'a> {
    name: &'a str,
    content: String,
    content_type: &'a str,
}

/// Sends attachments through a Postmark-compatible JSON endpoint
///
/// Without a server token every send fails with
/// [`DeliveryError::NotConfigured`], which lets a development setup run the
/// rest of the pipeline.
#[derive(Clone)]
pub struct PostmarkMailer {
    client: reqwest::Client,
    api_url: String,
    server_token: Option<String>,
    from_address: String,
    max_attachment_bytes: u64,
}

impl std::fmt::Debug for PostmarkMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostmarkMailer")
            .field("api_url", &self.api_url)
            .field("configured", &self.server_token.is_some())
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl PostmarkMailer {
    /// Build a mailer from configuration
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            server_token: config.server_token.clone().filter(|t| !t.trim().is_empty()),
            from_address: config.from_address.clone(),
            max_attachment_bytes: config.max_attachment_bytes,
        })
    }

    async fn read_attachment(&self, mail: &OutgoingMail<'_>) -> std::result::Result<Vec<u8>, DeliveryError> {
        let attachment_error = |e: std::io::Error| DeliveryError::Attachment {
            path: mail.attachment.to_path_buf(),
            reason: e.to_string(),
        };

        let size = tokio::fs::metadata(mail.attachment)
            .await
            .map_err(attachment_error)?
            .len();
        if size > self.max_attachment_bytes {
            return Err(DeliveryError::TooLarge {
                size,
                limit: self.max_attachment_bytes,
            });
        }

        tokio::fs::read(mail.attachment).await.map_err(attachment_error)
    }
}

#[async_trait]
impl Mailer for PostmarkMailer {
    async fn send(&self, mail: OutgoingMail<'_>) -> std::result::Result<(), DeliveryError> {
        let token = self
            .server_token
            .as_deref()
            .ok_or(DeliveryError::NotConfigured)?;

        let bytes = self.read_attachment(&mail).await?;
        let name = mail
            .attachment
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("article.mobi");

        let message = Message {
            from: &self.from_address,
            to: mail.to,
            subject: mail.subject,
            text_body: "Your article is attached.",
            attachments: [Attachment {
                name,
                content: STANDARD.encode(&bytes),
                content_type: MOBI_CONTENT_TYPE,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header(TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&message)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        debug!(to = %mail.to, bytes = bytes.len(), "mail accepted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postmark"
    }
}
