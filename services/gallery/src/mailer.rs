use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use html_escape::encode_text;
use tracing::instrument;

/// Outbound email message
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound mail delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Status change to announce by email
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNotice {
    pub image_id: String,
    pub status: String,
    pub reason: Option<String>,
    pub email: Option<String>,
}

impl StatusNotice {
    pub fn subject(&self) -> String {
        format!("Your image {} has been {}", self.image_id, self.status)
    }

    pub fn html_body(&self) -> String {
        let mut body = format!(
            "<html><body><h1>Image review update</h1><p>Your image <strong>{}</strong> has been <strong>{}</strong>.</p>",
            encode_text(&self.image_id),
            encode_text(&self.status)
        );
        if let Some(ref reason) = self.reason {
            body.push_str(&format!("<p>Reason: {}</p>", encode_text(reason)));
        }
        body.push_str("</body></html>");
        body
    }

    /// Render the email, preferring the notice's own address over `default_recipient`
    pub fn render(&self, from: &str, default_recipient: &str) -> Email {
        Email {
            from: from.to_string(),
            to: self
                .email
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| default_recipient.to_string()),
            subject: self.subject(),
            html_body: self.html_body(),
        }
    }
}

/// Mail sender backed by SES
pub struct SesMailSender {
    client: SesClient,
}

impl SesMailSender {
    pub fn new(client: SesClient) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self::new(SesClient::new(sdk_config))
    }
}

#[async_trait]
impl MailSender for SesMailSender {
    #[instrument(skip(self, email), fields(to = %email.to))]
    async fn send(&self, email: &Email) -> Result<()> {
        let subject = Content::builder()
            .data(&email.subject)
            .charset("UTF-8")
            .build()
            .context("Failed to build email subject")?;
        let html = Content::builder()
            .data(&email.html_body)
            .charset("UTF-8")
            .build()
            .context("Failed to build email body")?;

        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(html).build())
            .build();

        self.client
            .send_email()
            .from_email_address(&email.from)
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .with_context(|| format!("Failed to send email to {}", email.to))?;

        Ok(())
    }
}
