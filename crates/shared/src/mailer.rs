use anyhow::{Context, Result};
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// Port that expects TLS from the first byte instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailSender {
    config: SmtpConfig,
}

impl EmailSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn build_message(
        &self,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<Message> {
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .context("Invalid sender email address")?;

        let to: Mailbox = self
            .config
            .receiver
            .parse()
            .context("Invalid receiver email address")?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .context("Failed to build email message")
    }

    /// Send an email with HTML and plain-text content.
    pub async fn send(&self, subject: &str, html_body: &str, text_body: &str) -> Result<()> {
        let email = self.build_message(subject, html_body, text_body)?;

        let creds = Credentials::new(self.config.sender.clone(), self.config.password.clone());

        let relay = if self.config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
        };
        let builder = relay.context("Failed to create SMTP transport")?;

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            builder.port(self.config.port).credentials(creds).build();

        mailer
            .send(email)
            .await
            .context("Failed to send email via SMTP")?;

        tracing::info!(
            to = %self.config.receiver,
            subject = subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sender: &str) -> SmtpConfig {
        SmtpConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            sender: sender.to_string(),
            receiver: "reader@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn message_carries_both_alternatives() {
        let sender = EmailSender::new(config("digest@example.com"));
        let message = sender
            .build_message("Daily arXiv 2024/01/05", "<p>hi</p>", "hi")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Daily arXiv 2024/01/05"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains("text/plain"));
    }

    #[test]
    fn invalid_address_is_rejected() {
        let sender = EmailSender::new(config("not an address"));
        assert!(sender.build_message("s", "h", "t").is_err());
    }
}
