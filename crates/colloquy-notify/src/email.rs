use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::{debug, info};

use crate::NotifyError;

/// SMTP connection settings, typically from `colloquy.toml` with the
/// password supplied via `COLLOQUY_SMTP_PASSWORD`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// From address, e.g. "Interview System <interviews@example.org>".
    pub sender: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// One outgoing transcript email.
#[derive(Debug, Clone)]
pub struct EmailRequest {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment_path: PathBuf,
}

/// Sends transcript emails over SMTP with STARTTLS.
pub struct Mailer {
    settings: SmtpSettings,
}

impl Mailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, request: &EmailRequest) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.settings.sender.parse::<Mailbox>()?)
            .to(request.to.parse::<Mailbox>()?)
            .subject(&request.subject);
        if let Some(ref cc) = request.cc {
            builder = builder.cc(cc.parse::<Mailbox>()?);
        }

        let transcript = std::fs::read_to_string(&request.attachment_path)?;
        let filename = file_name(&request.attachment_path);
        let attachment =
            Attachment::new(filename).body(transcript, ContentType::TEXT_PLAIN);

        let message = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(request.body.clone()))
                .singlepart(attachment),
        )?;
        Ok(message)
    }

    pub async fn send(&self, request: &EmailRequest) -> Result<(), NotifyError> {
        debug!(to = %request.to, "Sending transcript email");
        let message = self.build_message(request)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)?
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build();

        transport.send(message).await?;
        info!(to = %request.to, "Transcript email sent");
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("transcript.txt")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.org".to_string(),
            port: 587,
            username: "interviews@example.org".to_string(),
            password: "secret".to_string(),
            sender: "Interview System <interviews@example.org>".to_string(),
        }
    }

    fn request(attachment_path: PathBuf) -> EmailRequest {
        EmailRequest {
            to: "s4511072@students.example.org".to_string(),
            cc: Some("supervisor@example.org".to_string()),
            subject: "Your interview transcript".to_string(),
            body: "Thank you for participating.".to_string(),
            attachment_path,
        }
    }

    #[test]
    fn builds_multipart_message_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("260302_s4511072_transcript.txt");
        std::fs::write(&path, "Interviewer: Hello!\n").unwrap();

        let mailer = Mailer::new(settings());
        let message = mailer.build_message(&request(path)).unwrap();
        let bytes = message.formatted();
        let raw = String::from_utf8_lossy(&bytes);

        assert!(raw.contains("Thank you for participating."));
        assert!(raw.contains("260302_s4511072_transcript.txt"));
    }

    #[test]
    fn invalid_recipient_is_an_address_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, "x").unwrap();

        let mailer = Mailer::new(settings());
        let mut req = request(path);
        req.to = "not-an-address".to_string();
        assert!(matches!(
            mailer.build_message(&req),
            Err(NotifyError::Address(_))
        ));
    }

    #[test]
    fn missing_attachment_is_an_io_error() {
        let mailer = Mailer::new(settings());
        let req = request(PathBuf::from("/nonexistent/transcript.txt"));
        assert!(matches!(
            mailer.build_message(&req),
            Err(NotifyError::Attachment(_))
        ));
    }

    #[test]
    fn smtp_settings_default_port() {
        let parsed: SmtpSettings = toml::from_str(
            r#"
            host = "smtp.example.org"
            username = "u"
            sender = "a@example.org"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.port, 587);
    }
}
