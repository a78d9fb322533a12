//! Post-interview notification: summary generation and email dispatch.
//!
//! Both steps run during finalization and are isolated from each other; a
//! failed summary does not block the email and vice versa. Nothing here is
//! allowed to keep a session from reaching its terminal state.

mod email;
mod summary;

pub use email::{EmailRequest, Mailer, SmtpSettings};
pub use summary::Summarizer;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Summary generation failed: {0}")]
    Summary(#[from] colloquy_provider::ProviderError),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Failed to read attachment: {0}")]
    Attachment(#[from] std::io::Error),
}

/// Outcome of the email step, reported to the user but never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailStatus {
    Sent { to: String },
    Failed { error: String },
    Skipped,
}

impl EmailStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, EmailStatus::Sent { .. })
    }
}
