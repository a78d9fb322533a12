use std::path::PathBuf;

use colloquy_notify::EmailStatus;

/// What one completed exchange produced for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A normal interviewer turn; show it as-is.
    Reply(String),
    /// A termination code was detected mid-stream. The raw turn (code
    /// included) is in the transcript for audit; only `message` is shown.
    Closing { code: String, message: String },
}

impl TurnOutcome {
    /// The text to render to the respondent.
    pub fn display_text(&self) -> &str {
        match self {
            TurnOutcome::Reply(text) => text,
            TurnOutcome::Closing { message, .. } => message,
        }
    }

    pub fn is_closing(&self) -> bool {
        matches!(self, TurnOutcome::Closing { .. })
    }
}

/// The respondent's finalization choices.
#[derive(Debug, Clone)]
pub struct EmailConsent {
    pub send: bool,
    /// Confirmed or corrected recipient; falls back to the bootstrap
    /// recipient when absent.
    pub recipient: Option<String>,
}

impl EmailConsent {
    pub fn declined() -> Self {
        Self {
            send: false,
            recipient: None,
        }
    }

    pub fn granted(recipient: Option<String>) -> Self {
        Self {
            send: true,
            recipient,
        }
    }
}

/// What finalization accomplished. Sub-steps are isolated, so any of them
/// may have failed individually while the session still reached its
/// terminal state.
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub transcript_path: Option<PathBuf>,
    pub persist_error: Option<String>,
    pub summary: Option<String>,
    pub email: EmailStatus,
    pub evaluation_url: Option<String>,
    pub duration_minutes: f64,
}
