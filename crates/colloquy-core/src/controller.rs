use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use colloquy_config::{ClosingCode, InterviewScript};
use colloquy_logging::{LogEvent, Logger};
use colloquy_notify::{EmailRequest, EmailStatus, Mailer, Summarizer};
use colloquy_provider::{CompletionClient, ModelParams};
use colloquy_store::{RecordStore, TranscriptStore};

use crate::codes::CodeDetector;
use crate::error::SessionError;
use crate::outcome::{EmailConsent, FinalizeReport, TurnOutcome};
use crate::session::{Role, Session, SessionStatus};

/// Synthetic greeting injected into the provider message sequence so the
/// opening question can be generated without a prior respondent turn.
const SEED_GREETING: &str = "Hi";

/// Transcript marker appended when the respondent quits early.
const QUIT_NOTE: &str = "[Respondent ended the interview early.]";

/// Closing text shown on the quit path.
const QUIT_MESSAGE: &str = "You have ended the interview early. Thank you for your time.";

/// Callback receiving display-safe fragments of the interviewer's turn as
/// they stream in.
pub type FragmentCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Where the controller is in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Active,
    AwaitingConfirmation,
    Terminal,
}

/// Email addressing for the finalization step.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// The auxiliary recipient confirmed at bootstrap (goes in Cc when a
    /// respondent address can be derived, otherwise in To).
    pub recipient: String,
    /// Domain for deriving the respondent's address from their id.
    pub student_domain: Option<String>,
    pub subject: String,
}

impl EmailSettings {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            student_domain: None,
            subject: "Your interview transcript".to_string(),
        }
    }

    pub fn with_student_domain(mut self, domain: impl Into<String>) -> Self {
        self.student_domain = Some(domain.into());
        self
    }
}

/// Everything the controller collaborates with. Assembled once at
/// bootstrap; the provider is picked here and never re-selected per call.
pub struct SessionDeps {
    pub client: Arc<dyn CompletionClient>,
    pub store: TranscriptStore,
    pub records: Arc<RecordStore>,
    pub summarizer: Summarizer,
    pub mailer: Option<Mailer>,
    pub email: EmailSettings,
    pub logger: Arc<Logger>,
}

struct StreamedTurn {
    raw: String,
    detected: Option<ClosingCode>,
}

/// Drives one interview session end to end: turn sequencing, streaming
/// with early abort on termination codes, per-turn persistence, and the
/// finalization hand-off.
pub struct SessionController {
    session: Session,
    script: InterviewScript,
    detector: CodeDetector,
    params: ModelParams,
    client: Arc<dyn CompletionClient>,
    store: TranscriptStore,
    records: Arc<RecordStore>,
    summarizer: Summarizer,
    mailer: Option<Mailer>,
    email: EmailSettings,
    logger: Arc<Logger>,
    state: ControllerState,
    quit_requested: bool,
}

impl SessionController {
    pub fn new(session: Session, script: InterviewScript, deps: SessionDeps) -> Self {
        let detector = CodeDetector::new(script.codes.clone());
        let params = ModelParams::new(script.model.clone(), script.max_output_tokens)
            .with_temperature(script.temperature);
        Self {
            session,
            script,
            detector,
            params,
            client: deps.client,
            store: deps.store,
            records: deps.records,
            summarizer: deps.summarizer,
            mailer: deps.mailer,
            email: deps.email,
            logger: deps.logger,
            state: ControllerState::Uninitialized,
            quit_requested: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Start the session: resolve the context link, synthesize the system
    /// turn, and stream the opening interviewer turn. Returns the text to
    /// show the respondent (the closing message if the opening turn
    /// already carried a code).
    pub async fn begin(
        &mut self,
        on_fragment: Option<FragmentCallback>,
    ) -> Result<String, SessionError> {
        if self.state != ControllerState::Uninitialized {
            return Err(SessionError::InvalidState("begin"));
        }

        self.logger.log(&LogEvent::SessionStarted {
            session_id: self.session.id().to_string(),
            script: self.script.name.clone(),
            provider: self.client.name().to_string(),
            model: self.script.model.clone(),
        });

        let context = self.resolve_context();
        self.session
            .push_system(self.script.system_prompt(context.as_deref()));

        let streamed = self.stream_interviewer_turn(on_fragment.as_ref()).await?;
        let outcome = self.absorb_turn(streamed);
        Ok(outcome.display_text().to_string())
    }

    /// One exchange: append the respondent's input, stream the interviewer
    /// reply, persist. On provider failure nothing is committed and the
    /// respondent may resend.
    pub async fn submit(
        &mut self,
        text: &str,
        on_fragment: Option<FragmentCallback>,
    ) -> Result<TurnOutcome, SessionError> {
        match self.state {
            ControllerState::Active => {}
            ControllerState::Uninitialized => return Err(SessionError::InvalidState("submit")),
            _ => return Err(SessionError::SessionClosed),
        }

        self.session.push_turn(Role::Respondent, text);
        let turn = self.session.interviewer_turns() + 1;
        self.logger.log(&LogEvent::InterviewerTurnStarted {
            session_id: self.session.id().to_string(),
            turn,
        });

        let streamed = match self.stream_interviewer_turn(on_fragment.as_ref()).await {
            Ok(streamed) => streamed,
            Err(e) => {
                // Roll back the respondent turn so a resend does not
                // duplicate it.
                self.session.pop_turn();
                self.logger.log(&LogEvent::ProviderFailed {
                    session_id: self.session.id().to_string(),
                    turn,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.logger.log(&LogEvent::InterviewerTurnCompleted {
            session_id: self.session.id().to_string(),
            turn,
            chars: streamed.raw.chars().count(),
        });

        Ok(self.absorb_turn(streamed))
    }

    /// Quit from Active: append the cancelled marker and move straight to
    /// confirmation. Returns the closing text to display.
    pub fn quit(&mut self) -> Result<String, SessionError> {
        if self.state != ControllerState::Active {
            return Err(SessionError::InvalidState("quit"));
        }
        self.session.push_turn(Role::Respondent, QUIT_NOTE);
        self.quit_requested = true;
        self.logger.log(&LogEvent::SessionQuit {
            session_id: self.session.id().to_string(),
            turn: self.session.interviewer_turns(),
        });
        self.state = ControllerState::AwaitingConfirmation;
        Ok(QUIT_MESSAGE.to_string())
    }

    /// Finalize the session. Each sub-step (transcript persistence,
    /// summary, progress row, email) is isolated so one failure cannot
    /// keep the others from running; the session always reaches Terminal.
    pub async fn finalize(
        &mut self,
        consent: EmailConsent,
    ) -> Result<FinalizeReport, SessionError> {
        if self.state != ControllerState::AwaitingConfirmation {
            return Err(SessionError::InvalidState("finalize"));
        }

        // Close the session first: from here on no turn can be appended.
        let status = if self.quit_requested {
            SessionStatus::Aborted
        } else {
            SessionStatus::Completed
        };
        self.session.set_status(status);
        let record = self.session.to_record();
        let session_id = record.session_id.clone();

        // Transcript and timing files, plus mirrors.
        let mut transcript_path = None;
        let mut persist_error = None;
        match self.store.persist(&record) {
            Ok(receipt) => {
                for (sink, error) in &receipt.mirror_failures {
                    self.logger.log(&LogEvent::MirrorFailed {
                        session_id: session_id.clone(),
                        sink: sink.clone(),
                        error: error.clone(),
                    });
                }
                self.logger.log(&LogEvent::TranscriptSaved {
                    session_id: session_id.clone(),
                    path: receipt.transcript_path.display().to_string(),
                });
                transcript_path = Some(receipt.transcript_path);
            }
            Err(e) => {
                self.logger.log(&LogEvent::PersistFailed {
                    session_id: session_id.clone(),
                    error: e.to_string(),
                });
                persist_error = Some(e.to_string());
            }
        }

        // The record store row, so the summary has somewhere to land and
        // later sessions can query it back.
        if let Err(e) = self.records.upsert_session(&record) {
            warn!(error = %e, "Record store upsert failed");
        }

        let summary = match self.summarizer.summarize(&record.transcript).await {
            Ok(summary) => {
                self.logger.log(&LogEvent::SummaryGenerated {
                    session_id: session_id.clone(),
                    chars: summary.chars().count(),
                });
                if let Err(e) = self.records.update_summary(&session_id, &summary) {
                    warn!(error = %e, "Storing summary failed");
                }
                Some(summary)
            }
            Err(e) => {
                self.logger.log(&LogEvent::SummaryFailed {
                    session_id: session_id.clone(),
                    error: e.to_string(),
                });
                None
            }
        };

        // Only completed interviews count toward progress.
        if status == SessionStatus::Completed {
            if let Err(e) = self.records.record_progress(
                self.session.respondent_id.as_deref(),
                &self.session.respondent_name,
                &self.script.name,
                Utc::now(),
            ) {
                warn!(error = %e, "Progress row failed");
            }
        }

        let email = self
            .send_email(&consent, transcript_path.as_deref())
            .await;

        self.state = ControllerState::Terminal;
        self.logger.log(&LogEvent::SessionFinalized {
            session_id,
            status: status.as_str().to_string(),
            turns: self.session.turns().len(),
            duration_minutes: record.duration_minutes,
        });

        Ok(FinalizeReport {
            transcript_path,
            persist_error,
            summary,
            email,
            evaluation_url: self.script.evaluation_url.clone(),
            duration_minutes: record.duration_minutes,
        })
    }

    /// Look up the prior-session summary named by the script's context
    /// link. Missing context is never fatal; the interview simply starts
    /// without it.
    fn resolve_context(&self) -> Option<String> {
        let context_script = self.script.context_from.as_deref()?;
        let respondent_id = self.session.respondent_id.as_deref()?;

        match self.records.latest_summary(respondent_id, context_script) {
            Ok(Some(summary)) => {
                self.logger.log(&LogEvent::ContextResolved {
                    session_id: self.session.id().to_string(),
                    context_script: context_script.to_string(),
                    summary_chars: summary.chars().count(),
                });
                Some(summary)
            }
            Ok(None) => {
                debug!(context_script, "No prior summary for context link");
                None
            }
            Err(e) => {
                warn!(error = %e, "Context lookup failed");
                None
            }
        }
    }

    /// Stream one interviewer turn, feeding each increment to the code
    /// detector before anything is released for display. Fragments are
    /// emitted with a held-back tail so a code straddling a fragment
    /// boundary is never partially rendered; on detection, consumption
    /// stops and the remaining provider output is dropped.
    async fn stream_interviewer_turn(
        &self,
        on_fragment: Option<&FragmentCallback>,
    ) -> Result<StreamedTurn, SessionError> {
        let messages = self.session.messages(SEED_GREETING);
        let mut stream = self.client.stream_completion(&messages, &self.params).await?;

        let mut buf = String::new();
        let mut emitted = 0usize;
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = fragment?;
            buf.push_str(&fragment);

            if let Some(code) = self.detector.detect(&buf) {
                let detected = code.clone();
                // Dropping the stream aborts the remaining fragments.
                return Ok(StreamedTurn {
                    raw: buf,
                    detected: Some(detected),
                });
            }

            if let Some(cb) = on_fragment {
                let safe = self.detector.safe_emit_len(&buf);
                if safe > emitted {
                    cb(&buf[emitted..safe]);
                    emitted = safe;
                }
            }
        }

        if let Some(cb) = on_fragment {
            if buf.len() > emitted {
                cb(&buf[emitted..]);
            }
        }

        Ok(StreamedTurn {
            raw: buf,
            detected: None,
        })
    }

    /// Commit a streamed turn to the session and work out what to display.
    fn absorb_turn(&mut self, streamed: StreamedTurn) -> TurnOutcome {
        let turn = self.session.interviewer_turns() + 1;
        // The raw turn, code included, always goes to history for audit.
        self.session.push_turn(Role::Interviewer, streamed.raw);

        match streamed.detected {
            Some(code) => {
                self.logger.log(&LogEvent::CodeDetected {
                    session_id: self.session.id().to_string(),
                    turn,
                    code: code.code.clone(),
                });
                self.state = ControllerState::AwaitingConfirmation;
                TurnOutcome::Closing {
                    code: code.code,
                    message: code.message,
                }
            }
            None => {
                self.persist_best_effort();
                self.state = ControllerState::Active;
                let text = self
                    .session
                    .turns()
                    .last()
                    .map(|t| t.text.clone())
                    .unwrap_or_default();
                TurnOutcome::Reply(text)
            }
        }
    }

    /// Persistence between turns favors conversation continuity: a failed
    /// write is logged and the interview carries on.
    fn persist_best_effort(&self) {
        let record = self.session.to_record();
        match self.store.persist(&record) {
            Ok(receipt) => {
                for (sink, error) in &receipt.mirror_failures {
                    self.logger.log(&LogEvent::MirrorFailed {
                        session_id: record.session_id.clone(),
                        sink: sink.clone(),
                        error: error.clone(),
                    });
                }
            }
            Err(e) => {
                self.logger.log(&LogEvent::PersistFailed {
                    session_id: record.session_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    async fn send_email(
        &self,
        consent: &EmailConsent,
        transcript_path: Option<&Path>,
    ) -> EmailStatus {
        if !consent.send {
            return EmailStatus::Skipped;
        }
        let Some(mailer) = self.mailer.as_ref() else {
            return EmailStatus::Failed {
                error: "email transport not configured".to_string(),
            };
        };
        let Some(path) = transcript_path else {
            return EmailStatus::Failed {
                error: "transcript unavailable".to_string(),
            };
        };

        let recipient = consent
            .recipient
            .clone()
            .unwrap_or_else(|| self.email.recipient.clone());

        // When a respondent address can be derived, it is the primary
        // recipient and the confirmed address goes in Cc.
        let (to, cc) = match (&self.session.respondent_id, &self.email.student_domain) {
            (Some(id), Some(domain)) => (format!("{}@{}", id, domain), Some(recipient)),
            _ => (recipient, None),
        };

        let body = format!(
            "Dear {},\n\nThank you for participating in the interview. \
             Your transcript is attached.\n\nBest regards,\nThe interview team\n",
            self.session.respondent_name
        );

        let request = EmailRequest {
            to: to.clone(),
            cc,
            subject: self.email.subject.clone(),
            body,
            attachment_path: path.to_path_buf(),
        };

        match mailer.send(&request).await {
            Ok(()) => {
                self.logger.log(&LogEvent::EmailSent {
                    session_id: self.session.id().to_string(),
                    to: to.clone(),
                });
                EmailStatus::Sent { to }
            }
            Err(e) => {
                self.logger.log(&LogEvent::EmailFailed {
                    session_id: self.session.id().to_string(),
                    error: e.to_string(),
                });
                EmailStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
