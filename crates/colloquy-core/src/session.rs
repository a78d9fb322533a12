use chrono::{DateTime, Utc};
use uuid::Uuid;

use colloquy_provider::{ChatMessage, Role as WireRole};
use colloquy_store::InterviewRecord;

/// Who a transcript turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Interviewer,
    Respondent,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::Interviewer => write!(f, "Interviewer"),
            Role::Respondent => write!(f, "Respondent"),
        }
    }
}

/// One message in the interview, append-only within a session.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub sequence_no: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

/// One complete interview attempt by one respondent under one script.
///
/// Owned by the controller for its lifetime; persisted copies are write
/// targets, not owners. Only the controller appends turns or changes
/// status.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: Uuid,
    pub respondent_id: Option<String>,
    pub respondent_name: String,
    pub company: Option<String>,
    pub config_name: String,
    start_time: DateTime<Utc>,
    turns: Vec<Turn>,
    status: SessionStatus,
}

impl Session {
    pub fn new(
        config_name: impl Into<String>,
        respondent_name: impl Into<String>,
        respondent_id: Option<String>,
        company: Option<String>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            respondent_id,
            respondent_name: respondent_name.into(),
            company,
            config_name: config_name.into(),
            start_time: Utc::now(),
            turns: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_minutes(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.start_time);
        elapsed.num_milliseconds() as f64 / 60_000.0
    }

    /// Number of Interviewer turns so far; used as the turn counter in logs.
    pub fn interviewer_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == Role::Interviewer)
            .count()
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Append the system turn. At most one, always first.
    pub(crate) fn push_system(&mut self, text: String) {
        debug_assert!(self.turns.is_empty(), "system turn must come first");
        self.push_turn(Role::System, text);
    }

    pub(crate) fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        let sequence_no = self.turns.len();
        self.turns.push(Turn {
            role,
            text: text.into(),
            sequence_no,
        });
    }

    /// Remove the most recent turn. Used to roll back a respondent turn
    /// when the provider fails before the matching interviewer turn exists.
    pub(crate) fn pop_turn(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    /// The ordered message sequence for a provider call.
    ///
    /// A synthetic seed greeting is injected after the system turn so the
    /// list always starts at a user role regardless of provider
    /// conventions; the seed is never part of the transcript.
    pub(crate) fn messages(&self, seed_greeting: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        for turn in &self.turns {
            match turn.role {
                Role::System => {
                    messages.push(ChatMessage::new(WireRole::System, turn.text.clone()));
                    messages.push(ChatMessage::new(WireRole::User, seed_greeting));
                }
                Role::Interviewer => {
                    messages.push(ChatMessage::new(WireRole::Assistant, turn.text.clone()));
                }
                Role::Respondent => {
                    messages.push(ChatMessage::new(WireRole::User, turn.text.clone()));
                }
            }
        }
        messages
    }

    /// Render the transcript as persisted: a small header, then every
    /// non-system turn verbatim.
    pub fn transcript_text(&self) -> String {
        let mut out = format!(
            "Session ID: {}\nInterview: {}\nStarted (UTC): {}\n\n",
            self.session_id,
            self.config_name,
            self.start_time.format("%d/%m/%Y %H:%M:%S")
        );
        for turn in self.turns.iter().filter(|t| t.role != Role::System) {
            out.push_str(&format!("{}: {}\n", turn.role, turn.text));
        }
        out
    }

    /// Flatten into the record shape the store works with.
    pub fn to_record(&self) -> InterviewRecord {
        InterviewRecord {
            session_id: self.session_id.to_string(),
            respondent_id: self.respondent_id.clone(),
            respondent_name: self.respondent_name.clone(),
            company: self.company.clone(),
            script_name: self.config_name.clone(),
            status: self.status.as_str().to_string(),
            started_at: self.start_time,
            transcript: self.transcript_text(),
            duration_minutes: self.duration_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut s = Session::new("midterm", "Test Person", Some("r1".to_string()), None);
        s.push_system("outline".to_string());
        s.push_turn(Role::Interviewer, "Hello! First question?");
        s.push_turn(Role::Respondent, "An answer.");
        s
    }

    #[test]
    fn messages_inject_seed_after_system() {
        let msgs = session().messages("Hi");
        assert_eq!(msgs[0].role, WireRole::System);
        assert_eq!(msgs[1].role, WireRole::User);
        assert_eq!(msgs[1].content, "Hi");
        assert_eq!(msgs[2].role, WireRole::Assistant);
        assert_eq!(msgs[3].role, WireRole::User);
        assert_eq!(msgs[3].content, "An answer.");
    }

    #[test]
    fn transcript_skips_system_turn_and_seed() {
        let text = session().transcript_text();
        assert!(!text.contains("outline"));
        assert!(!text.contains("Hi\n"));
        assert!(text.contains("Interviewer: Hello! First question?"));
        assert!(text.contains("Respondent: An answer."));
    }

    #[test]
    fn sequence_numbers_are_append_order() {
        let s = session();
        let seqs: Vec<usize> = s.turns().iter().map(|t| t.sequence_no).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn pop_turn_rolls_back_the_last_append() {
        let mut s = session();
        let popped = s.pop_turn().unwrap();
        assert_eq!(popped.role, Role::Respondent);
        assert_eq!(s.turns().len(), 2);
    }
}
