//! Persistence layer for interview sessions.
//!
//! The local transcript file is the durable source of truth: writing it is
//! synchronous and must succeed. Everything else (the SQLite record store,
//! extra mirror files) is a best-effort mirror whose failures are logged
//! and swallowed, never propagated to the conversation.

mod local;
mod mirror;
mod records;

pub use local::LocalFiles;
pub use mirror::{FileMirror, MirrorSink, RecordMirror};
pub use records::RecordStore;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use std::path::PathBuf;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Transcript write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// Flat, fully-rendered view of a session as persisted.
///
/// Built by the session controller; the store never interprets the
/// transcript text, only writes it.
#[derive(Debug, Clone)]
pub struct InterviewRecord {
    pub session_id: String,
    pub respondent_id: Option<String>,
    pub respondent_name: String,
    pub company: Option<String>,
    pub script_name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub transcript: String,
    pub duration_minutes: f64,
}

/// Where a persisted session ended up.
#[derive(Debug, Clone)]
pub struct PersistReceipt {
    pub transcript_path: PathBuf,
    pub time_path: PathBuf,
    /// (sink name, error) for every mirror that failed. Informational only.
    pub mirror_failures: Vec<(String, String)>,
}

/// Durable local persistence plus fire-and-forget mirrors.
pub struct TranscriptStore {
    local: LocalFiles,
    mirrors: Vec<Box<dyn MirrorSink>>,
}

impl TranscriptStore {
    pub fn new(local: LocalFiles) -> Self {
        Self {
            local,
            mirrors: Vec::new(),
        }
    }

    pub fn with_mirror(mut self, mirror: Box<dyn MirrorSink>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    /// Persist the session. The local write must succeed or this errors;
    /// mirror failures are logged and reported in the receipt only.
    ///
    /// Repeated calls for the same session overwrite the same files.
    pub fn persist(&self, record: &InterviewRecord) -> Result<PersistReceipt, PersistError> {
        let (transcript_path, time_path) = self.local.write(record)?;

        let mut mirror_failures = Vec::new();
        for mirror in &self.mirrors {
            if let Err(e) = mirror.mirror(record) {
                warn!(sink = mirror.name(), error = %e, "Mirror write failed");
                mirror_failures.push((mirror.name().to_string(), e.to_string()));
            }
        }

        Ok(PersistReceipt {
            transcript_path,
            time_path,
            mirror_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn record(session_id: &str, respondent: &str) -> InterviewRecord {
        InterviewRecord {
            session_id: session_id.to_string(),
            respondent_id: Some(respondent.to_string()),
            respondent_name: "Test Person".to_string(),
            company: Some("Acme Corp".to_string()),
            script_name: "midterm".to_string(),
            status: "active".to_string(),
            started_at: "2026-03-02T10:00:00Z".parse().unwrap(),
            transcript: format!("Session ID: {}\n\nInterviewer: Hello!\n", session_id),
            duration_minutes: 12.5,
        }
    }

    struct FailingSink;

    impl MirrorSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn mirror(&self, _record: &InterviewRecord) -> Result<(), PersistError> {
            Err(PersistError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "sink unreachable",
            )))
        }
    }

    #[test]
    fn persist_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(LocalFiles::new(dir.path()));
        let rec = record("s-1", "r123");

        let first = store.persist(&rec).unwrap();
        let content_first = std::fs::read_to_string(&first.transcript_path).unwrap();

        let second = store.persist(&rec).unwrap();
        let content_second = std::fs::read_to_string(&second.transcript_path).unwrap();

        assert_eq!(first.transcript_path, second.transcript_path);
        assert_eq!(content_first, content_second);

        // Exactly one transcript file for this session.
        let transcripts: Vec<_> = std::fs::read_dir(dir.path().join("transcripts"))
            .unwrap()
            .collect();
        assert_eq!(transcripts.len(), 1);
    }

    #[test]
    fn unreachable_mirror_does_not_fail_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            TranscriptStore::new(LocalFiles::new(dir.path())).with_mirror(Box::new(FailingSink));

        let receipt = store.persist(&record("s-1", "r123")).unwrap();
        assert!(receipt.transcript_path.exists());
        assert_eq!(receipt.mirror_failures.len(), 1);
        assert_eq!(receipt.mirror_failures[0].0, "failing");
    }

    #[test]
    fn distinct_sessions_write_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(LocalFiles::new(dir.path()));

        let a = store.persist(&record("s-1", "alice")).unwrap();
        let b = store.persist(&record("s-2", "bob")).unwrap();

        assert_ne!(a.transcript_path, b.transcript_path);
        let content_a = std::fs::read_to_string(&a.transcript_path).unwrap();
        let content_b = std::fs::read_to_string(&b.transcript_path).unwrap();
        assert!(content_a.contains("s-1"));
        assert!(!content_a.contains("s-2"));
        assert!(content_b.contains("s-2"));
    }
}
