use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{InterviewRecord, PersistError, RecordStore};

/// A best-effort remote-style sink. Failures are caught by the caller,
/// logged, and never abort the conversation.
pub trait MirrorSink: Send + Sync {
    fn name(&self) -> &str;

    fn mirror(&self, record: &InterviewRecord) -> Result<(), PersistError>;
}

/// Mirrors sessions into the keyed record store (upsert by session id).
pub struct RecordMirror {
    store: Arc<RecordStore>,
}

impl RecordMirror {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }
}

impl MirrorSink for RecordMirror {
    fn name(&self) -> &str {
        "record-store"
    }

    fn mirror(&self, record: &InterviewRecord) -> Result<(), PersistError> {
        self.store.upsert_session(record)?;
        Ok(())
    }
}

/// Appends session snapshots to a single shared file. A pure append log:
/// repeated persists of the same session accumulate historical rows, which
/// is accepted.
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MirrorSink for FileMirror {
    fn name(&self) -> &str {
        "file-append"
    }

    fn mirror(&self, record: &InterviewRecord) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "--- {} | {} | {} | {:.2} min ---",
            record.session_id, record.script_name, record.status, record.duration_minutes
        )?;
        file.write_all(record.transcript.as_bytes())?;
        writeln!(file)?;
        Ok(())
    }
}
