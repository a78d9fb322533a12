use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::InterviewRecord;

/// Keyed record store over SQLite.
///
/// This is the one remote-style sink that supports both writes and reads:
/// session rows are upserted by `session_id`, and prior-session summaries
/// can be queried back for context links. Progress rows are append-only.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open or create a store at the default location
    /// (`~/.local/share/colloquy/colloquy.db`).
    pub fn open() -> Result<Self, rusqlite::Error> {
        let db_path = Self::default_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self::open_at(&db_path)
    }

    pub fn open_at(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("colloquy")
            .join("colloquy.db")
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS interviews (
                session_id TEXT PRIMARY KEY,
                respondent_id TEXT,
                respondent_name TEXT NOT NULL,
                company TEXT,
                script_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                transcript TEXT NOT NULL,
                duration_minutes REAL NOT NULL,
                summary TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_interviews_respondent
                ON interviews(respondent_id, script_name);

            CREATE TABLE IF NOT EXISTS progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                respondent_id TEXT,
                respondent_name TEXT NOT NULL,
                script_name TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );
            "#,
        )
    }

    /// Insert or update the session row keyed by `session_id`. An existing
    /// summary survives transcript updates.
    pub fn upsert_session(&self, record: &InterviewRecord) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        conn.execute(
            r#"
            INSERT INTO interviews (
                session_id, respondent_id, respondent_name, company,
                script_name, status, started_at, transcript, duration_minutes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                transcript = excluded.transcript,
                duration_minutes = excluded.duration_minutes
            "#,
            params![
                record.session_id,
                record.respondent_id,
                record.respondent_name,
                record.company,
                record.script_name,
                record.status,
                record.started_at.to_rfc3339(),
                record.transcript,
                record.duration_minutes,
            ],
        )?;
        Ok(())
    }

    /// Attach a summary to an existing session row.
    pub fn update_summary(&self, session_id: &str, summary: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        conn.execute(
            "UPDATE interviews SET summary = ?2 WHERE session_id = ?1",
            params![session_id, summary],
        )?;
        Ok(())
    }

    /// Most recent stored summary for a respondent under a given script.
    /// Used to resolve context links at session start.
    pub fn latest_summary(
        &self,
        respondent_id: &str,
        script_name: &str,
    ) -> Result<Option<String>, rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        conn.query_row(
            r#"
            SELECT summary FROM interviews
            WHERE respondent_id = ?1 AND script_name = ?2 AND summary IS NOT NULL
            ORDER BY started_at DESC
            LIMIT 1
            "#,
            params![respondent_id, script_name],
            |row| row.get(0),
        )
        .optional()
    }

    /// Whether a completed session already exists for this respondent and
    /// script. Used to block repeat attempts.
    pub fn has_completed(
        &self,
        respondent_id: &str,
        script_name: &str,
    ) -> Result<bool, rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM interviews
            WHERE respondent_id = ?1 AND script_name = ?2 AND status = 'completed'
            "#,
            params![respondent_id, script_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Append a progress row marking a finished session.
    pub fn record_progress(
        &self,
        respondent_id: Option<&str>,
        respondent_name: &str,
        script_name: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        conn.execute(
            r#"
            INSERT INTO progress (respondent_id, respondent_name, script_name, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                respondent_id,
                respondent_name,
                script_name,
                completed_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Fetch a session row by id.
    pub fn get(&self, session_id: &str) -> Result<Option<InterviewRecord>, rusqlite::Error> {
        let conn = self.conn.lock().expect("Record store lock poisoned");
        conn.query_row(
            r#"
            SELECT session_id, respondent_id, respondent_name, company,
                   script_name, status, started_at, transcript, duration_minutes
            FROM interviews WHERE session_id = ?1
            "#,
            params![session_id],
            |row| {
                let started_at: String = row.get(6)?;
                Ok(InterviewRecord {
                    session_id: row.get(0)?,
                    respondent_id: row.get(1)?,
                    respondent_name: row.get(2)?,
                    company: row.get(3)?,
                    script_name: row.get(4)?,
                    status: row.get(5)?,
                    started_at: started_at
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| Utc::now()),
                    transcript: row.get(7)?,
                    duration_minutes: row.get(8)?,
                })
            },
        )
        .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(session_id: &str, respondent: &str, started_at: &str) -> InterviewRecord {
        InterviewRecord {
            session_id: session_id.to_string(),
            respondent_id: Some(respondent.to_string()),
            respondent_name: "Test Person".to_string(),
            company: None,
            script_name: "midterm".to_string(),
            status: "active".to_string(),
            started_at: started_at.parse().unwrap(),
            transcript: "Interviewer: Hello!\n".to_string(),
            duration_minutes: 1.0,
        }
    }

    #[test]
    fn upsert_updates_rather_than_duplicates() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut rec = record("s-1", "r1", "2026-03-02T10:00:00Z");
        store.upsert_session(&rec).unwrap();

        rec.transcript.push_str("Respondent: Hi.\n");
        rec.status = "completed".to_string();
        store.upsert_session(&rec).unwrap();

        let fetched = store.get("s-1").unwrap().unwrap();
        assert_eq!(fetched.status, "completed");
        assert!(fetched.transcript.contains("Respondent: Hi."));
    }

    #[test]
    fn summary_survives_transcript_updates() {
        let store = RecordStore::open_in_memory().unwrap();
        let rec = record("s-1", "r1", "2026-03-02T10:00:00Z");
        store.upsert_session(&rec).unwrap();
        store.update_summary("s-1", "the summary").unwrap();

        // A later upsert of the same session must not clobber the summary.
        store.upsert_session(&rec).unwrap();
        let summary = store.latest_summary("r1", "midterm").unwrap();
        assert_eq!(summary.as_deref(), Some("the summary"));
    }

    #[test]
    fn latest_summary_picks_most_recent() {
        let store = RecordStore::open_in_memory().unwrap();

        let older = record("s-old", "r1", "2026-01-01T10:00:00Z");
        store.upsert_session(&older).unwrap();
        store.update_summary("s-old", "old summary").unwrap();

        let newer = record("s-new", "r1", "2026-02-01T10:00:00Z");
        store.upsert_session(&newer).unwrap();
        store.update_summary("s-new", "new summary").unwrap();

        let summary = store.latest_summary("r1", "midterm").unwrap();
        assert_eq!(summary.as_deref(), Some("new summary"));

        // Different respondent or script: nothing.
        assert!(store.latest_summary("r2", "midterm").unwrap().is_none());
        assert!(store.latest_summary("r1", "final").unwrap().is_none());
    }

    #[test]
    fn has_completed_requires_completed_status() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut rec = record("s-1", "r1", "2026-03-02T10:00:00Z");
        store.upsert_session(&rec).unwrap();
        assert!(!store.has_completed("r1", "midterm").unwrap());

        rec.status = "completed".to_string();
        store.upsert_session(&rec).unwrap();
        assert!(store.has_completed("r1", "midterm").unwrap());
    }

    #[test]
    fn progress_rows_accumulate() {
        let store = RecordStore::open_in_memory().unwrap();
        store
            .record_progress(Some("r1"), "Test", "midterm", Utc::now())
            .unwrap();
        store
            .record_progress(Some("r1"), "Test", "midterm", Utc::now())
            .unwrap();
        // Append-only sink: duplicates are accepted, not corrected.
    }
}
