use std::fs;
use std::path::{Path, PathBuf};

use crate::{InterviewRecord, PersistError};

/// Local transcript and timing files under a data directory.
///
/// File names follow `{yymmdd}_{respondent}_{company}_transcript.txt` with
/// the company part omitted when unknown, so a returning respondent on the
/// same day overwrites their own files instead of accumulating copies.
pub struct LocalFiles {
    transcripts_dir: PathBuf,
    times_dir: PathBuf,
}

impl LocalFiles {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            transcripts_dir: data_dir.join("transcripts"),
            times_dir: data_dir.join("times"),
        }
    }

    pub fn transcripts_dir(&self) -> &Path {
        &self.transcripts_dir
    }

    /// Deterministic file stem for a record.
    fn stem(record: &InterviewRecord) -> String {
        let date = record.started_at.format("%y%m%d");
        let respondent = record
            .respondent_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&record.session_id);
        let respondent = sanitize(respondent);

        match record.company.as_deref().map(sanitize) {
            Some(company) if !company.is_empty() => {
                format!("{}_{}_{}", date, respondent, company)
            }
            _ => format!("{}_{}", date, respondent),
        }
    }

    /// Write transcript and timing files, overwriting previous versions.
    /// Writes go through a temp file and rename so a crash mid-write never
    /// truncates an existing transcript.
    pub fn write(&self, record: &InterviewRecord) -> Result<(PathBuf, PathBuf), PersistError> {
        fs::create_dir_all(&self.transcripts_dir)?;
        fs::create_dir_all(&self.times_dir)?;

        let stem = Self::stem(record);
        let transcript_path = self.transcripts_dir.join(format!("{}_transcript.txt", stem));
        let time_path = self.times_dir.join(format!("{}_time.txt", stem));

        write_atomic(&transcript_path, &record.transcript)?;

        let timing = format!(
            "Session ID: {}\nStart time (UTC): {}\nInterview duration (minutes): {:.2}\n",
            record.session_id,
            record.started_at.format("%d/%m/%Y %H:%M:%S"),
            record.duration_minutes
        );
        write_atomic(&time_path, &timing)?;

        Ok((transcript_path, time_path))
    }
}

fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("txt.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

fn sanitize(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}
