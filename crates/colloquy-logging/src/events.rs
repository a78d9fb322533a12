use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for the interview session flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        session_id: String,
        script: String,
        provider: String,
        model: String,
    },
    ContextResolved {
        session_id: String,
        context_script: String,
        summary_chars: usize,
    },
    InterviewerTurnStarted {
        session_id: String,
        turn: usize,
    },
    InterviewerTurnCompleted {
        session_id: String,
        turn: usize,
        chars: usize,
    },
    CodeDetected {
        session_id: String,
        turn: usize,
        code: String,
    },
    ProviderFailed {
        session_id: String,
        turn: usize,
        error: String,
    },
    TranscriptSaved {
        session_id: String,
        path: String,
    },
    PersistFailed {
        session_id: String,
        error: String,
    },
    MirrorFailed {
        session_id: String,
        sink: String,
        error: String,
    },
    SessionQuit {
        session_id: String,
        turn: usize,
    },
    SummaryGenerated {
        session_id: String,
        chars: usize,
    },
    SummaryFailed {
        session_id: String,
        error: String,
    },
    EmailSent {
        session_id: String,
        to: String,
    },
    EmailFailed {
        session_id: String,
        error: String,
    },
    SessionFinalized {
        session_id: String,
        status: String,
        turns: usize,
        duration_minutes: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for session events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON lines
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                session_id,
                script,
                provider,
                model,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "●".bright_blue(),
                    "Interview session started".bold(),
                    session_id.dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {} via {} ({})",
                    "Script:".dimmed(),
                    script,
                    provider,
                    model.dimmed()
                );
            }
            LogEvent::ContextResolved {
                context_script,
                summary_chars,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} prior summary from '{}' ({} chars)",
                    "Context:".dimmed(),
                    context_script,
                    summary_chars
                );
            }
            LogEvent::InterviewerTurnStarted { turn, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    format!("turn {}", turn).dimmed()
                );
            }
            LogEvent::InterviewerTurnCompleted { turn, chars, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} turn {} ({} chars)",
                    "✓".bright_green(),
                    turn,
                    chars
                );
            }
            LogEvent::CodeDetected { code, turn, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} termination code '{}' on turn {}",
                    "■".bright_yellow(),
                    code,
                    turn
                );
            }
            LogEvent::ProviderFailed { error, turn, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} provider failed on turn {}: {}",
                    "✗".bright_red(),
                    turn,
                    error.bright_red()
                );
            }
            LogEvent::TranscriptSaved { path, .. } => {
                let _ = writeln!(stderr, "    {} transcript {}", "💾".dimmed(), path.dimmed());
            }
            LogEvent::PersistFailed { error, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} transcript write failed: {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::MirrorFailed { sink, error, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} mirror '{}' failed: {}",
                    "⚠".bright_yellow(),
                    sink,
                    error.dimmed()
                );
            }
            LogEvent::SessionQuit { turn, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} session quit by respondent on turn {}",
                    "■".bright_yellow(),
                    turn
                );
            }
            LogEvent::SummaryGenerated { chars, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} summary generated ({} chars)",
                    "✓".bright_green(),
                    chars
                );
            }
            LogEvent::SummaryFailed { error, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} summary failed: {}",
                    "⚠".bright_yellow(),
                    error.dimmed()
                );
            }
            LogEvent::EmailSent { to, .. } => {
                let _ = writeln!(stderr, "    {} email sent to {}", "✓".bright_green(), to);
            }
            LogEvent::EmailFailed { error, .. } => {
                let _ = writeln!(
                    stderr,
                    "    {} email failed: {}",
                    "⚠".bright_yellow(),
                    error.dimmed()
                );
            }
            LogEvent::SessionFinalized {
                status,
                turns,
                duration_minutes,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} after {} turns ({:.1} min)",
                    "●".bright_blue(),
                    status.bold(),
                    turns,
                    duration_minutes
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted { script, .. } => {
                format!("[{}] session:start {}", timestamp, script)
            }
            LogEvent::ContextResolved { context_script, .. } => {
                format!("[{}] session:context {}", timestamp, context_script)
            }
            LogEvent::InterviewerTurnStarted { turn, .. } => {
                format!("[{}] turn:start:{}", timestamp, turn)
            }
            LogEvent::InterviewerTurnCompleted { turn, chars, .. } => {
                format!("[{}] turn:done:{} {}ch", timestamp, turn, chars)
            }
            LogEvent::CodeDetected { code, turn, .. } => {
                format!("[{}] turn:code:{} {}", timestamp, turn, code)
            }
            LogEvent::ProviderFailed { turn, error, .. } => {
                format!("[{}] turn:fail:{} {}", timestamp, turn, error)
            }
            LogEvent::TranscriptSaved { path, .. } => {
                format!("[{}] persist:ok {}", timestamp, path)
            }
            LogEvent::PersistFailed { error, .. } => {
                format!("[{}] persist:fail {}", timestamp, error)
            }
            LogEvent::MirrorFailed { sink, .. } => {
                format!("[{}] mirror:fail {}", timestamp, sink)
            }
            LogEvent::SessionQuit { turn, .. } => format!("[{}] session:quit:{}", timestamp, turn),
            LogEvent::SummaryGenerated { chars, .. } => {
                format!("[{}] summary:ok {}ch", timestamp, chars)
            }
            LogEvent::SummaryFailed { error, .. } => {
                format!("[{}] summary:fail {}", timestamp, error)
            }
            LogEvent::EmailSent { to, .. } => format!("[{}] email:ok {}", timestamp, to),
            LogEvent::EmailFailed { error, .. } => format!("[{}] email:fail {}", timestamp, error),
            LogEvent::SessionFinalized {
                status,
                turns,
                duration_minutes,
                ..
            } => format!(
                "[{}] session:done {} {}t {:.1}m",
                timestamp, status, turns, duration_minutes
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = LogEvent::CodeDetected {
            session_id: "s".to_string(),
            turn: 3,
            code: "x7y8".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "code_detected");
        assert_eq!(json["code"], "x7y8");
    }

    #[test]
    fn file_logger_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("colloquy-log-{}", std::process::id()));
        let path = dir.join("events.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.log(&LogEvent::SessionQuit {
            session_id: "s".to_string(),
            turn: 1,
        });
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("session_quit"));
        assert!(content.contains("timestamp"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("verbose".parse::<LogFormat>().is_err());
    }
}
