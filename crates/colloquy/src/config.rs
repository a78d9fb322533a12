//! Application configuration for colloquy.
//!
//! Loads configuration from `colloquy.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use colloquy_notify::SmtpSettings;

/// Application configuration loaded from `colloquy.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Default provider family ("openai" / "anthropic"); scripts may override
    pub provider: Option<String>,
    /// Default model, used when a script does not name one
    pub model: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Email delivery; omit the whole section to disable sending
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Where transcript and timing files land (default: platform data dir)
    pub data_dir: Option<PathBuf>,
    /// Record database location (default: platform data dir)
    pub db_path: Option<PathBuf>,
    /// Optional plain-file mirror that every persisted transcript is appended to
    pub mirror_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory of interview script TOML files (default: ./scripts)
    pub scripts_dir: Option<PathBuf>,
    /// Script used when none is named on the command line
    pub default_script: Option<String>,
    /// JSONL event log file, in addition to console output
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    pub smtp: SmtpSettings,
    /// Domain for deriving a respondent address from their id
    pub student_domain: Option<String>,
    /// Subject line for transcript emails
    pub subject: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "colloquy.toml";

impl AppConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            provider = "openai"

            [session]
            default_script = "midterm"
            "#,
        )
        .unwrap();
        assert_eq!(config.provider.as_deref(), Some("openai"));
        assert_eq!(config.session.default_script.as_deref(), Some("midterm"));
        assert!(config.email.is_none());
    }

    #[test]
    fn email_section_nests_smtp() {
        let config: AppConfig = toml::from_str(
            r#"
            [email]
            student_domain = "students.example.org"

            [email.smtp]
            host = "smtp.example.org"
            username = "interviews@example.org"
            sender = "Interview System <interviews@example.org>"
            "#,
        )
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.smtp.host, "smtp.example.org");
        assert_eq!(email.smtp.port, 587);
        assert_eq!(email.student_domain.as_deref(), Some("students.example.org"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<AppConfig, _> = toml::from_str("mystery = 1");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(dir.path()).unwrap().is_none());
    }
}
