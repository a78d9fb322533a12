use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::script::InterviewScript;

/// Fatal to session start; surfaced immediately, no retry.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No interview script named '{0}'")]
    UnknownScript(String),

    #[error("Failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse script {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Loads named interview scripts from a directory of `<name>.toml` files.
pub struct ScriptResolver {
    scripts_dir: PathBuf,
}

impl ScriptResolver {
    pub fn new(scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Resolve a script by name.
    pub fn resolve(&self, name: &str) -> Result<InterviewScript, ConfigError> {
        let path = self.scripts_dir.join(format!("{}.toml", name));
        if !path.exists() {
            return Err(ConfigError::UnknownScript(name.to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut script: InterviewScript =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        script.name = name.to_string();

        debug!(script = name, codes = script.codes.len(), "Resolved interview script");
        Ok(script)
    }

    /// Names of all scripts available in the directory, sorted.
    pub fn list(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.scripts_dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("toml"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_script(dir: &Path, name: &str) {
        let content = r#"
            outline = "Ask about the internship."
            model = "gpt-4o"

            [[codes]]
            code = "x7y8"
            message = "closing message"

            [[codes]]
            code = "5j3k"
            message = "problem message"
        "#;
        std::fs::write(dir.join(format!("{}.toml", name)), content).unwrap();
    }

    #[test]
    fn resolves_script_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "midterm");

        let resolver = ScriptResolver::new(dir.path());
        let script = resolver.resolve("midterm").unwrap();
        assert_eq!(script.name, "midterm");
        assert_eq!(script.codes.len(), 2);
        assert_eq!(script.codes[0].code, "x7y8");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ScriptResolver::new(dir.path());
        let err = resolver.resolve("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScript(_)));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.toml"), "outline = [").unwrap();
        let resolver = ScriptResolver::new(dir.path());
        assert!(matches!(
            resolver.resolve("broken"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn lists_available_scripts() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "b");
        write_script(dir.path(), "a");
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let resolver = ScriptResolver::new(dir.path());
        assert_eq!(resolver.list(), vec!["a".to_string(), "b".to_string()]);
    }
}
