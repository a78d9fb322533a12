use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Fatal to the current turn only; the session stays intact and the
    /// respondent may retry.
    #[error("Provider error: {0}")]
    Provider(#[from] colloquy_provider::ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] colloquy_config::ConfigError),

    #[error("Persistence error: {0}")]
    Persist(#[from] colloquy_store::PersistError),

    /// The session has completed or aborted; no further turns are accepted.
    #[error("Session is closed")]
    SessionClosed,

    #[error("Session is not ready for {0}")]
    InvalidState(&'static str),
}
