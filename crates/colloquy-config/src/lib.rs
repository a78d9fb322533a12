//! Interview script resolution.
//!
//! An interview script is a named TOML bundle: the outline the interviewer
//! follows, general conduct instructions, model parameters, the termination
//! codes with their closing messages, and an optional context link to a
//! prior interview type. Scripts are loaded once at session bootstrap and
//! immutable thereafter.

mod resolver;
mod script;

pub use resolver::{ConfigError, ScriptResolver};
pub use script::{ClosingCode, InterviewScript};
