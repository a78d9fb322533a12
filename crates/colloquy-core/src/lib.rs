//! Core orchestration for one interview session: the turn loop, streaming
//! with early abort on termination codes, transactional persistence between
//! turns, and the hand-off to post-processing.

mod codes;
mod controller;
mod error;
mod outcome;
mod session;

pub use codes::CodeDetector;
pub use controller::{
    ControllerState, EmailSettings, FragmentCallback, SessionController, SessionDeps,
};
pub use error::SessionError;
pub use outcome::{EmailConsent, FinalizeReport, TurnOutcome};
pub use session::{Role, Session, SessionStatus, Turn};
