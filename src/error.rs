use crate::domain::session::{FlowState, PresentationId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Server error: endpoint returned status {status}")]
    Server { status: u16 },
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: FlowState,
    },
    #[error("No presentation host is available")]
    NoHost,
    #[error("A presentation is already in flight")]
    AlreadyPresenting,
    #[error("Payment flow failed: {0}")]
    SdkFailure(String),
    #[error("Outcome for presentation {presentation} was already reported")]
    DuplicateOutcome { presentation: PresentationId },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SessionError {
    /// Whether the UI can offer a retry without resetting the session first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Network(_)
                | SessionError::Parse(_)
                | SessionError::Server { .. }
                | SessionError::NoHost
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
