use thiserror::Error;

pub const FILL_ALL_FIELDS_MESSAGE: &str = "Please fill in all fields.";
pub const PASSCODE_REQUIRED_MESSAGE: &str = "Passcode is required to retrieve passwords.";
pub const RETRIEVAL_IN_PROGRESS_MESSAGE: &str = "A retrieval is already in progress.";
pub const CONNECTIVITY_MESSAGE: &str = "Could not connect to the backend server. Is it running?";
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save password.";
pub const RETRIEVE_FAILED_MESSAGE: &str = "Failed to retrieve passwords.";
pub const RETRIEVE_SERVER_ERROR_MESSAGE: &str = "Failed to retrieve passwords (server error).";
pub const COPY_FAILED_MESSAGE: &str = "Failed to copy text.";

/// Every failure the save, retrieve, render and export flows can surface.
///
/// Each variant already carries the text shown to the user; none of them are
/// meant to escape as faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffFlowError {
    /// A required input was missing; raised before any I/O.
    #[error("{0}")]
    Validation(String),
    /// The credential service could not be reached at all.
    #[error("{0}")]
    Connectivity(String),
    /// The service answered but reported a non-success outcome.
    #[error("{0}")]
    Service(String),
    /// A host capability failed: staging write/read or view activation.
    #[error("{0}")]
    Handoff(String),
    #[error("{0}")]
    Clipboard(String),
    /// Another retrieve cycle has not finished yet.
    #[error("{0}")]
    InProgress(String),
}

impl HandoffFlowError {
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::Connectivity(message)
            | Self::Service(message)
            | Self::Handoff(message)
            | Self::Clipboard(message)
            | Self::InProgress(message) => message,
        }
    }

    pub fn is_handoff(&self) -> bool {
        matches!(self, Self::Handoff(_))
    }
}
