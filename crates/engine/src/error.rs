use gardes_client::BackendError;
use gardes_core::{CoreError, MonthKey, UserInputError};

/// Errors surfaced by the planning session.
///
/// Every variant except `UserInput` leaves the ledger and the cache as
/// they were, so the operation can be retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanningError {
    /// Ambiguous or invalid gesture. Nothing was changed.
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    /// Fetch or save never reached the server.
    #[error("Network error: {0}")]
    Network(String),

    /// The server rejected the whole request.
    #[error("Rejected by the server ({status}): {message}")]
    ServerValidation { status: u16, message: String },

    /// Any other server failure.
    #[error("Server error ({status}): {body}")]
    Backend { status: u16, body: String },

    /// The server answered with a body of the wrong shape.
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    /// A cached entry could not be read back. Handled as a miss.
    #[error("Unreadable cache entry for {month}: {reason}")]
    CacheAnomaly { month: MonthKey, reason: String },

    /// A background fetch was dropped by its scheduler before it ran
    /// to completion.
    #[error("Background fetch of {0} was abandoned")]
    Abandoned(MonthKey),

    #[error("{0}")]
    Core(String),
}

impl PlanningError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Backend { .. } | Self::Abandoned(_)
        )
    }
}

impl From<BackendError> for PlanningError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(msg) => Self::Network(msg),
            BackendError::Validation { status, message } => {
                Self::ServerValidation { status, message }
            }
            BackendError::Api { status, body } => Self::Backend { status, body },
            BackendError::Decode(msg) => Self::InvalidResponse(msg),
        }
    }
}

impl From<CoreError> for PlanningError {
    fn from(err: CoreError) -> Self {
        Self::Core(err.to_string())
    }
}
