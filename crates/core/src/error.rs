use chrono::NaiveDate;

use crate::types::{DbId, ShiftId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Problems with what the user asked for. Shown inline, never mutate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserInputError {
    #[error("No shift found on {0}")]
    NoShiftOnDate(NaiveDate),

    #[error("Shift {0} is not one of the proposed candidates")]
    NotACandidate(ShiftId),

    #[error("There is no pending choice to resolve")]
    NoPendingChoice,

    #[error("Shift {0} is not part of the displayed calendar")]
    UnknownShift(ShiftId),

    #[error("A shift must end after it starts")]
    InvalidInterval,
}
