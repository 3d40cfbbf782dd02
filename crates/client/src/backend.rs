//! The backend interface consumed by the planning engine.

use async_trait::async_trait;
use gardes_core::batch::{BatchChange, BatchResponse};
use gardes_core::models::MonthData;
use gardes_core::types::{DbId, ShiftId};
use gardes_core::MonthKey;

/// Errors from the backend layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The backend rejected the request as invalid. Nothing was written.
    #[error("Rejected by the planning API ({status}): {message}")]
    Validation {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason extracted from the response body.
        message: String,
    },

    /// Any other non-2xx response.
    #[error("Planning API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

impl BackendError {
    /// Transport failure: the request may be retried as-is.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Hard business-rule rejection.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// Administrative bulk operations.
///
/// Opaque to the engine: the only contract is that on success the
/// affected month range is invalidated and reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminOperation {
    /// Create the month's shifts from a template.
    GenerateFromTemplate { month: MonthKey, template_id: DbId },
    /// Mark every shift of the month as validated.
    ValidateMonth { month: MonthKey },
    /// Delete every shift of the month.
    DeleteMonth { month: MonthKey },
}

impl AdminOperation {
    pub fn month(&self) -> MonthKey {
        match self {
            Self::GenerateFromTemplate { month, .. }
            | Self::ValidateMonth { month }
            | Self::DeleteMonth { month } => *month,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateFromTemplate { .. } => "generate_from_template",
            Self::ValidateMonth { .. } => "validate_month",
            Self::DeleteMonth { .. } => "delete_month",
        }
    }
}

/// Everything the engine needs from the planning backend.
#[async_trait]
pub trait PlanningBackend: Send + Sync + 'static {
    /// One consolidated payload (shifts, absences, meetings, on-call
    /// periods) for a single month.
    async fn month_data(&self, month: MonthKey) -> Result<MonthData, BackendError>;

    /// Assign (or with `None`, unassign) a worker right away.
    async fn assign(
        &self,
        shift_id: ShiftId,
        worker_id: Option<DbId>,
    ) -> Result<BatchResponse, BackendError>;

    /// Apply a whole change set in one request. Either every change is
    /// written or none is.
    async fn batch_update(&self, changes: &[BatchChange]) -> Result<BatchResponse, BackendError>;

    async fn run_admin(&self, operation: &AdminOperation)
        -> Result<serde_json::Value, BackendError>;
}
