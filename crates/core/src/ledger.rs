//! Pending-change ledger.
//!
//! Buffers local edits to shift assignments until one explicit batch
//! commit. There is at most one change per shift: a new change for the
//! same shift replaces the previous one, there is no local history.
//!
//! The ledger is also the reversible half of the optimistic UI: the view
//! is always `build_calendar(ledger.apply_to(base))`, so dropping the
//! ledger restores the server state without a round trip.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::batch::BatchChange;
use crate::error::UserInputError;
use crate::models::MonthData;
use crate::types::{DbId, ShiftId, Timestamp};
use crate::working_days::working_days;

/// Kind of buffered change, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Update,
    Assign,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Assign => "assign",
            Self::Delete => "delete",
        }
    }
}

/// New interval (and optionally location) for a shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftUpdate {
    start_at: NaiveDateTime,
    end_at: NaiveDateTime,
    location_id: Option<DbId>,
}

impl ShiftUpdate {
    /// Reject empty or inverted intervals.
    pub fn new(
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
        location_id: Option<DbId>,
    ) -> Result<Self, UserInputError> {
        if end_at <= start_at {
            return Err(UserInputError::InvalidInterval);
        }
        Ok(Self {
            start_at,
            end_at,
            location_id,
        })
    }

    pub fn start_at(&self) -> NaiveDateTime {
        self.start_at
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.end_at
    }

    pub fn location_id(&self) -> Option<DbId> {
        self.location_id
    }
}

/// The edit itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePayload {
    Update(ShiftUpdate),
    /// `None` clears the assignment.
    Assign { worker_id: Option<DbId> },
    Delete,
}

impl ChangePayload {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Update(_) => ChangeKind::Update,
            Self::Assign { .. } => ChangeKind::Assign,
            Self::Delete => ChangeKind::Delete,
        }
    }

    /// Wire form of the payload.
    ///
    /// Updates carry the recomputed working-day count so downstream
    /// consumers never derive it differently.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Update(update) => serde_json::json!({
                "startAt": update.start_at,
                "endAt": update.end_at,
                "locationId": update.location_id,
                "workingDaysCount": working_days(update.start_at, update.end_at),
            }),
            Self::Assign { worker_id } => serde_json::json!({ "workerId": worker_id }),
            Self::Delete => serde_json::json!({}),
        }
    }
}

/// A buffered edit for one shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub target_id: ShiftId,
    pub payload: ChangePayload,
    pub timestamp: Timestamp,
}

impl PendingChange {
    pub fn kind(&self) -> ChangeKind {
        self.payload.kind()
    }

    pub fn to_wire(&self) -> BatchChange {
        BatchChange {
            target_id: self.target_id,
            kind: self.kind(),
            payload: self.payload.to_json(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Unsaved edits keyed by shift id, in first-edit order.
#[derive(Debug, Clone, Default)]
pub struct ChangeLedger {
    changes: IndexMap<ShiftId, PendingChange>,
    dirty: bool,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `payload` for `target_id`, replacing any earlier change for
    /// the same shift. Marks the session dirty.
    ///
    /// Returns the change that was replaced, if any.
    pub fn add(
        &mut self,
        target_id: ShiftId,
        payload: ChangePayload,
        timestamp: Timestamp,
    ) -> Option<PendingChange> {
        self.dirty = true;
        self.changes.insert(
            target_id,
            PendingChange {
                target_id,
                payload,
                timestamp,
            },
        )
    }

    pub fn get(&self, target_id: ShiftId) -> Option<&PendingChange> {
        self.changes.get(&target_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.values()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether there are edits the user has not committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Drop every buffered change and mark the session clean.
    pub fn clear(&mut self) {
        self.changes.clear();
        self.dirty = false;
    }

    /// The change set as submitted to the batch endpoint.
    pub fn to_wire(&self) -> Vec<BatchChange> {
        self.changes.values().map(PendingChange::to_wire).collect()
    }

    /// Project the buffered edits onto `base`.
    ///
    /// Changes targeting shifts absent from `base` are skipped; they still
    /// apply once the window containing them is shown.
    pub fn apply_to(&self, base: &MonthData) -> MonthData {
        let mut projected = base.clone();
        for change in self.changes.values() {
            match &change.payload {
                ChangePayload::Update(update) => {
                    if let Some(shift) = projected.shift_mut(change.target_id) {
                        shift.start_at = Some(update.start_at);
                        shift.end_at = Some(update.end_at);
                        if update.location_id.is_some() {
                            shift.location_id = update.location_id;
                        }
                    }
                }
                ChangePayload::Assign { worker_id } => {
                    if let Some(shift) = projected.shift_mut(change.target_id) {
                        shift.assigned_worker_id = *worker_id;
                    }
                }
                ChangePayload::Delete => {
                    projected.shifts.retain(|s| s.id != change.target_id);
                }
            }
        }
        projected
    }
}
