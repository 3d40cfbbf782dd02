//! Staff drop gesture to exactly one target shift.
//!
//! The resolver never guesses. It tries, in order, the element the drop
//! landed on, a hit test at the release point, then every shift covering
//! the drop date. Several shifts on that date yield a
//! [`DropResolution::Ambiguous`] candidate list that the user must pick
//! from; nothing is assigned until they do.
//!
//! Hit testing belongs to the host UI and is reached through
//! [`TargetLocator`]; shift lookups go through [`ShiftLookup`]. Both are
//! small traits so the resolver can be exercised without a UI.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::UserInputError;
use crate::models::{MonthData, ShiftAssignment};
use crate::types::{DbId, ShiftId};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Release coordinates in host-UI space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// A worker dropped somewhere on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropGesture {
    pub worker_id: DbId,
    /// Shift element reported by the drop event itself.
    #[serde(default)]
    pub target_shift: Option<ShiftId>,
    #[serde(default)]
    pub point: Option<ScreenPoint>,
    /// Calendar day under the pointer.
    pub date: NaiveDate,
}

/// Host-provided hit test: which shift element is rendered at a point.
pub trait TargetLocator {
    fn shift_at(&self, point: ScreenPoint) -> Option<ShiftId>;
}

/// Locator for hosts without hit testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocator;

impl TargetLocator for NoLocator {
    fn shift_at(&self, _point: ScreenPoint) -> Option<ShiftId> {
        None
    }
}

/// Shift queries the resolver needs from the displayed data.
pub trait ShiftLookup {
    fn has_shift(&self, id: ShiftId) -> bool;

    /// Every shift covering `date`, ordered by start then id.
    fn shifts_on(&self, date: NaiveDate) -> Vec<ShiftCandidate>;
}

impl ShiftLookup for MonthData {
    fn has_shift(&self, id: ShiftId) -> bool {
        self.shift(id).is_some_and(|s| s.start_at.is_some())
    }

    fn shifts_on(&self, date: NaiveDate) -> Vec<ShiftCandidate> {
        let mut candidates: Vec<ShiftCandidate> = self
            .shifts
            .iter()
            .filter(|s| s.covers(date))
            .filter_map(ShiftCandidate::from_shift)
            .collect();
        candidates.sort_by_key(|c| (c.start_at, c.shift_id));
        candidates
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One option offered to the user when a drop is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftCandidate {
    pub shift_id: ShiftId,
    pub location_id: Option<DbId>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// Location and time summary, e.g. `Lieu 3 · 01/03 07:00 → 02/03 07:00`.
    pub summary: String,
}

impl ShiftCandidate {
    fn from_shift(shift: &ShiftAssignment) -> Option<Self> {
        let start_at = shift.start_at?;
        let end_at = shift.end_at.unwrap_or(start_at);
        let place = match shift.location_id {
            Some(id) => format!("Lieu {id}"),
            None => "Sans lieu".to_string(),
        };
        let summary = format!(
            "{place} · {} → {}",
            start_at.format("%d/%m %H:%M"),
            end_at.format("%d/%m %H:%M")
        );
        Some(Self {
            shift_id: shift.id,
            location_id: shift.location_id,
            start_at,
            end_at,
            summary,
        })
    }
}

/// Which step of the lookup produced the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    DirectTarget,
    Point,
    Date,
    UserChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResolution {
    Resolved { shift_id: ShiftId, by: ResolvedBy },
    /// Two or more shifts cover the drop date.
    Ambiguous(Vec<ShiftCandidate>),
}

/// Resolve a drop gesture against the displayed shifts.
pub fn resolve_drop<L>(
    gesture: &DropGesture,
    locator: &dyn TargetLocator,
    lookup: &L,
) -> Result<DropResolution, UserInputError>
where
    L: ShiftLookup + ?Sized,
{
    if let Some(id) = gesture.target_shift.filter(|id| lookup.has_shift(*id)) {
        return Ok(DropResolution::Resolved {
            shift_id: id,
            by: ResolvedBy::DirectTarget,
        });
    }

    // The hovered element may have changed between hover and release.
    if let Some(id) = gesture
        .point
        .and_then(|p| locator.shift_at(p))
        .filter(|id| lookup.has_shift(*id))
    {
        return Ok(DropResolution::Resolved {
            shift_id: id,
            by: ResolvedBy::Point,
        });
    }

    let mut candidates = lookup.shifts_on(gesture.date);
    match candidates.len() {
        0 => Err(UserInputError::NoShiftOnDate(gesture.date)),
        1 => Ok(DropResolution::Resolved {
            shift_id: candidates.remove(0).shift_id,
            by: ResolvedBy::Date,
        }),
        _ => Ok(DropResolution::Ambiguous(candidates)),
    }
}

/// An ambiguous drop waiting for the user's pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChoice {
    pub worker_id: DbId,
    pub date: NaiveDate,
    pub candidates: Vec<ShiftCandidate>,
}

impl PendingChoice {
    /// Accept `shift_id` only if it was one of the offered candidates.
    pub fn choose(&self, shift_id: ShiftId) -> Result<ShiftId, UserInputError> {
        self.candidates
            .iter()
            .find(|c| c.shift_id == shift_id)
            .map(|c| c.shift_id)
            .ok_or(UserInputError::NotACandidate(shift_id))
    }
}
