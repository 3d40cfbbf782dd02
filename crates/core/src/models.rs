//! Records returned by the month-data endpoint.
//!
//! All times are local wall-clock times as stored by the backend
//! (`2024-03-01T07:00:00`). Fields the engine does not use (audit columns,
//! modification timestamps) are ignored on deserialization, so churn in
//! those columns never makes two payloads compare unequal.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::{DbId, ShiftId};
use crate::working_days::working_days;

// ---------------------------------------------------------------------------
// Shift assignments
// ---------------------------------------------------------------------------

/// Kind of shift, driving labels and main-vs-reinforcement display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShiftType {
    MainShift24h,
    MainShift48h,
    Reinforcement,
    #[serde(other)]
    Other,
}

impl ShiftType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainShift24h => "mainShift24h",
            Self::MainShift48h => "mainShift48h",
            Self::Reinforcement => "reinforcement",
            Self::Other => "other",
        }
    }

    pub fn is_reinforcement(&self) -> bool {
        matches!(self, Self::Reinforcement)
    }

    /// Short label shown on the calendar.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MainShift24h => "Garde 24h",
            Self::MainShift48h => "Garde 48h",
            Self::Reinforcement => "Renfort",
            Self::Other => "Garde",
        }
    }
}

/// Lifecycle status of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShiftStatus {
    Draft,
    Validated,
    ToReplaceAbsence,
    ToReplaceMeetingConflict,
}

impl ShiftStatus {
    /// The assigned worker can no longer cover this shift.
    pub fn needs_replacement(&self) -> bool {
        matches!(self, Self::ToReplaceAbsence | Self::ToReplaceMeetingConflict)
    }
}

/// Position of a shift inside a multi-part shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSegment {
    /// 1-based index of this part.
    pub index: u32,
    /// Total number of parts.
    pub count: u32,
    /// Id of the shift this part was split from, if any.
    #[serde(default)]
    pub parent_id: Option<ShiftId>,
}

/// A scheduled work period ("garde").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignment {
    pub id: ShiftId,
    /// Missing on malformed rows; such shifts are never rendered.
    pub start_at: Option<NaiveDateTime>,
    pub end_at: Option<NaiveDateTime>,
    #[serde(rename = "type")]
    pub shift_type: ShiftType,
    pub status: ShiftStatus,
    #[serde(default)]
    pub assigned_worker_id: Option<DbId>,
    #[serde(default)]
    pub location_id: Option<DbId>,
    #[serde(default)]
    pub segment: Option<ShiftSegment>,
}

impl ShiftAssignment {
    /// Working days derived from the shift's own interval.
    ///
    /// Never stored: recomputing keeps it in step with the displayed
    /// duration.
    pub fn working_days_count(&self) -> u32 {
        match (self.start_at, self.end_at) {
            (Some(start), Some(end)) => working_days(start, end),
            _ => 0,
        }
    }

    /// Whether the shift occupies `date` on the calendar.
    ///
    /// A shift covers its start day and every following day it is still
    /// running at midnight. A 07:00 to 07:00 shift covers only its first
    /// day; a 48h shift starting at 07:00 covers two.
    pub fn covers(&self, date: NaiveDate) -> bool {
        let Some(start) = self.start_at else {
            return false;
        };
        let start_day = start.date();
        if date == start_day {
            return true;
        }
        let end_day = self.end_at.map(|e| e.date()).unwrap_or(start_day);
        start_day < date && date < end_day
    }
}

// ---------------------------------------------------------------------------
// Other calendar records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Absence {
    pub id: DbId,
    pub worker_id: DbId,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub type_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: DbId,
    pub title: String,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    #[serde(default)]
    pub participant_ids: Vec<DbId>,
}

/// On-call duty ("astreinte"), drawn as a week-spanning overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallPeriod {
    pub id: DbId,
    #[serde(default)]
    pub worker_id: Option<DbId>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedRestDay {
    pub id: DbId,
    pub worker_id: DbId,
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Month payload
// ---------------------------------------------------------------------------

/// Everything the calendar needs for one fetch window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthData {
    #[serde(default)]
    pub shifts: Vec<ShiftAssignment>,
    #[serde(default)]
    pub absences: Vec<Absence>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub on_call_periods: Vec<OnCallPeriod>,
    #[serde(default)]
    pub fixed_rest_days: Vec<FixedRestDay>,
}

/// Anything carrying a backend id.
pub trait Identified {
    fn id(&self) -> DbId;
}

macro_rules! impl_identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> DbId {
                self.id
            }
        })*
    };
}

impl_identified!(ShiftAssignment, Absence, Meeting, OnCallPeriod, FixedRestDay);

/// Keep the first occurrence of every id, preserving order.
pub fn dedup_by_id<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(item.id())).collect()
}

impl MonthData {
    /// Merge several month payloads into one window.
    ///
    /// Adjacent month queries return entities straddling the boundary
    /// twice; every list is deduplicated by id and sorted by id so the
    /// merged payload does not depend on the order the months arrived in.
    pub fn merge<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = MonthData>,
    {
        let mut merged = MonthData::default();
        for part in parts {
            merged.shifts.extend(part.shifts);
            merged.absences.extend(part.absences);
            merged.meetings.extend(part.meetings);
            merged.on_call_periods.extend(part.on_call_periods);
            merged.fixed_rest_days.extend(part.fixed_rest_days);
        }
        merged.normalize();
        merged
    }

    /// Deduplicate every list by id and sort it by id.
    pub fn normalize(&mut self) {
        fn tidy<T: Identified>(items: &mut Vec<T>) {
            let owned = std::mem::take(items);
            *items = dedup_by_id(owned);
            items.sort_by_key(|item| item.id());
        }
        tidy(&mut self.shifts);
        tidy(&mut self.absences);
        tidy(&mut self.meetings);
        tidy(&mut self.on_call_periods);
        tidy(&mut self.fixed_rest_days);
    }

    pub fn shift(&self, id: ShiftId) -> Option<&ShiftAssignment> {
        self.shifts.iter().find(|s| s.id == id)
    }

    pub fn shift_mut(&mut self, id: ShiftId) -> Option<&mut ShiftAssignment> {
        self.shifts.iter_mut().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
            && self.absences.is_empty()
            && self.meetings.is_empty()
            && self.on_call_periods.is_empty()
            && self.fixed_rest_days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn shift(id: ShiftId, start: &str, end: &str) -> ShiftAssignment {
        ShiftAssignment {
            id,
            start_at: Some(dt(start)),
            end_at: Some(dt(end)),
            shift_type: ShiftType::MainShift24h,
            status: ShiftStatus::Draft,
            assigned_worker_id: None,
            location_id: None,
            segment: None,
        }
    }

    #[test]
    fn deserializes_backend_payload() {
        let json = serde_json::json!({
            "shifts": [{
                "id": 1,
                "startAt": "2024-03-01T07:00:00",
                "endAt": "2024-03-02T07:00:00",
                "type": "mainShift24h",
                "status": "toReplaceAbsence",
                "assignedWorkerId": 12,
                "updatedAt": "2024-02-20T10:00:00Z"
            }],
            "absences": [],
            "meetings": [],
            "onCallPeriods": []
        });
        let data: MonthData = serde_json::from_value(json).unwrap();
        let s = &data.shifts[0];
        assert_eq!(s.shift_type, ShiftType::MainShift24h);
        assert!(s.status.needs_replacement());
        assert_eq!(s.assigned_worker_id, Some(12));
        assert!(data.fixed_rest_days.is_empty());
    }

    #[test]
    fn unknown_shift_type_maps_to_other() {
        let s: ShiftType = serde_json::from_str("\"nightWatch\"").unwrap();
        assert_eq!(s, ShiftType::Other);
    }

    #[test]
    fn merge_dedups_boundary_entities() {
        let feb = MonthData {
            shifts: vec![shift(2, "2024-02-29T07:00", "2024-03-01T07:00")],
            ..Default::default()
        };
        let mar = MonthData {
            shifts: vec![
                shift(3, "2024-03-05T07:00", "2024-03-06T07:00"),
                shift(2, "2024-02-29T07:00", "2024-03-01T07:00"),
            ],
            ..Default::default()
        };
        let merged = MonthData::merge([feb, mar]);
        let ids: Vec<_> = merged.shifts.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = MonthData {
            shifts: vec![shift(5, "2024-03-05T07:00", "2024-03-06T07:00")],
            ..Default::default()
        };
        let b = MonthData {
            shifts: vec![shift(1, "2024-03-01T07:00", "2024-03-02T07:00")],
            ..Default::default()
        };
        assert_eq!(
            MonthData::merge([a.clone(), b.clone()]),
            MonthData::merge([b, a])
        );
    }

    #[test]
    fn covers_start_day_and_running_days() {
        let s24 = shift(1, "2024-03-01T07:00", "2024-03-02T07:00");
        assert!(s24.covers(dt("2024-03-01T00:00").date()));
        assert!(!s24.covers(dt("2024-03-02T00:00").date()));

        let s48 = shift(2, "2024-03-01T07:00", "2024-03-03T07:00");
        assert!(s48.covers(dt("2024-03-02T00:00").date()));
        assert!(!s48.covers(dt("2024-03-03T00:00").date()));
        assert!(!s48.covers(dt("2024-02-29T00:00").date()));
    }

    #[test]
    fn working_days_count_is_derived() {
        let mut s = shift(1, "2024-03-01T07:00", "2024-03-03T07:00");
        assert_eq!(s.working_days_count(), 2);
        s.end_at = Some(dt("2024-03-03T11:01"));
        assert_eq!(s.working_days_count(), 3);
        s.start_at = None;
        assert_eq!(s.working_days_count(), 0);
    }
}
