//! Month data to render-ready calendar items.
//!
//! [`build_calendar`] is a pure function of its input: the same
//! [`MonthData`] always yields the same [`CalendarView`], item for item and
//! in the same order. Stacking precedence is fixed: absences first, then
//! shift assignments, then meetings.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::ledger::{ChangeKind, ChangeLedger};
use crate::models::{MonthData, OnCallPeriod, ShiftAssignment, ShiftStatus, ShiftType};
use crate::types::{DbId, ShiftId};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// What a calendar item was built from, in stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Absence,
    Shift,
    Meeting,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absence => "absence",
            Self::Shift => "shift",
            Self::Meeting => "meeting",
        }
    }
}

/// Display fields derived for a shift assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDisplay {
    pub shift_type: ShiftType,
    pub status: ShiftStatus,
    pub assigned_worker_id: Option<DbId>,
    pub location_id: Option<DbId>,
    pub assigned: bool,
    pub reinforcement: bool,
    pub needs_replacement: bool,
    pub working_days_count: u32,
    /// Kind of the unsaved local edit applied to this shift, if any.
    pub pending: Option<ChangeKind>,
}

/// One discrete event on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    /// Unique across kinds, e.g. `shift-12`.
    pub key: String,
    pub kind: ItemKind,
    pub source_id: DbId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    pub shift: Option<ShiftDisplay>,
}

impl CalendarItem {
    /// Whether the item is visible anywhere in `from..=to`.
    pub fn overlaps_days(&self, from: NaiveDate, to: NaiveDate) -> bool {
        let window_start = from.and_time(NaiveTime::MIN);
        let window_end = (to + Duration::days(1)).and_time(NaiveTime::MIN);
        self.start < window_end && (self.end > window_start || self.start >= window_start)
    }
}

/// One week-row band of an on-call period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnCallOverlay {
    pub period_id: DbId,
    pub worker_id: Option<DbId>,
    pub label: String,
    /// Monday of the week row.
    pub week_start: NaiveDate,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDayMarker {
    pub id: DbId,
    pub worker_id: DbId,
    pub date: NaiveDate,
}

/// Everything the hosting UI draws for one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub items: Vec<CalendarItem>,
    pub on_call: Vec<OnCallOverlay>,
    pub rest_days: Vec<RestDayMarker>,
}

impl CalendarView {
    /// Items visible in the inclusive day range, in stacking order.
    pub fn items_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &CalendarItem> + '_ {
        self.items
            .iter()
            .filter(move |item| item.overlaps_days(from, to))
    }

    pub fn shift_item(&self, id: ShiftId) -> Option<&CalendarItem> {
        self.items
            .iter()
            .find(|item| item.kind == ItemKind::Shift && item.source_id == id)
    }

    pub fn shift_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.kind == ItemKind::Shift)
            .count()
    }

    /// Flag every shift carrying a buffered edit.
    pub fn mark_pending(&mut self, ledger: &ChangeLedger) {
        for item in &mut self.items {
            if let Some(display) = item.shift.as_mut() {
                display.pending = ledger.get(item.source_id).map(|c| c.kind());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

/// Build the render-ready view of `data`.
pub fn build_calendar(data: &MonthData) -> CalendarView {
    let mut absences: Vec<CalendarItem> = data
        .absences
        .iter()
        .map(|a| CalendarItem {
            key: format!("absence-{}", a.id),
            kind: ItemKind::Absence,
            source_id: a.id,
            start: a.start_at,
            end: a.end_at,
            title: format!("Absence {}", a.type_code),
            shift: None,
        })
        .collect();

    let mut shifts: Vec<CalendarItem> = data.shifts.iter().filter_map(shift_item).collect();

    let mut meetings: Vec<CalendarItem> = data
        .meetings
        .iter()
        .map(|m| CalendarItem {
            key: format!("meeting-{}", m.id),
            kind: ItemKind::Meeting,
            source_id: m.id,
            start: m.start_at,
            end: m.end_at,
            title: m.title.clone(),
            shift: None,
        })
        .collect();

    for group in [&mut absences, &mut shifts, &mut meetings] {
        group.sort_by(|a, b| (a.start, a.source_id).cmp(&(b.start, b.source_id)));
    }

    let mut items = absences;
    items.append(&mut shifts);
    items.append(&mut meetings);

    let mut on_call: Vec<OnCallOverlay> =
        data.on_call_periods.iter().flat_map(week_bands).collect();
    on_call.sort_by(|a, b| {
        (a.first_day, a.period_id).cmp(&(b.first_day, b.period_id))
    });

    let mut rest_days: Vec<RestDayMarker> = data
        .fixed_rest_days
        .iter()
        .map(|r| RestDayMarker {
            id: r.id,
            worker_id: r.worker_id,
            date: r.date,
        })
        .collect();
    rest_days.sort_by_key(|r| (r.date, r.id));

    CalendarView {
        items,
        on_call,
        rest_days,
    }
}

/// Shifts without a start instant are dropped.
fn shift_item(shift: &ShiftAssignment) -> Option<CalendarItem> {
    let start = shift.start_at?;
    let end = shift.end_at.unwrap_or(start);

    let mut title = shift.shift_type.label().to_string();
    if let Some(segment) = &shift.segment {
        title.push_str(&format!(" ({}/{})", segment.index, segment.count));
    }

    Some(CalendarItem {
        key: format!("shift-{}", shift.id),
        kind: ItemKind::Shift,
        source_id: shift.id,
        start,
        end,
        title,
        shift: Some(ShiftDisplay {
            shift_type: shift.shift_type,
            status: shift.status,
            assigned_worker_id: shift.assigned_worker_id,
            location_id: shift.location_id,
            assigned: shift.assigned_worker_id.is_some(),
            reinforcement: shift.shift_type.is_reinforcement(),
            needs_replacement: shift.status.needs_replacement(),
            working_days_count: shift.working_days_count(),
            pending: None,
        }),
    })
}

/// Split an on-call period into Monday-based week rows.
fn week_bands(period: &OnCallPeriod) -> Vec<OnCallOverlay> {
    let first = period.start_at.date();
    // An end at midnight does not occupy that day.
    let mut last = period.end_at.date();
    if period.end_at.time() == NaiveTime::MIN && last > first {
        last = last.pred_opt().unwrap_or(first);
    }
    if last < first {
        return Vec::new();
    }

    let mut bands = Vec::new();
    let mut day = first;
    while day <= last {
        let week_start = day - Duration::days(day.weekday().num_days_from_monday() as i64);
        let week_end = week_start + Duration::days(6);
        let band_last = week_end.min(last);
        bands.push(OnCallOverlay {
            period_id: period.id,
            worker_id: period.worker_id,
            label: period.label.clone(),
            week_start,
            first_day: day,
            last_day: band_last,
        });
        day = band_last + Duration::days(1);
    }
    bands
}
