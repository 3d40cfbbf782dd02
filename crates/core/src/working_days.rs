//! Duration to working-day conversion.
//!
//! Shifts are nominally 24h or 48h blocks. A shift shorter than
//! [`MIN_COUNTED_HOURS`] counts for nothing; beyond that, every started
//! 24h block counts as one day once the [`GRACE_HOURS`] tolerance is
//! exceeded. This is the only implementation of the rule: the calendar,
//! the ledger and the batch payload all call into it.

use chrono::{Duration, NaiveDateTime};

/// Shifts shorter than this many hours count as zero days.
pub const MIN_COUNTED_HOURS: i64 = 7;

/// Hours a shift may overrun a 24h block before an extra day is counted.
pub const GRACE_HOURS: i64 = 3;

const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Number of working days covered by the interval `start..end`.
///
/// Returns 0 when `end` is not after `start`.
pub fn working_days(start: NaiveDateTime, end: NaiveDateTime) -> u32 {
    working_days_for(end - start)
}

/// Number of working days for a raw duration.
///
/// `hours < 7` gives 0, otherwise `ceil((hours - 3) / 24)`. Computed on
/// whole seconds so that one second past a boundary already counts.
pub fn working_days_for(duration: Duration) -> u32 {
    let secs = duration.num_seconds();
    if secs < MIN_COUNTED_HOURS * SECS_PER_HOUR {
        return 0;
    }
    let counted = secs - GRACE_HOURS * SECS_PER_HOUR;
    // `counted` is strictly positive here, so the ceiling is exact.
    u32::try_from((counted + SECS_PER_DAY - 1) / SECS_PER_DAY).unwrap_or(u32::MAX)
}
