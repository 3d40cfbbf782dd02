/// All backend primary keys are 64-bit integers.
pub type DbId = i64;

/// Identifier of a shift assignment ("garde").
pub type ShiftId = DbId;

/// Wall-clock instants used for bookkeeping (cache freshness, ledger stamps).
pub type Timestamp = chrono::DateTime<chrono::Utc>;
