//! Shift-planning domain logic.
//!
//! This crate has no I/O and no async code. Everything here is a pure
//! function of the data passed in by the caller, so the engine, the HTTP
//! client and any tooling can share one implementation of each rule.

pub mod batch;
pub mod calendar;
pub mod error;
pub mod ledger;
pub mod models;
pub mod month;
pub mod resolver;
pub mod types;
pub mod working_days;

pub use error::{CoreError, UserInputError};
pub use month::MonthKey;
pub use types::{DbId, ShiftId, Timestamp};
pub use working_days::working_days;
