//! Client side of the planning backend.
//!
//! [`PlanningBackend`] is the interface the engine consumes: month data,
//! single assignment, batch update and the administrative bulk
//! operations. [`HttpBackend`] implements it over the backend's JSON API
//! using [`reqwest`].

pub mod api;
pub mod backend;

pub use api::HttpBackend;
pub use backend::{AdminOperation, BackendError, PlanningBackend};
