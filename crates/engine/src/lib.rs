//! Shift-planning coordination engine.
//!
//! A [`PlanningSession`] keeps a multi-month calendar of shifts responsive
//! while the scheduler edits it:
//!
//! - [`cache::MonthCache`]: stale-while-revalidate month cache with
//!   adjacent-month prefetch.
//! - [`gateway::CalendarGateway`]: fetches and merges the three-month
//!   window behind each calendar page.
//! - [`scheduler`]: low-priority task queue used for prefetch.
//! - [`session`]: drop resolution, the pending-change ledger and the
//!   batch commit.
//!
//! The session is owned by one task. Background fetches report back
//! through a channel and are applied by the owner with
//! [`PlanningSession::next_completion`], so the cache and the ledger are
//! only ever mutated from that task.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod reconcile;
pub mod scheduler;
pub mod session;

pub use cache::{CacheHit, CacheStore, MemoryStore, MonthCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AssignMode, ConfigError, EngineConfig};
pub use error::PlanningError;
pub use gateway::CalendarGateway;
pub use reconcile::{SaveOutcome, SaveReport};
pub use scheduler::{IdleQueue, Task, TaskScheduler};
pub use session::{
    Completion, CompletionEffect, DropOutcome, FetchOrigin, NavigationGuard, PlanningSession,
    RenderOutcome, RenderSource, SessionParts,
};
