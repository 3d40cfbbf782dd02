//! Calendar data gateway.
//!
//! A displayed month always needs its neighbours too: shifts and on-call
//! periods straddle month boundaries. The gateway fetches the previous,
//! current and next month concurrently and merges them into one
//! deduplicated window.

use std::sync::Arc;

use gardes_client::{BackendError, PlanningBackend};
use gardes_core::models::MonthData;
use gardes_core::MonthKey;

pub struct CalendarGateway<B: ?Sized> {
    backend: Arc<B>,
}

impl<B: ?Sized> Clone for CalendarGateway<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: PlanningBackend + ?Sized> CalendarGateway<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Fetch and merge the three-month window centred on `month`.
    ///
    /// Fails as a whole if any of the three requests fails; a partial
    /// window is never returned.
    pub async fn fetch_window(&self, month: MonthKey) -> Result<MonthData, BackendError> {
        let [prev, current, next] = month.window();
        let (prev, current, next) = futures::try_join!(
            self.backend.month_data(prev),
            self.backend.month_data(current),
            self.backend.month_data(next),
        )?;
        let merged = MonthData::merge([prev, current, next]);
        tracing::debug!(
            month = %month,
            shifts = merged.shifts.len(),
            absences = merged.absences.len(),
            meetings = merged.meetings.len(),
            "Fetched month window"
        );
        Ok(merged)
    }
}
