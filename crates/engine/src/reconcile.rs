//! Writing local edits back to the server.
//!
//! Every write path ends the same way: invalidate the cached windows of
//! the months it touched and reload the visible month from the server,
//! bypassing the cache, so the view shows exactly what was stored. A
//! failed write changes nothing locally; the ledger is kept for a retry.

use std::collections::BTreeSet;

use gardes_client::{AdminOperation, PlanningBackend};
use gardes_core::batch::{BatchResponse, BatchWarning};
use gardes_core::{DbId, MonthKey, ShiftId};
use gardes_events::Notification;

use crate::error::PlanningError;
use crate::session::PlanningSession;

/// Summary of a successful batch save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Soft warnings returned with the write. They never undo it.
    pub warnings: Vec<BatchWarning>,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    /// Month windows purged from the cache.
    pub invalidated: Vec<MonthKey>,
    /// Whether the follow-up reload succeeded.
    pub reloaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The ledger was empty; no request was sent.
    NothingToSave,
    Saved(SaveReport),
}

impl<B: PlanningBackend + ?Sized> PlanningSession<B> {
    /// Submit every buffered change in one batch request.
    ///
    /// On success the ledger is cleared, the touched months are
    /// invalidated and the visible month is reloaded. On failure the
    /// ledger is left exactly as it was.
    pub async fn save(&mut self) -> Result<SaveOutcome, PlanningError> {
        if self.ledger.is_empty() {
            tracing::debug!("Nothing to save");
            return Ok(SaveOutcome::NothingToSave);
        }

        let changes = self.ledger.to_wire();
        tracing::info!(changes = changes.len(), "Saving pending changes");

        let response = match self.gateway.backend().batch_update(&changes).await {
            Ok(response) => response,
            Err(e) => {
                let err = PlanningError::from(e);
                tracing::error!(
                    error = %err,
                    pending = self.ledger.len(),
                    "Batch save failed, keeping pending changes"
                );
                self.notifier.publish(Notification::error(format!(
                    "Échec de l'enregistrement : {err}"
                )));
                return Err(err);
            }
        };

        let mut touched = self.touched_months();
        self.ledger.clear();
        self.touched.clear();
        touched.extend(self.current);
        let invalidated = self.invalidate_months(touched);

        self.publish_warnings(&response.warnings);
        self.notifier.publish(Notification::success(format!(
            "{} modification(s) enregistrée(s)",
            changes.len()
        )));
        tracing::info!(
            created = response.created,
            updated = response.updated,
            deleted = response.deleted,
            warnings = response.warnings.len(),
            "Batch save succeeded"
        );

        let reloaded = self.reload().await.is_ok();
        let BatchResponse {
            warnings,
            created,
            updated,
            deleted,
        } = response;
        Ok(SaveOutcome::Saved(SaveReport {
            warnings,
            created,
            updated,
            deleted,
            invalidated,
            reloaded,
        }))
    }

    /// Months whose cached windows the buffered edits make obsolete.
    pub fn touched_months(&self) -> BTreeSet<MonthKey> {
        self.touched.clone()
    }

    /// Purge the cached windows containing each month and discard any
    /// background fetch of those windows still running.
    ///
    /// Returns the purged window keys in order.
    pub fn invalidate_months<I>(&mut self, months: I) -> Vec<MonthKey>
    where
        I: IntoIterator<Item = MonthKey>,
    {
        let mut purged = BTreeSet::new();
        for month in months {
            purged.extend(self.cache.invalidate_range(month));
        }
        for month in &purged {
            *self.epochs.entry(*month).or_insert(0) += 1;
        }
        purged.into_iter().collect()
    }

    /// Reload the visible month from the server, bypassing the cache.
    ///
    /// A failed reload keeps the current view and cache.
    pub async fn reload(&mut self) -> Result<(), PlanningError> {
        let Some(month) = self.current else {
            return Ok(());
        };
        let data = self.fetch_live(month).await?;
        self.cache.set(month, data.clone());
        self.present(month, data);
        tracing::debug!(month = %month, "Month reloaded from server");
        Ok(())
    }

    /// Assign (or unassign) a worker through the single-assignment
    /// endpoint, outside the ledger.
    pub async fn assign_now(
        &mut self,
        shift_id: ShiftId,
        worker_id: Option<DbId>,
    ) -> Result<Vec<BatchWarning>, PlanningError> {
        let months: Vec<MonthKey> = self
            .base
            .shift(shift_id)
            .and_then(|s| s.start_at)
            .map(|start| MonthKey::from_date(start.date()))
            .into_iter()
            .chain(self.current)
            .collect();

        let response = match self.gateway.backend().assign(shift_id, worker_id).await {
            Ok(response) => response,
            Err(e) => {
                let err = PlanningError::from(e);
                tracing::error!(shift_id, error = %err, "Assignment failed");
                self.notifier.publish(
                    Notification::error(format!("Échec de l'affectation : {err}")).for_shift(shift_id),
                );
                return Err(err);
            }
        };

        tracing::info!(shift_id, ?worker_id, "Assignment written");
        self.invalidate_months(months);
        self.publish_warnings(&response.warnings);
        self.notifier
            .publish(Notification::success("Affectation enregistrée").for_shift(shift_id));
        // The write succeeded; a failed reload is already notified.
        let _ = self.reload().await;
        Ok(response.warnings)
    }

    /// Run an administrative bulk operation, then invalidate its month
    /// range and reload.
    pub async fn run_admin(
        &mut self,
        operation: AdminOperation,
    ) -> Result<serde_json::Value, PlanningError> {
        let month = operation.month();
        let result = match self.gateway.backend().run_admin(&operation).await {
            Ok(result) => result,
            Err(e) => {
                let err = PlanningError::from(e);
                tracing::error!(operation = operation.name(), month = %month, error = %err, "Admin operation failed");
                self.notifier.publish(
                    Notification::error(format!("Échec de l'opération {} : {err}", operation.name()))
                        .for_month(month),
                );
                return Err(err);
            }
        };

        tracing::info!(operation = operation.name(), month = %month, "Admin operation succeeded");
        self.invalidate_months([month]);
        self.notifier.publish(
            Notification::success(format!("Opération {} terminée", operation.name()))
                .for_month(month),
        );
        let _ = self.reload().await;
        Ok(result)
    }

    fn publish_warnings(&self, warnings: &[BatchWarning]) {
        for warning in warnings {
            tracing::warn!(
                target_id = ?warning.target_id,
                code = ?warning.code,
                message = %warning.message,
                "Server warning"
            );
            let notification = Notification::warning(warning.message.clone());
            let notification = match warning.target_id {
                Some(id) => notification.for_shift(id),
                None => notification,
            };
            self.notifier.publish(notification);
        }
    }
}
