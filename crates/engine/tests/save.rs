//! Batch reconciliation: save, failure retention and admin operations.

mod common;

use assert_matches::assert_matches;
use common::*;
use gardes_client::{AdminOperation, BackendError};
use gardes_core::batch::BatchWarning;
use gardes_core::ledger::{ChangeKind, ChangePayload};
use gardes_engine::{CompletionEffect, PlanningError, RenderSource, SaveOutcome};
use gardes_events::NotificationLevel;

async fn march_harness() -> Harness {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();
    h.drain_notifications();
    h
}

fn leave_balance_warning(target_id: i64) -> BatchWarning {
    BatchWarning {
        target_id: Some(target_id),
        code: Some("LEAVE_BALANCE".into()),
        message: "Solde de congés dépassé".into(),
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_ledger_sends_nothing() {
    let mut h = march_harness().await;

    let outcome = h.session.save().await.unwrap();

    assert_eq!(outcome, SaveOutcome::NothingToSave);
    assert_eq!(h.backend.batch_count(), 0);
}

#[tokio::test]
async fn assign_and_delete_are_saved_with_a_warning() {
    let mut h = march_harness().await;
    // Cache the April window too; it contains March and must be purged.
    h.backend.set_month(month(2024, 4), Default::default());
    h.session.show_month(month(2024, 4)).await.unwrap();
    h.session.show_month(march()).await.unwrap();

    h.session
        .add_change(1, ChangePayload::Assign { worker_id: Some(42) })
        .unwrap();
    h.session.delete_shift(2).unwrap();
    h.backend.warn_on_batch(vec![leave_balance_warning(1)]);
    h.drain_notifications();
    let calls = h.backend.month_call_count();

    let outcome = h.session.save().await.unwrap();

    let report = assert_matches!(outcome, SaveOutcome::Saved(r) => r);
    assert_eq!(report.warnings, vec![leave_balance_warning(1)]);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.invalidated, vec![month(2024, 2), march(), month(2024, 4)]);
    assert!(report.reloaded);

    let sent = h.backend.batches.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let kinds: Vec<(i64, ChangeKind)> = sent[0].iter().map(|c| (c.target_id, c.kind)).collect();
    assert_eq!(kinds, vec![(1, ChangeKind::Assign), (2, ChangeKind::Delete)]);
    assert_eq!(sent[0][0].payload["workerId"], 42);

    assert!(h.session.ledger().is_empty());
    assert!(!h.session.is_dirty());

    // Forced reload of the visible window, April stays purged.
    assert_eq!(h.backend.month_call_count(), calls + 3);
    assert!(h.session.cache_mut().get(month(2024, 4)).is_none());
    assert!(h.session.cache_mut().get(march()).unwrap().fresh);

    let warnings = h.notifications_at(NotificationLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].shift_id, Some(1));
    assert_eq!(warnings[0].message, "Solde de congés dépassé");
}

#[tokio::test]
async fn view_shows_server_state_after_save() {
    let mut h = march_harness().await;
    h.session.delete_shift(2).unwrap();
    assert!(h.session.view().shift_item(2).is_none());

    // The server refused nothing but still holds shift 2 in this fixture;
    // the reloaded view follows the server, not the local projection.
    h.session.save().await.unwrap();

    assert!(h.session.view().shift_item(2).is_some());
    assert_eq!(
        h.session.view().shift_item(2).unwrap().shift.as_ref().unwrap().pending,
        None
    );
}

#[tokio::test]
async fn network_failure_keeps_every_change_for_retry() {
    let mut h = march_harness().await;
    h.session.unassign_shift(1).unwrap();
    h.session.delete_shift(3).unwrap();
    h.backend
        .fail_writes(Some(BackendError::Request("connection refused".into())));

    let err = h.session.save().await.unwrap_err();

    assert_matches!(err, PlanningError::Network(_));
    assert!(err.is_retryable());
    assert_eq!(h.session.ledger().len(), 2);
    assert!(h.session.is_dirty());
    assert!(h.session.view().shift_item(3).is_none());
    assert_eq!(h.notifications_at(NotificationLevel::Error).len(), 1);

    h.backend.fail_writes(None);
    let outcome = h.session.save().await.unwrap();

    assert_matches!(outcome, SaveOutcome::Saved(_));
    let sent = h.backend.batches.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert!(h.session.ledger().is_empty());
}

#[tokio::test]
async fn hard_rejection_fails_the_whole_batch() {
    let mut h = march_harness().await;
    h.session.delete_shift(4).unwrap();
    h.backend.fail_writes(Some(BackendError::Validation {
        status: 422,
        message: "Garde 4 déjà validée".into(),
    }));
    let calls = h.backend.month_call_count();

    let err = h.session.save().await.unwrap_err();

    assert_eq!(
        err,
        PlanningError::ServerValidation {
            status: 422,
            message: "Garde 4 déjà validée".into()
        }
    );
    assert_eq!(h.session.ledger().len(), 1);
    assert_eq!(h.backend.month_call_count(), calls);
    assert!(h.session.cache_mut().get(march()).is_some());
}

#[tokio::test]
async fn revalidation_started_before_a_save_is_discarded() {
    let mut h = march_harness().await;
    h.clock.advance(chrono::Duration::seconds(301));
    let outcome = h.session.show_month(march()).await.unwrap();
    assert_eq!(outcome.source, RenderSource::Stale);

    h.session.delete_shift(1).unwrap();
    h.session.save().await.unwrap();

    assert_eq!(
        h.session.next_completion().await,
        Some(CompletionEffect::Discarded(march()))
    );
    assert!(h.session.cache_mut().get(march()).unwrap().fresh);
}

// ---------------------------------------------------------------------------
// Administrative operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_operation_invalidates_and_reloads() {
    let mut h = march_harness().await;
    let calls = h.backend.month_call_count();

    let result = h
        .session
        .run_admin(AdminOperation::GenerateFromTemplate {
            month: march(),
            template_id: 3,
        })
        .await
        .unwrap();

    assert_eq!(result["operation"], "generate_from_template");
    assert_eq!(h.backend.admin_calls.lock().unwrap().len(), 1);
    assert_eq!(h.backend.month_call_count(), calls + 3);
    assert_eq!(h.notifications_at(NotificationLevel::Success).len(), 1);
}

#[tokio::test]
async fn failed_admin_operation_leaves_the_cache_alone() {
    let mut h = march_harness().await;
    h.backend.fail_writes(Some(BackendError::Api {
        status: 500,
        body: "boom".into(),
    }));

    let err = h
        .session
        .run_admin(AdminOperation::DeleteMonth { month: march() })
        .await
        .unwrap_err();

    assert_matches!(err, PlanningError::Backend { status: 500, .. });
    assert!(h.session.cache_mut().get(march()).unwrap().fresh);
}
