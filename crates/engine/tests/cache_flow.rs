//! Stale-while-revalidate rendering through a [`PlanningSession`].

mod common;

use assert_matches::assert_matches;
use common::*;
use gardes_client::BackendError;
use gardes_engine::{
    CacheStore, CompletionEffect, MemoryStore, PlanningError, RenderSource,
};
use gardes_events::NotificationLevel;

fn stale_after_ttl(h: &Harness) {
    h.clock.advance(chrono::Duration::seconds(301));
}

// ---------------------------------------------------------------------------
// Render policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn miss_fetches_window_then_fresh_hit_makes_no_request() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());

    let outcome = h.session.show_month(march()).await.unwrap();
    assert_eq!(outcome.source, RenderSource::Live);
    assert_eq!(
        *h.backend.month_calls.lock().unwrap(),
        vec![month(2024, 2), march(), month(2024, 4)]
    );
    assert_eq!(h.session.view().shift_count(), 4);

    let outcome = h.session.show_month(march()).await.unwrap();
    assert_eq!(outcome.source, RenderSource::Fresh);
    assert!(!outcome.revalidating);
    assert_eq!(h.backend.month_call_count(), 3);
}

#[tokio::test]
async fn stale_entry_renders_at_once_and_revalidates_once() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();
    stale_after_ttl(&h);

    let first = h.session.show_month(march()).await.unwrap();
    assert_eq!(first.source, RenderSource::Stale);
    assert!(first.revalidating);
    assert_eq!(h.session.view().shift_count(), 4);

    // Already syncing: no second revalidation.
    let second = h.session.show_month(march()).await.unwrap();
    assert_eq!(second.source, RenderSource::Stale);
    assert!(!second.revalidating);

    assert_eq!(
        h.session.next_completion().await,
        Some(CompletionEffect::Unchanged(march()))
    );
    assert_eq!(h.session.next_completion().await, None);
    assert_eq!(h.backend.month_call_count(), 6);

    // Unchanged data renewed the freshness.
    let third = h.session.show_month(march()).await.unwrap();
    assert_eq!(third.source, RenderSource::Fresh);
}

#[tokio::test]
async fn changed_server_data_refreshes_the_view() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();
    stale_after_ttl(&h);

    h.session.show_month(march()).await.unwrap();
    let mut updated = march_data();
    updated
        .shifts
        .push(shift(5, "2024-03-20T07:00", "2024-03-21T07:00", None));
    h.backend.set_month(march(), updated);

    assert_eq!(
        h.session.next_completion().await,
        Some(CompletionEffect::Refreshed(march()))
    );
    assert_eq!(h.session.view().shift_count(), 5);
    assert!(h.session.view().shift_item(5).is_some());
}

#[tokio::test]
async fn failed_revalidation_keeps_the_cached_copy() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();
    stale_after_ttl(&h);
    h.backend
        .fail_fetches(Some(BackendError::Request("connection reset".into())));

    h.session.show_month(march()).await.unwrap();
    let effect = h.session.next_completion().await.unwrap();
    assert_matches!(
        effect,
        CompletionEffect::Failed { error: PlanningError::Network(_), .. }
    );

    let hit = h.session.cache_mut().get(march()).expect("entry kept");
    assert!(!hit.fresh);
    assert_eq!(hit.data, march_data());
    assert_eq!(h.session.view().shift_count(), 4);
    assert_eq!(h.notifications_at(NotificationLevel::Error).len(), 1);
}

#[tokio::test]
async fn failed_live_fetch_keeps_the_previous_month_on_screen() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();

    h.backend.fail_fetches(Some(BackendError::Api {
        status: 503,
        body: "maintenance".into(),
    }));
    let err = h.session.show_month(month(2024, 6)).await.unwrap_err();

    assert_matches!(err, PlanningError::Backend { status: 503, .. });
    assert!(err.is_retryable());
    assert_eq!(h.session.current_month(), Some(march()));
    assert_eq!(h.session.view().shift_count(), 4);
    assert!(h.session.cache_mut().get(month(2024, 6)).is_none());
}

// ---------------------------------------------------------------------------
// Anomalies and invalidation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn corrupt_cache_entry_falls_back_to_a_live_fetch() {
    let mut store = MemoryStore::new();
    store.store(
        "planning:month:2024-03",
        serde_json::json!({ "monthKey": "2024-03", "data": [1, 2, 3] }),
    );
    let mut h = Harness::with_store(quiet_config(), store);
    h.backend.set_month(march(), march_data());

    let outcome = h.session.show_month(march()).await.unwrap();

    assert_eq!(outcome.source, RenderSource::Live);
    assert_eq!(h.session.view().shift_count(), 4);
}

#[tokio::test]
async fn revalidation_outliving_an_invalidation_is_discarded() {
    let mut h = Harness::new(quiet_config());
    h.backend.set_month(march(), march_data());
    h.session.show_month(march()).await.unwrap();
    stale_after_ttl(&h);
    h.session.show_month(march()).await.unwrap();

    let purged = h.session.invalidate_months([march()]);
    assert_eq!(purged, vec![month(2024, 2), march(), month(2024, 4)]);

    assert_eq!(
        h.session.next_completion().await,
        Some(CompletionEffect::Discarded(march()))
    );
    assert!(h.session.cache_mut().get(march()).is_none());
}
