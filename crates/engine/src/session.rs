//! The planning session.
//!
//! A [`PlanningSession`] is the single owner of everything the calendar
//! page holds: the month cache, the pending-change ledger, the base data
//! of the visible window and the view derived from it. Collaborators
//! (storage, clock, scheduler, notification bus) are injected through
//! [`SessionParts`].
//!
//! The view is never edited in place. It is always rebuilt as
//! `build_calendar(ledger.apply_to(base))`, so buffered edits show up
//! immediately and disappear as soon as the ledger is cleared or the base
//! is replaced by server data.
//!
//! Background work (stale revalidation, neighbour prefetch) runs on other
//! tasks and reports back as [`Completion`]s. The owner applies them with
//! [`next_completion`](PlanningSession::next_completion) or
//! [`drain_completions`](PlanningSession::drain_completions); a completion
//! that outlived an invalidation of its month is discarded.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use gardes_client::PlanningBackend;
use gardes_core::batch::BatchWarning;
use gardes_core::calendar::{build_calendar, CalendarItem, CalendarView};
use gardes_core::ledger::{ChangeLedger, ChangePayload, PendingChange, ShiftUpdate};
use gardes_core::models::MonthData;
use gardes_core::resolver::{
    resolve_drop, DropGesture, DropResolution, PendingChoice, ResolvedBy, ShiftCandidate,
    TargetLocator,
};
use gardes_core::{DbId, MonthKey, ShiftId, UserInputError};
use gardes_events::{Notification, NotificationBus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStore, MemoryStore, MonthCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{AssignMode, EngineConfig};
use crate::error::PlanningError;
use crate::gateway::CalendarGateway;
use crate::scheduler::{IdleQueue, TaskScheduler};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Injected collaborators of a session.
pub struct SessionParts {
    pub store: Box<dyn CacheStore>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub notifier: NotificationBus,
}

impl SessionParts {
    /// In-memory cache and wall clock around the given scheduler.
    pub fn in_memory(scheduler: Arc<dyn TaskScheduler>) -> Self {
        Self {
            store: Box::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            scheduler,
            notifier: NotificationBus::default(),
        }
    }

    /// In-memory cache, wall clock and an [`IdleQueue`] that runs until
    /// `cancel` fires.
    pub fn standard(cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (queue, handle) = IdleQueue::start(cancel);
        (Self::in_memory(Arc::new(queue)), handle)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where a rendered month came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSource {
    /// Fresh cache entry; no request was made.
    Fresh,
    /// Stale cache entry, shown while it is revalidated.
    Stale,
    /// Cache miss; the render waited for the server.
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub month: MonthKey,
    pub source: RenderSource,
    /// A background revalidation was started by this render.
    pub revalidating: bool,
}

/// Result of dropping a worker on the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Assignment buffered in the ledger and shown optimistically.
    Buffered { shift_id: ShiftId, by: ResolvedBy },
    /// Assignment written to the server right away.
    Committed {
        shift_id: ShiftId,
        warnings: Vec<BatchWarning>,
    },
    /// Several shifts cover the drop date; nothing was assigned.
    NeedsChoice(Vec<ShiftCandidate>),
}

/// What the host should do before leaving the planning page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationGuard {
    Allow,
    /// Unsaved edits would be lost.
    Confirm { pending: usize },
}

/// Which background path produced a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Revalidation,
    Prefetch,
}

/// Result of a background fetch, sent back to the owning session.
#[derive(Debug)]
pub struct Completion {
    pub month: MonthKey,
    pub origin: FetchOrigin,
    epoch: u64,
    pub result: Result<MonthData, PlanningError>,
}

/// Effect of applying one [`Completion`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEffect {
    /// Same data as the cache: only its freshness was renewed.
    Unchanged(MonthKey),
    /// Cache updated and the visible view rebuilt.
    Refreshed(MonthKey),
    /// Cache updated for a month that is not on screen.
    Cached(MonthKey),
    /// The fetch failed; the cache was left as it was.
    Failed {
        month: MonthKey,
        error: PlanningError,
    },
    /// The month was invalidated while the fetch was running.
    Discarded(MonthKey),
}

// ---------------------------------------------------------------------------
// PlanningSession
// ---------------------------------------------------------------------------

pub struct PlanningSession<B: PlanningBackend + ?Sized> {
    pub(crate) config: EngineConfig,
    pub(crate) gateway: CalendarGateway<B>,
    pub(crate) cache: MonthCache,
    pub(crate) ledger: ChangeLedger,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scheduler: Arc<dyn TaskScheduler>,
    pub(crate) notifier: NotificationBus,
    /// Month on screen.
    pub(crate) current: Option<MonthKey>,
    /// Server data of the visible window, without local edits.
    pub(crate) base: MonthData,
    pub(crate) view: CalendarView,
    /// Months touched by the buffered edits.
    pub(crate) touched: BTreeSet<MonthKey>,
    /// Months with a revalidation running.
    pub(crate) syncing: HashSet<MonthKey>,
    /// Months with a prefetch queued or running.
    pub(crate) in_flight: HashSet<MonthKey>,
    /// Bumped on every invalidation of a month.
    pub(crate) epochs: HashMap<MonthKey, u64>,
    pub(crate) pending_choice: Option<PendingChoice>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B: PlanningBackend + ?Sized> PlanningSession<B> {
    pub fn new(config: EngineConfig, backend: Arc<B>, parts: SessionParts) -> Self {
        let cache = MonthCache::new(parts.store, Arc::clone(&parts.clock), config.cache_ttl);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            config,
            gateway: CalendarGateway::new(backend),
            cache,
            ledger: ChangeLedger::new(),
            clock: parts.clock,
            scheduler: parts.scheduler,
            notifier: parts.notifier,
            current: None,
            base: MonthData::default(),
            view: CalendarView::default(),
            touched: BTreeSet::new(),
            syncing: HashSet::new(),
            in_flight: HashSet::new(),
            epochs: HashMap::new(),
            pending_choice: None,
            completions_tx,
            completions_rx,
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_month(&self) -> Option<MonthKey> {
        self.current
    }

    pub fn view(&self) -> &CalendarView {
        &self.view
    }

    /// Items overlapping the inclusive day range, in stacking order.
    pub fn items_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<&CalendarItem> {
        self.view.items_between(from, to).collect()
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    pub fn notifier(&self) -> &NotificationBus {
        &self.notifier
    }

    pub fn cache_mut(&mut self) -> &mut MonthCache {
        &mut self.cache
    }

    pub fn pending_choice(&self) -> Option<&PendingChoice> {
        self.pending_choice.as_ref()
    }

    /// Whether a revalidation or prefetch has not reported back yet.
    pub fn has_background_work(&self) -> bool {
        !self.syncing.is_empty() || !self.in_flight.is_empty()
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Show `month`, serving it from the cache when possible.
    ///
    /// - fresh entry: rendered with no request;
    /// - stale entry: rendered at once, one revalidation started;
    /// - miss: rendered after a live fetch.
    ///
    /// A failed live fetch leaves the previous view on screen.
    pub async fn show_month(&mut self, month: MonthKey) -> Result<RenderOutcome, PlanningError> {
        let outcome = match self.cache.get(month) {
            Some(hit) if hit.fresh => {
                tracing::debug!(month = %month, "Cache hit (fresh)");
                self.present(month, hit.data);
                RenderOutcome {
                    month,
                    source: RenderSource::Fresh,
                    revalidating: false,
                }
            }
            Some(hit) => {
                tracing::debug!(month = %month, fetched_at = %hit.fetched_at, "Cache hit (stale)");
                self.present(month, hit.data);
                let revalidating = self.spawn_revalidation(month);
                RenderOutcome {
                    month,
                    source: RenderSource::Stale,
                    revalidating,
                }
            }
            None => {
                tracing::debug!(month = %month, "Cache miss");
                let data = self.fetch_live(month).await?;
                self.cache.set(month, data.clone());
                self.present(month, data);
                RenderOutcome {
                    month,
                    source: RenderSource::Live,
                    revalidating: false,
                }
            }
        };

        if self.config.prefetch {
            self.schedule_prefetch(month);
        }
        Ok(outcome)
    }

    /// Queue low-priority fetches of the two neighbours of `month`.
    ///
    /// Months that are fresh, already queued or being revalidated are
    /// skipped. Returns the months actually queued.
    pub fn schedule_prefetch(&mut self, month: MonthKey) -> Vec<MonthKey> {
        let mut queued = Vec::new();
        for neighbour in [month.prev(), month.next()] {
            if self.in_flight.contains(&neighbour) || self.syncing.contains(&neighbour) {
                tracing::trace!(month = %neighbour, "Prefetch skipped, fetch in flight");
                continue;
            }
            if self.cache.is_fresh(neighbour) {
                tracing::trace!(month = %neighbour, "Prefetch skipped, cache fresh");
                continue;
            }
            self.in_flight.insert(neighbour);

            let gateway = self.gateway.clone();
            let reply = self.reply_slot(neighbour, FetchOrigin::Prefetch);
            self.scheduler.schedule(Box::pin(async move {
                let result = gateway
                    .fetch_window(neighbour)
                    .await
                    .map_err(PlanningError::from);
                reply.send(result);
            }));
            tracing::debug!(month = %neighbour, "Prefetch scheduled");
            queued.push(neighbour);
        }
        queued
    }

    /// Wait for the next background fetch and apply it.
    ///
    /// Returns `None` at once when nothing is outstanding.
    pub async fn next_completion(&mut self) -> Option<CompletionEffect> {
        if !self.has_background_work() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply_completion(completion))
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain_completions(&mut self) -> Vec<CompletionEffect> {
        let mut effects = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            effects.push(self.apply_completion(completion));
        }
        effects
    }

    pub fn apply_completion(&mut self, completion: Completion) -> CompletionEffect {
        let Completion {
            month,
            origin,
            epoch,
            result,
        } = completion;

        // A prefetch that was already running when its month went stale on
        // screen stands in for the revalidation.
        let origin = match origin {
            FetchOrigin::Revalidation => {
                self.syncing.remove(&month);
                origin
            }
            FetchOrigin::Prefetch => {
                self.in_flight.remove(&month);
                if self.syncing.remove(&month) {
                    FetchOrigin::Revalidation
                } else {
                    origin
                }
            }
        };

        if epoch != self.epoch(month) {
            tracing::debug!(month = %month, ?origin, "Discarding fetch that outlived an invalidation");
            return CompletionEffect::Discarded(month);
        }

        let data = match result {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(month = %month, ?origin, error = %error, "Background fetch failed");
                if origin == FetchOrigin::Revalidation {
                    self.notifier.publish(
                        Notification::error(format!(
                            "Impossible d'actualiser le planning de {month} : {error}"
                        ))
                        .for_month(month),
                    );
                }
                return CompletionEffect::Failed { month, error };
            }
        };

        let unchanged = self.cache.get(month).is_some_and(|hit| hit.data == data);
        if unchanged {
            self.cache.touch(month);
            tracing::debug!(month = %month, ?origin, "Cached month unchanged");
            return CompletionEffect::Unchanged(month);
        }

        self.cache.set(month, data.clone());
        if self.current == Some(month) {
            tracing::info!(month = %month, "Month changed on the server, refreshing view");
            self.present(month, data);
            CompletionEffect::Refreshed(month)
        } else {
            tracing::debug!(month = %month, ?origin, "Cached month updated");
            CompletionEffect::Cached(month)
        }
    }

    // -----------------------------------------------------------------------
    // Assignment by drop
    // -----------------------------------------------------------------------

    /// Assign `gesture.worker_id` to the shift the gesture resolves to.
    ///
    /// An ambiguous drop stores a [`PendingChoice`] and changes nothing
    /// else; complete it with [`choose_candidate`](Self::choose_candidate).
    pub async fn drop_worker(
        &mut self,
        gesture: &DropGesture,
        locator: &(dyn TargetLocator + Sync),
    ) -> Result<DropOutcome, PlanningError> {
        self.pending_choice = None;

        let projected = self.ledger.apply_to(&self.base);
        let resolution = match resolve_drop(gesture, locator, &projected) {
            Ok(resolution) => resolution,
            Err(e) => return Err(self.reject(e)),
        };

        match resolution {
            DropResolution::Resolved { shift_id, by } => {
                tracing::debug!(shift_id, worker_id = gesture.worker_id, ?by, "Drop resolved");
                self.commit_assignment(shift_id, gesture.worker_id, by).await
            }
            DropResolution::Ambiguous(candidates) => {
                tracing::debug!(
                    date = %gesture.date,
                    candidates = candidates.len(),
                    "Drop needs disambiguation"
                );
                self.notifier.publish(Notification::info(format!(
                    "{} gardes le {} : choisissez celle à attribuer",
                    candidates.len(),
                    gesture.date.format("%d/%m/%Y")
                )));
                self.pending_choice = Some(PendingChoice {
                    worker_id: gesture.worker_id,
                    date: gesture.date,
                    candidates: candidates.clone(),
                });
                Ok(DropOutcome::NeedsChoice(candidates))
            }
        }
    }

    /// Complete an ambiguous drop with the user's pick.
    ///
    /// A pick outside the offered candidates is rejected and the choice
    /// stays open.
    pub async fn choose_candidate(&mut self, shift_id: ShiftId) -> Result<DropOutcome, PlanningError> {
        let (picked, worker_id) = match &self.pending_choice {
            Some(choice) => (choice.choose(shift_id), choice.worker_id),
            None => return Err(self.reject(UserInputError::NoPendingChoice)),
        };
        let shift_id = match picked {
            Ok(id) => id,
            Err(e) => return Err(self.reject(e)),
        };
        self.pending_choice = None;
        self.commit_assignment(shift_id, worker_id, ResolvedBy::UserChoice)
            .await
    }

    /// Abandon an ambiguous drop. Returns whether one was open.
    pub fn cancel_choice(&mut self) -> bool {
        self.pending_choice.take().is_some()
    }

    async fn commit_assignment(
        &mut self,
        shift_id: ShiftId,
        worker_id: DbId,
        by: ResolvedBy,
    ) -> Result<DropOutcome, PlanningError> {
        match self.config.assign_mode {
            AssignMode::Buffered => {
                self.add_change(shift_id, ChangePayload::Assign {
                    worker_id: Some(worker_id),
                })?;
                Ok(DropOutcome::Buffered { shift_id, by })
            }
            AssignMode::Immediate => {
                let warnings = self.assign_now(shift_id, Some(worker_id)).await?;
                Ok(DropOutcome::Committed { shift_id, warnings })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Buffered edits
    // -----------------------------------------------------------------------

    /// Buffer a change for a shift of the visible window, replacing any
    /// earlier change for it, and re-project the view.
    ///
    /// Returns the change that was replaced.
    pub fn add_change(
        &mut self,
        target_id: ShiftId,
        payload: ChangePayload,
    ) -> Result<Option<PendingChange>, PlanningError> {
        let Some(shift) = self.base.shift(target_id) else {
            return Err(self.reject(UserInputError::UnknownShift(target_id)));
        };

        let mut months: Vec<NaiveDateTime> = shift.start_at.into_iter().chain(shift.end_at).collect();
        if let ChangePayload::Update(update) = &payload {
            months.push(update.start_at());
            months.push(update.end_at());
        }
        self.touched
            .extend(months.into_iter().map(|dt| MonthKey::from_date(dt.date())));

        let kind = payload.kind();
        let replaced = self.ledger.add(target_id, payload, self.clock.now());
        tracing::debug!(
            shift_id = target_id,
            kind = kind.as_str(),
            replaced = replaced.is_some(),
            pending = self.ledger.len(),
            "Change buffered"
        );
        self.rebuild_view();
        Ok(replaced)
    }

    /// Buffer a new interval (and optionally location) for a shift.
    pub fn update_shift(
        &mut self,
        target_id: ShiftId,
        start_at: NaiveDateTime,
        end_at: NaiveDateTime,
        location_id: Option<DbId>,
    ) -> Result<Option<PendingChange>, PlanningError> {
        let update = match ShiftUpdate::new(start_at, end_at, location_id) {
            Ok(update) => update,
            Err(e) => return Err(self.reject(e)),
        };
        self.add_change(target_id, ChangePayload::Update(update))
    }

    pub fn unassign_shift(&mut self, target_id: ShiftId) -> Result<Option<PendingChange>, PlanningError> {
        self.add_change(target_id, ChangePayload::Assign { worker_id: None })
    }

    /// Buffer a delete. The shift disappears from the view until the
    /// change is saved or discarded.
    pub fn delete_shift(&mut self, target_id: ShiftId) -> Result<Option<PendingChange>, PlanningError> {
        self.add_change(target_id, ChangePayload::Delete)
    }

    pub fn is_dirty(&self) -> bool {
        self.ledger.is_dirty()
    }

    pub fn navigation_guard(&self) -> NavigationGuard {
        if self.ledger.is_dirty() {
            NavigationGuard::Confirm {
                pending: self.ledger.len(),
            }
        } else {
            NavigationGuard::Allow
        }
    }

    /// Drop every buffered edit and show the server data again.
    ///
    /// Returns how many changes were discarded.
    pub fn discard_changes(&mut self) -> usize {
        let discarded = self.ledger.len();
        self.ledger.clear();
        self.touched.clear();
        self.rebuild_view();
        if discarded > 0 {
            tracing::info!(discarded, "Pending changes discarded");
        }
        discarded
    }

    // ---- internals shared with reconciliation ----

    pub(crate) fn epoch(&self, month: MonthKey) -> u64 {
        self.epochs.get(&month).copied().unwrap_or(0)
    }

    /// Replace the base data and rebuild the view.
    pub(crate) fn present(&mut self, month: MonthKey, base: MonthData) {
        if self.current != Some(month) && self.pending_choice.take().is_some() {
            tracing::debug!(month = %month, "Pending choice dropped on navigation");
        }
        self.current = Some(month);
        self.base = base;
        self.rebuild_view();
    }

    pub(crate) fn rebuild_view(&mut self) {
        let mut view = build_calendar(&self.ledger.apply_to(&self.base));
        view.mark_pending(&self.ledger);
        self.view = view;
    }

    /// Fetch a window from the server, bypassing the cache.
    pub(crate) async fn fetch_live(&self, month: MonthKey) -> Result<MonthData, PlanningError> {
        match self.gateway.fetch_window(month).await {
            Ok(data) => Ok(data),
            Err(e) => {
                let err = PlanningError::from(e);
                tracing::warn!(month = %month, error = %err, "Month fetch failed");
                self.notifier.publish(
                    Notification::error(format!("Impossible de charger le planning de {month} : {err}"))
                        .for_month(month),
                );
                Err(err)
            }
        }
    }

    /// Report a user mistake without changing anything.
    pub(crate) fn reject(&self, err: UserInputError) -> PlanningError {
        tracing::debug!(error = %err, "User input rejected");
        let notification = match err {
            UserInputError::NotACandidate(id) | UserInputError::UnknownShift(id) => {
                Notification::warning(err.to_string()).for_shift(id)
            }
            _ => Notification::warning(err.to_string()),
        };
        self.notifier.publish(notification);
        PlanningError::UserInput(err)
    }

    /// Start a background revalidation of `month`.
    ///
    /// At most one fetch per month is outstanding: a queued or running
    /// prefetch is adopted instead of starting a second request.
    fn spawn_revalidation(&mut self, month: MonthKey) -> bool {
        if self.in_flight.contains(&month) {
            self.syncing.insert(month);
            tracing::debug!(month = %month, "Prefetch in flight, adopted as revalidation");
            return true;
        }
        if !self.syncing.insert(month) {
            tracing::debug!(month = %month, "Revalidation already running");
            return false;
        }
        let gateway = self.gateway.clone();
        let reply = self.reply_slot(month, FetchOrigin::Revalidation);
        tokio::spawn(async move {
            let result = gateway.fetch_window(month).await.map_err(PlanningError::from);
            reply.send(result);
        });
        tracing::debug!(month = %month, "Revalidation started");
        true
    }

    fn reply_slot(&self, month: MonthKey, origin: FetchOrigin) -> CompletionSlot {
        CompletionSlot {
            tx: Some(self.completions_tx.clone()),
            month,
            origin,
            epoch: self.epoch(month),
        }
    }
}

// ---------------------------------------------------------------------------
// CompletionSlot
// ---------------------------------------------------------------------------

/// Reply handle moved into a background fetch.
///
/// Always reports exactly once: if the task is dropped before it sends
/// (scheduler stopped, queue cancelled, runtime shut down), the drop
/// reports [`PlanningError::Abandoned`] so the session releases the month.
struct CompletionSlot {
    tx: Option<mpsc::UnboundedSender<Completion>>,
    month: MonthKey,
    origin: FetchOrigin,
    epoch: u64,
}

impl CompletionSlot {
    fn send(mut self, result: Result<MonthData, PlanningError>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<MonthData, PlanningError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion {
                month: self.month,
                origin: self.origin,
                epoch: self.epoch,
                result,
            });
        }
    }
}

impl Drop for CompletionSlot {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!(month = %self.month, origin = ?self.origin, "Background fetch dropped");
            self.deliver(Err(PlanningError::Abandoned(self.month)));
        }
    }
}
