#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use gardes_client::{AdminOperation, BackendError, PlanningBackend};
use gardes_core::batch::{BatchChange, BatchResponse, BatchWarning};
use gardes_core::ledger::ChangeKind;
use gardes_core::models::{MonthData, ShiftAssignment, ShiftStatus, ShiftType};
use gardes_core::{DbId, MonthKey, ShiftId};
use gardes_engine::{
    EngineConfig, ManualClock, MemoryStore, PlanningSession, SessionParts, Task, TaskScheduler,
};
use gardes_events::{Notification, NotificationBus, NotificationLevel};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// In-memory planning backend recording every call.
#[derive(Default)]
pub struct MockBackend {
    months: Mutex<HashMap<MonthKey, MonthData>>,
    pub month_calls: Mutex<Vec<MonthKey>>,
    pub batches: Mutex<Vec<Vec<BatchChange>>>,
    pub assigns: Mutex<Vec<(ShiftId, Option<DbId>)>>,
    pub admin_calls: Mutex<Vec<AdminOperation>>,
    fetch_failure: Mutex<Option<BackendError>>,
    write_failure: Mutex<Option<BackendError>>,
    batch_warnings: Mutex<Vec<BatchWarning>>,
}

impl MockBackend {
    pub fn set_month(&self, month: MonthKey, data: MonthData) {
        self.months.lock().unwrap().insert(month, data);
    }

    pub fn fail_fetches(&self, err: Option<BackendError>) {
        *self.fetch_failure.lock().unwrap() = err;
    }

    pub fn fail_writes(&self, err: Option<BackendError>) {
        *self.write_failure.lock().unwrap() = err;
    }

    pub fn warn_on_batch(&self, warnings: Vec<BatchWarning>) {
        *self.batch_warnings.lock().unwrap() = warnings;
    }

    pub fn month_call_count(&self) -> usize {
        self.month_calls.lock().unwrap().len()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    fn write_result(&self) -> Result<(), BackendError> {
        match self.write_failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlanningBackend for MockBackend {
    async fn month_data(&self, month: MonthKey) -> Result<MonthData, BackendError> {
        self.month_calls.lock().unwrap().push(month);
        if let Some(err) = self.fetch_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self
            .months
            .lock()
            .unwrap()
            .get(&month)
            .cloned()
            .unwrap_or_default())
    }

    async fn assign(
        &self,
        shift_id: ShiftId,
        worker_id: Option<DbId>,
    ) -> Result<BatchResponse, BackendError> {
        self.assigns.lock().unwrap().push((shift_id, worker_id));
        self.write_result()?;
        Ok(BatchResponse {
            updated: 1,
            ..Default::default()
        })
    }

    async fn batch_update(&self, changes: &[BatchChange]) -> Result<BatchResponse, BackendError> {
        self.batches.lock().unwrap().push(changes.to_vec());
        self.write_result()?;
        Ok(BatchResponse {
            warnings: self.batch_warnings.lock().unwrap().clone(),
            created: 0,
            updated: changes.iter().filter(|c| c.kind != ChangeKind::Delete).count() as u64,
            deleted: changes.iter().filter(|c| c.kind == ChangeKind::Delete).count() as u64,
        })
    }

    async fn run_admin(
        &self,
        operation: &AdminOperation,
    ) -> Result<serde_json::Value, BackendError> {
        self.admin_calls.lock().unwrap().push(*operation);
        self.write_result()?;
        Ok(serde_json::json!({ "operation": operation.name() }))
    }
}

// ---------------------------------------------------------------------------
// Manual scheduler
// ---------------------------------------------------------------------------

/// Holds scheduled tasks until the test runs them.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<Task>>,
}

impl ManualScheduler {
    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Run every queued task to completion, in order.
    pub async fn run_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        let count = tasks.len();
        for task in tasks {
            task.await;
        }
        count
    }

    /// Drop every queued task without running it.
    pub fn drop_all(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
        tasks.len()
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, task: Task) {
        self.tasks.lock().unwrap().push(task);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub scheduler: Arc<ManualScheduler>,
    pub clock: Arc<ManualClock>,
    pub session: PlanningSession<MockBackend>,
    pub notifications: broadcast::Receiver<Notification>,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: EngineConfig, store: MemoryStore) -> Self {
        let backend = Arc::new(MockBackend::default());
        let scheduler = Arc::new(ManualScheduler::default());
        let clock = Arc::new(ManualClock::default());
        let notifier = NotificationBus::default();
        let notifications = notifier.subscribe();
        let parts = SessionParts {
            store: Box::new(store),
            clock: clock.clone(),
            scheduler: scheduler.clone(),
            notifier,
        };
        let session = PlanningSession::new(config, backend.clone(), parts);
        Self {
            backend,
            scheduler,
            clock,
            session,
            notifications,
        }
    }

    /// Every notification published so far.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }

    pub fn notifications_at(&mut self, level: NotificationLevel) -> Vec<Notification> {
        self.drain_notifications()
            .into_iter()
            .filter(|n| n.level == level)
            .collect()
    }
}

/// Default config with prefetch off, so tests only see the requests they
/// trigger.
pub fn quiet_config() -> EngineConfig {
    EngineConfig {
        prefetch: false,
        ..EngineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn month(year: i32, month: u32) -> MonthKey {
    MonthKey::new(year, month).unwrap()
}

pub fn march() -> MonthKey {
    month(2024, 3)
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
}

pub fn shift(id: ShiftId, start: &str, end: &str, location_id: Option<DbId>) -> ShiftAssignment {
    ShiftAssignment {
        id,
        start_at: Some(dt(start)),
        end_at: Some(dt(end)),
        shift_type: ShiftType::MainShift24h,
        status: ShiftStatus::Draft,
        assigned_worker_id: None,
        location_id,
        segment: None,
    }
}

/// March 2024: one shift on the 1st, two overlapping shifts on the 5th and
/// a 48h shift on the 10th.
pub fn march_data() -> MonthData {
    MonthData {
        shifts: vec![
            shift(1, "2024-03-01T07:00", "2024-03-02T07:00", Some(1)),
            shift(2, "2024-03-05T07:00", "2024-03-06T07:00", Some(1)),
            shift(3, "2024-03-05T08:00", "2024-03-06T08:00", Some(2)),
            shift(4, "2024-03-10T07:00", "2024-03-12T07:00", Some(1)),
        ],
        ..Default::default()
    }
}
