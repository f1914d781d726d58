#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use replay_core::app::{OfflineQueue, OfflineQueueBuilder, QueueConfig, QueueEvent};
use replay_core::domain::{EngineOp, ItemDraft, MutationIntent, SyncError};
use replay_core::impls::InMemoryKvStore;
use replay_core::ports::{Clock, Conflict, FixedClock, Resolution, SyncEngine};
use replay_core::queue::QueuedMutation;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 23, 17, 45, 0).unwrap()
}

/// Engine that answers from a script, then falls back to a default outcome.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<(), SyncError>>>,
    fallback: Mutex<Result<(), SyncError>>,
    precheck: Mutex<Option<Resolution>>,
    calls: Mutex<Vec<(EngineOp, Value)>>,
    resolutions: Mutex<usize>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(())),
            precheck: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            resolutions: Mutex::new(0),
        })
    }

    pub fn push(&self, outcome: Result<(), SyncError>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn fail_always(&self, error: SyncError) {
        *self.fallback.lock().unwrap() = Err(error);
    }

    /// Report a conflict on every pre-flight check and resolve it with
    /// `resolution`.
    pub fn conflict_on_check(&self, resolution: Resolution) {
        *self.precheck.lock().unwrap() = Some(resolution);
    }

    pub fn calls(&self) -> Vec<(EngineOp, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn resolutions(&self) -> usize {
        *self.resolutions.lock().unwrap()
    }

    fn answer(&self, op: EngineOp, payload: &Value) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push((op, payload.clone()));
        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl SyncEngine for ScriptedEngine {
    async fn create(&self, payload: &Value) -> Result<(), SyncError> {
        self.answer(EngineOp::Create, payload)
    }

    async fn update(&self, payload: &Value) -> Result<(), SyncError> {
        self.answer(EngineOp::Update, payload)
    }

    async fn delete(&self, payload: &Value) -> Result<(), SyncError> {
        self.answer(EngineOp::Delete, payload)
    }

    async fn check_conflict(&self, _mutation: &QueuedMutation) -> Result<Option<Conflict>, SyncError> {
        Ok(self
            .precheck
            .lock()
            .unwrap()
            .map(|_| Conflict::new("remote item changed")))
    }

    async fn resolve_conflict(
        &self,
        _mutation: &QueuedMutation,
        _conflict: Conflict,
    ) -> Result<Resolution, SyncError> {
        *self.resolutions.lock().unwrap() += 1;
        Ok(self.precheck.lock().unwrap().unwrap_or(Resolution::Proceed))
    }
}

/// A queue wired to a scripted engine, in-memory storage and a hand-driven
/// clock.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub storage: Arc<InMemoryKvStore>,
    pub engine: Arc<ScriptedEngine>,
    pub config: QueueConfig,
    pub queue: OfflineQueue,
    pub events: Arc<Mutex<Vec<QueueEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        let storage = Arc::new(InMemoryKvStore::new());
        let engine = ScriptedEngine::new();
        let queue = build(&config, &clock, &storage, &engine);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        // the subscription lives as long as the notifier
        let _subscription = queue
            .notifier()
            .subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        Self {
            clock,
            storage,
            engine,
            config,
            queue,
            events,
        }
    }

    /// A second queue over the same storage, as after an app restart.
    pub fn reopen(&self) -> OfflineQueue {
        build(&self.config, &self.clock, &self.storage, &self.engine)
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn permanent_failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, QueueEvent::MutationFailed(f) if f.permanent))
            .count()
    }

    pub fn successes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, QueueEvent::MutationSucceeded(_)))
            .count()
    }
}

fn build(
    config: &QueueConfig,
    clock: &Arc<FixedClock>,
    storage: &Arc<InMemoryKvStore>,
    engine: &Arc<ScriptedEngine>,
) -> OfflineQueue {
    OfflineQueueBuilder::new()
        .config(config.clone())
        .clock(clock.clone())
        .storage(storage.clone())
        .sync_engine(engine.clone())
        .build()
        .unwrap()
}

pub fn add(list_id: &str, name: &str) -> MutationIntent {
    MutationIntent::Add {
        list_id: list_id.into(),
        item: ItemDraft::new(name),
    }
}

pub fn update(item_id: &str, changes: Value) -> MutationIntent {
    MutationIntent::Update {
        item_id: item_id.into(),
        list_id: None,
        changes,
    }
}

pub fn mark_gotten(item_id: &str) -> MutationIntent {
    MutationIntent::MarkGotten {
        item_id: item_id.into(),
        gotten: true,
    }
}

pub fn delete(item_id: &str) -> MutationIntent {
    MutationIntent::Delete {
        item_id: item_id.into(),
    }
}

pub fn server_error() -> SyncError {
    SyncError::from_status(503, "service unavailable")
}
