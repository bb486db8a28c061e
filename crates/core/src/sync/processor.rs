//! Sync processor: drains the queue against the remote store.
//!
//! State machine is `Idle -> Draining -> Idle`. A drain is entered on an
//! Offline->Online transition, on startup when the queue is non-empty, or on
//! an explicit request. A boolean guard collapses concurrent triggers into
//! the active drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::errors::Error;
use crate::events::{SyncEvent, SyncEventBus, SyncFailureKind};
use crate::sync::action::{ActionType, SyncAction};
use crate::sync::remote::{RemoteStoreAdapter, RemoteStoreError, SyncRetryClass};
use crate::sync::store::OfflineStore;

enum ApplyFailure {
    Remote(RemoteStoreError),
    Storage(Error),
}

pub struct SyncProcessor {
    store: Arc<dyn OfflineStore>,
    remote: Arc<dyn RemoteStoreAdapter>,
    monitor: Arc<ConnectivityMonitor>,
    events: SyncEventBus,
    draining: AtomicBool,
    auth_paused: AtomicBool,
}

impl SyncProcessor {
    pub fn new(
        store: Arc<dyn OfflineStore>,
        remote: Arc<dyn RemoteStoreAdapter>,
        monitor: Arc<ConnectivityMonitor>,
        events: SyncEventBus,
    ) -> Self {
        Self {
            store,
            remote,
            monitor,
            events,
            draining: AtomicBool::new(false),
            auth_paused: AtomicBool::new(false),
        }
    }

    pub fn events(&self) -> &SyncEventBus {
        &self.events
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// True when a prior drain hit an auth failure and is waiting for
    /// [`Self::resume_after_reauth`].
    pub fn is_auth_paused(&self) -> bool {
        self.auth_paused.load(Ordering::SeqCst)
    }

    /// Manual retry trigger.
    pub fn request_drain(self: &Arc<Self>) {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            processor.drain().await;
        });
    }

    /// Clears the auth pause and resumes from the same queue position.
    pub async fn resume_after_reauth(&self) {
        self.auth_paused.store(false, Ordering::SeqCst);
        self.drain().await;
    }

    /// Spawns the trigger loop: one startup drain if work is pending, then a
    /// drain on every Offline->Online transition.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            // Subscribe and capture the baseline before the startup drain, so
            // an Offline->Online transition that lands while that drain is
            // running still registers as an edge.
            let mut rx = processor.monitor.subscribe();
            let mut was_online = rx.borrow_and_update().online;

            match processor.store.list() {
                Ok(pending) if !pending.is_empty() => {
                    log::info!(
                        "[Sync] {} pending action(s) at startup",
                        pending.len()
                    );
                    processor.drain().await;
                }
                Ok(_) => {}
                Err(err) => log::warn!("[Sync] Failed to inspect queue at startup: {}", err),
            }

            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let online = rx.borrow_and_update().online;
                if online && !was_online {
                    processor.drain().await;
                }
                was_online = online;
            }
        })
    }

    /// Runs one drain. A no-op when a drain is already active, when the
    /// monitor reports offline, or while paused for re-authentication.
    pub async fn drain(&self) {
        if self.auth_paused.load(Ordering::SeqCst) {
            log::debug!("[Sync] Drain skipped: awaiting re-authentication");
            return;
        }
        if self.draining.swap(true, Ordering::SeqCst) {
            log::debug!("[Sync] Drain already in progress");
            return;
        }
        self.drain_queue().await;
        self.draining.store(false, Ordering::SeqCst);
    }

    async fn drain_queue(&self) {
        let mut applied = 0usize;
        let mut connectivity = self.monitor.subscribe();

        loop {
            if !self.monitor.is_online() {
                log::debug!("[Sync] Drain stopped: offline ({} applied)", applied);
                return;
            }

            let next = match self.store.peek_next() {
                Ok(next) => next,
                Err(err) => {
                    self.emit_storage_error(err, None);
                    return;
                }
            };
            let Some(action) = next else {
                log::info!("[Sync] Drain complete ({} applied)", applied);
                self.events.emit(SyncEvent::Complete { applied });
                return;
            };

            match self.apply_action(&action, &mut connectivity).await {
                Ok(()) => applied += 1,
                Err(ApplyFailure::Storage(err)) => {
                    self.emit_storage_error(err, Some(action.sequence_id));
                    return;
                }
                Err(ApplyFailure::Remote(err)) => match err.retry_class() {
                    SyncRetryClass::Retryable => {
                        log::warn!(
                            "[Sync] Transient failure on seq {}: {}. Halting drain.",
                            action.sequence_id,
                            err
                        );
                        self.events.emit(SyncEvent::Error {
                            kind: SyncFailureKind::Network,
                            message: err.to_string(),
                            sequence_id: Some(action.sequence_id),
                        });
                        return;
                    }
                    SyncRetryClass::ReauthRequired => {
                        log::warn!(
                            "[Sync] Auth failure on seq {}: {}. Pausing until re-auth.",
                            action.sequence_id,
                            err
                        );
                        self.auth_paused.store(true, Ordering::SeqCst);
                        self.events.emit(SyncEvent::Error {
                            kind: SyncFailureKind::Auth,
                            message: err.to_string(),
                            sequence_id: Some(action.sequence_id),
                        });
                        return;
                    }
                    SyncRetryClass::Permanent => {
                        log::warn!(
                            "[Sync] Permanent rejection on seq {}: {}. Abandoning action.",
                            action.sequence_id,
                            err
                        );
                        if let Err(storage_err) = self.abandon_action(&action).await {
                            self.emit_storage_error(storage_err, Some(action.sequence_id));
                            return;
                        }
                        self.events.emit(SyncEvent::Error {
                            kind: err.failure_kind(),
                            message: err.to_string(),
                            sequence_id: Some(action.sequence_id),
                        });
                    }
                },
            }
        }
    }

    /// Dispatches one action to the remote store, then reconciles the local
    /// mirror and removes the action. Going offline mid-call cancels the
    /// dispatch; the action stays queued (at-least-once, never partial).
    async fn apply_action(
        &self,
        action: &SyncAction,
        connectivity: &mut watch::Receiver<ConnectivityState>,
    ) -> Result<(), ApplyFailure> {
        let record_id = action
            .record_id()
            .map(str::to_string)
            .ok_or_else(|| {
                ApplyFailure::Remote(RemoteStoreError::Validation(
                    "action payload carries no id".to_string(),
                ))
            })?;

        let dispatch = async {
            match action.action_type {
                ActionType::Insert => self
                    .remote
                    .insert(action.table, &action.payload)
                    .await
                    .map(|_remote_id| ()),
                ActionType::Update => {
                    self.remote
                        .update(action.table, &record_id, &action.payload)
                        .await
                }
                ActionType::Delete => self.remote.delete(action.table, &record_id).await,
            }
        };

        let result = tokio::select! {
            result = dispatch => result,
            _ = wait_for_offline(connectivity) => Err(RemoteStoreError::Network(
                "connection lost mid-drain".to_string(),
            )),
        };
        result.map_err(ApplyFailure::Remote)?;

        match action.action_type {
            ActionType::Delete => self
                .store
                .delete(action.table, &record_id)
                .await
                .map_err(ApplyFailure::Storage)?,
            ActionType::Insert | ActionType::Update => self
                .store
                .mark_synced(action.table, &record_id)
                .await
                .map_err(ApplyFailure::Storage)?,
        }
        self.store
            .remove(action.sequence_id)
            .await
            .map_err(ApplyFailure::Storage)?;

        log::debug!(
            "[Sync] Applied seq {} ({:?} {})",
            action.sequence_id,
            action.action_type,
            action.table.as_str()
        );
        Ok(())
    }

    /// Permanent failure: flag the record and drop only this action so it
    /// cannot block unrelated later work. A rejected delete has no surviving
    /// cache row to flag; the broadcast error event is its only signal.
    async fn abandon_action(&self, action: &SyncAction) -> Result<(), Error> {
        if action.action_type != ActionType::Delete {
            if let Some(id) = action.record_id() {
                self.store.flag_sync_error(action.table, id).await?;
            }
        }
        self.store.remove(action.sequence_id).await
    }

    fn emit_storage_error(&self, err: Error, sequence_id: Option<i64>) {
        log::error!("[Sync] Local persistence failure during drain: {}", err);
        self.events.emit(SyncEvent::Error {
            kind: SyncFailureKind::Storage,
            message: err.to_string(),
            sequence_id,
        });
    }
}

async fn wait_for_offline(rx: &mut watch::Receiver<ConnectivityState>) {
    loop {
        if !rx.borrow_and_update().online {
            return;
        }
        if rx.changed().await.is_err() {
            // Monitor dropped; nothing will ever report offline.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result as CoreResult;
    use crate::models::{CacheFilter, Food, MealLog, RecordPayload, SyncTable};
    use crate::sync::action::LocalMutation;
    use crate::sync::store::{CacheStore, SyncQueue};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    #[derive(Debug, Clone)]
    struct StoredRecord {
        payload: serde_json::Value,
        synced: bool,
        sync_error: bool,
    }

    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<HashMap<(SyncTable, String), StoredRecord>>,
        queue: Mutex<Vec<SyncAction>>,
        next_seq: Mutex<i64>,
    }

    impl MemoryStore {
        fn record(&self, table: SyncTable, id: &str) -> Option<StoredRecord> {
            self.records
                .lock()
                .unwrap()
                .get(&(table, id.to_string()))
                .cloned()
        }

        fn queue_len(&self) -> usize {
            self.queue.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CacheStore for MemoryStore {
        fn get(&self, table: SyncTable, id: &str) -> CoreResult<Option<RecordPayload>> {
            self.record(table, id)
                .map(|stored| RecordPayload::from_table_json(table, stored.payload))
                .transpose()
        }

        fn query(&self, filter: &CacheFilter) -> CoreResult<Vec<RecordPayload>> {
            let table = filter.table();
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|((t, _), _)| *t == table)
                .map(|(_, stored)| RecordPayload::from_table_json(table, stored.payload.clone()))
                .collect()
        }

        async fn put(&self, record: RecordPayload, synced: bool) -> CoreResult<()> {
            record.validate()?;
            let table = record.table();
            let id = record.id().to_string();
            self.records.lock().unwrap().insert(
                (table, id),
                StoredRecord {
                    payload: record.to_json()?,
                    synced,
                    sync_error: false,
                },
            );
            Ok(())
        }

        async fn bulk_put(&self, records: Vec<RecordPayload>) -> CoreResult<()> {
            for record in records {
                self.put(record, true).await?;
            }
            Ok(())
        }

        async fn delete(&self, table: SyncTable, id: &str) -> CoreResult<()> {
            self.records.lock().unwrap().remove(&(table, id.to_string()));
            Ok(())
        }

        async fn mark_synced(&self, table: SyncTable, id: &str) -> CoreResult<()> {
            if let Some(stored) = self
                .records
                .lock()
                .unwrap()
                .get_mut(&(table, id.to_string()))
            {
                stored.synced = true;
            }
            Ok(())
        }

        async fn flag_sync_error(&self, table: SyncTable, id: &str) -> CoreResult<()> {
            if let Some(stored) = self
                .records
                .lock()
                .unwrap()
                .get_mut(&(table, id.to_string()))
            {
                stored.sync_error = true;
            }
            Ok(())
        }

        async fn clear(&self) -> CoreResult<()> {
            self.records.lock().unwrap().clear();
            self.queue.lock().unwrap().clear();
            Ok(())
        }
    }

    #[async_trait]
    impl SyncQueue for MemoryStore {
        async fn enqueue(&self, mutation: LocalMutation) -> CoreResult<i64> {
            mutation.payload.validate()?;
            let mut next_seq = self.next_seq.lock().unwrap();
            *next_seq += 1;
            let sequence_id = *next_seq;
            self.queue.lock().unwrap().push(SyncAction {
                sequence_id,
                table: mutation.table(),
                action_type: mutation.action_type,
                payload: mutation.payload.to_json()?,
                created_at: chrono::Utc::now().to_rfc3339(),
            });
            Ok(sequence_id)
        }

        fn peek_next(&self) -> CoreResult<Option<SyncAction>> {
            Ok(self.queue.lock().unwrap().first().cloned())
        }

        async fn remove(&self, sequence_id: i64) -> CoreResult<()> {
            self.queue
                .lock()
                .unwrap()
                .retain(|action| action.sequence_id != sequence_id);
            Ok(())
        }

        fn list(&self) -> CoreResult<Vec<SyncAction>> {
            Ok(self.queue.lock().unwrap().clone())
        }
    }

    #[async_trait]
    impl OfflineStore for MemoryStore {
        async fn record_local_mutation(&self, mutation: LocalMutation) -> CoreResult<i64> {
            match mutation.action_type {
                ActionType::Delete => {
                    self.delete(mutation.table(), mutation.payload.id()).await?;
                }
                ActionType::Insert | ActionType::Update => {
                    self.put(mutation.payload.clone(), false).await?;
                }
            }
            self.enqueue(mutation).await
        }
    }

    /// Remote fake: truth is a map keyed by (table, id); inserts upsert by id
    /// (mirrors the backend's merge-duplicates behavior). Responses can be
    /// scripted per call; an exhausted script means success. A held call
    /// parks forever so tests can cancel it by going offline.
    #[derive(Default)]
    struct MockRemote {
        state: Mutex<HashMap<(SyncTable, String), serde_json::Value>>,
        responses: Mutex<VecDeque<Result<(), RemoteStoreError>>>,
        calls: Mutex<Vec<String>>,
        hold_next: AtomicBool,
    }

    impl MockRemote {
        fn script(&self, responses: Vec<Result<(), RemoteStoreError>>) {
            *self.responses.lock().unwrap() = responses.into();
        }

        fn hold_next_call(&self) {
            self.hold_next.store(true, Ordering::SeqCst);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn remote_record(&self, table: SyncTable, id: &str) -> Option<serde_json::Value> {
            self.state
                .lock()
                .unwrap()
                .get(&(table, id.to_string()))
                .cloned()
        }

        fn remote_count(&self, table: SyncTable) -> usize {
            self.state
                .lock()
                .unwrap()
                .keys()
                .filter(|(t, _)| *t == table)
                .count()
        }

        async fn respond(&self, call: String) -> Result<(), RemoteStoreError> {
            if self.hold_next.swap(false, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.calls.lock().unwrap().push(call);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    #[async_trait]
    impl RemoteStoreAdapter for MockRemote {
        async fn insert(
            &self,
            table: SyncTable,
            payload: &serde_json::Value,
        ) -> Result<String, RemoteStoreError> {
            let id = payload
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            self.respond(format!("insert:{}:{}", table.as_str(), id))
                .await?;
            self.state
                .lock()
                .unwrap()
                .insert((table, id.clone()), payload.clone());
            Ok(id)
        }

        async fn update(
            &self,
            table: SyncTable,
            id: &str,
            payload: &serde_json::Value,
        ) -> Result<(), RemoteStoreError> {
            self.respond(format!("update:{}:{}", table.as_str(), id))
                .await?;
            self.state
                .lock()
                .unwrap()
                .insert((table, id.to_string()), payload.clone());
            Ok(())
        }

        async fn delete(&self, table: SyncTable, id: &str) -> Result<(), RemoteStoreError> {
            self.respond(format!("delete:{}:{}", table.as_str(), id))
                .await?;
            self.state.lock().unwrap().remove(&(table, id.to_string()));
            Ok(())
        }
    }

    fn meal_log(id: &str, calories: f64) -> RecordPayload {
        RecordPayload::MealLog(MealLog {
            id: id.to_string(),
            user_id: "u1".to_string(),
            meal_type: "lunch".to_string(),
            date: "2026-08-30".to_string(),
            food_items: serde_json::json!([]),
            total_calories: calories,
            total_protein: 10.0,
            total_carbs: 20.0,
            total_fat: 5.0,
            photo_url: None,
            notes: None,
            created_at: "2026-08-30T12:00:00Z".to_string(),
        })
    }

    fn food(id: &str, name: &str) -> RecordPayload {
        RecordPayload::Food(Food {
            id: id.to_string(),
            name: name.to_string(),
            name_en: None,
            calories_per_100g: 52.0,
            protein_per_100g: 0.3,
            carbs_per_100g: 14.0,
            fat_per_100g: 0.2,
            category: None,
        })
    }

    struct Harness {
        store: Arc<MemoryStore>,
        remote: Arc<MockRemote>,
        monitor: Arc<ConnectivityMonitor>,
        processor: Arc<SyncProcessor>,
    }

    async fn online_harness() -> Harness {
        let store = Arc::new(MemoryStore::default());
        let remote = Arc::new(MockRemote::default());
        let monitor = Arc::new(ConnectivityMonitor::new(Duration::from_millis(10)));
        let processor = Arc::new(SyncProcessor::new(
            store.clone(),
            remote.clone(),
            monitor.clone(),
            SyncEventBus::default(),
        ));
        let mut rx = monitor.subscribe();
        monitor.report_link_up();
        rx.changed().await.expect("online");
        Harness {
            store,
            remote,
            monitor,
            processor,
        }
    }

    fn drain_events(
        rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>,
    ) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn drains_in_fifo_order_across_tables() -> anyhow::Result<()> {
        let h = online_harness().await;
        let mut events = h.processor.events().subscribe();

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await?;
        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, food("f1", "elma")))
            .await?;
        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Update, meal_log("m1", 250.0)))
            .await?;

        h.processor.drain().await;

        assert_eq!(
            h.remote.calls(),
            vec![
                "insert:meal_logs:m1",
                "insert:foods:f1",
                "update:meal_logs:m1"
            ]
        );
        assert_eq!(h.store.queue_len(), 0);
        assert!(h.store.record(SyncTable::MealLogs, "m1").unwrap().synced);
        assert!(h.store.record(SyncTable::Foods, "f1").unwrap().synced);
        assert_eq!(
            drain_events(&mut events),
            vec![SyncEvent::Complete { applied: 3 }]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn offline_edits_replay_to_the_edited_state() {
        let h = online_harness().await;

        // Offline: add then edit the same record.
        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Update, meal_log("m1", 420.0)))
            .await
            .unwrap();

        h.processor.drain().await;

        let remote = h
            .remote
            .remote_record(SyncTable::MealLogs, "m1")
            .expect("remote record");
        assert_eq!(remote["total_calories"], 420.0);
        assert_eq!(h.remote.remote_count(SyncTable::MealLogs), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_halts_and_resume_replays_only_unacked() {
        let h = online_harness().await;
        let mut events = h.processor.events().subscribe();

        let seq1 = h
            .store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        let seq2 = h
            .store
            .record_local_mutation(LocalMutation::new(ActionType::Update, meal_log("m1", 420.0)))
            .await
            .unwrap();

        // insert succeeds, then the network drops before the update.
        h.remote.script(vec![
            Ok(()),
            Err(RemoteStoreError::Network("connection reset".to_string())),
        ]);
        h.processor.drain().await;

        let remaining = h.store.list().unwrap();
        assert_eq!(
            remaining.iter().map(|a| a.sequence_id).collect::<Vec<_>>(),
            vec![seq2]
        );
        assert!(seq1 < seq2);
        let events_after_halt = drain_events(&mut events);
        assert!(matches!(
            events_after_halt.as_slice(),
            [SyncEvent::Error {
                kind: SyncFailureKind::Network,
                ..
            }]
        ));

        // Reconnect: only the update is replayed, nothing is re-inserted.
        h.processor.drain().await;
        assert_eq!(h.store.queue_len(), 0);
        assert_eq!(
            h.remote.calls(),
            vec![
                "insert:meal_logs:m1",
                "update:meal_logs:m1",
                "update:meal_logs:m1"
            ]
        );
        let remote = h.remote.remote_record(SyncTable::MealLogs, "m1").unwrap();
        assert_eq!(remote["total_calories"], 420.0);
        assert_eq!(h.remote.remote_count(SyncTable::MealLogs), 1);
        assert_eq!(
            drain_events(&mut events),
            vec![SyncEvent::Complete { applied: 1 }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_abandoned_and_drain_continues() {
        let h = online_harness().await;
        let mut events = h.processor.events().subscribe();

        let seq1 = h
            .store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, food("f1", "elma")))
            .await
            .unwrap();

        h.remote.script(vec![Err(RemoteStoreError::Validation(
            "meal_type rejected".to_string(),
        ))]);
        h.processor.drain().await;

        // The offender is gone, the unrelated action went through.
        assert_eq!(h.store.queue_len(), 0);
        let flagged = h.store.record(SyncTable::MealLogs, "m1").unwrap();
        assert!(flagged.sync_error);
        assert!(!flagged.synced);
        assert!(h.store.record(SyncTable::Foods, "f1").unwrap().synced);
        assert!(h.remote.remote_record(SyncTable::MealLogs, "m1").is_none());

        let events = drain_events(&mut events);
        assert_eq!(
            events,
            vec![
                SyncEvent::Error {
                    kind: SyncFailureKind::Validation,
                    message: "Validation error: meal_type rejected".to_string(),
                    sequence_id: Some(seq1),
                },
                SyncEvent::Complete { applied: 1 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_pauses_draining_until_reauth() {
        let h = online_harness().await;
        let mut events = h.processor.events().subscribe();

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();

        h.remote.script(vec![Err(RemoteStoreError::Auth(
            "token expired".to_string(),
        ))]);
        h.processor.drain().await;

        assert!(h.processor.is_auth_paused());
        assert_eq!(h.store.queue_len(), 1);
        assert!(matches!(
            drain_events(&mut events).as_slice(),
            [SyncEvent::Error {
                kind: SyncFailureKind::Auth,
                ..
            }]
        ));

        // Triggers are no-ops while paused; the remote is not touched.
        let calls_before = h.remote.calls().len();
        h.processor.drain().await;
        assert_eq!(h.remote.calls().len(), calls_before);

        // Re-auth resumes from the same queue position.
        h.processor.resume_after_reauth().await;
        assert!(!h.processor.is_auth_paused());
        assert_eq!(h.store.queue_len(), 0);
        assert!(h
            .remote
            .remote_record(SyncTable::MealLogs, "m1")
            .is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_trigger_collapses_into_active_drain() {
        let h = online_harness().await;

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();

        h.remote.hold_next_call();
        let processor = h.processor.clone();
        let first = tokio::spawn(async move { processor.drain().await });
        tokio::task::yield_now().await;
        assert!(h.processor.is_draining());

        // Second trigger is a no-op while the first is parked in-flight.
        h.processor.drain().await;
        assert!(h.processor.is_draining());

        // Going offline cancels the parked call and ends the first drain.
        h.monitor.report_link_down();
        first.await.unwrap();
        assert!(!h.processor.is_draining());
        assert_eq!(h.store.queue_len(), 1);
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn going_offline_mid_drain_keeps_action_queued() {
        let h = online_harness().await;
        let mut events = h.processor.events().subscribe();

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();

        h.remote.hold_next_call();
        let processor = h.processor.clone();
        let drain = tokio::spawn(async move { processor.drain().await });
        tokio::task::yield_now().await;
        h.monitor.report_link_down();
        drain.await.unwrap();

        assert_eq!(h.store.queue_len(), 1);
        assert!(h.remote.remote_record(SyncTable::MealLogs, "m1").is_none());
        assert!(matches!(
            drain_events(&mut events).as_slice(),
            [SyncEvent::Error {
                kind: SyncFailureKind::Network,
                ..
            }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_action_removes_record_locally_and_remotely() {
        let h = online_harness().await;

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.processor.drain().await;
        assert!(h.remote.remote_record(SyncTable::MealLogs, "m1").is_some());

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Delete, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.processor.drain().await;

        assert!(h.remote.remote_record(SyncTable::MealLogs, "m1").is_none());
        assert!(h.store.record(SyncTable::MealLogs, "m1").is_none());
        assert_eq!(h.store.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn redelivered_insert_does_not_duplicate_the_entity() {
        let h = online_harness().await;

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.processor.drain().await;

        // Simulated duplicate delivery of the same insert.
        h.store
            .enqueue(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.processor.drain().await;

        assert_eq!(h.remote.remote_count(SyncTable::MealLogs), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_delete_is_abandoned_and_surfaced_by_event_only() {
        let h = online_harness().await;

        h.store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.processor.drain().await;

        let mut events = h.processor.events().subscribe();
        let seq = h
            .store
            .record_local_mutation(LocalMutation::new(ActionType::Delete, meal_log("m1", 100.0)))
            .await
            .unwrap();
        h.remote.script(vec![Err(RemoteStoreError::Validation(
            "row is referenced".to_string(),
        ))]);
        h.processor.drain().await;

        // The action is dropped; the local row was already removed by the
        // optimistic delete, so no flag target exists and the event is the
        // only signal. The remote keeps its copy.
        assert_eq!(h.store.queue_len(), 0);
        assert!(h.store.record(SyncTable::MealLogs, "m1").is_none());
        assert!(h.remote.remote_record(SyncTable::MealLogs, "m1").is_some());
        assert_eq!(
            drain_events(&mut events),
            vec![
                SyncEvent::Error {
                    kind: SyncFailureKind::Validation,
                    message: "Validation error: row is referenced".to_string(),
                    sequence_id: Some(seq),
                },
                SyncEvent::Complete { applied: 0 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn online_edge_racing_the_startup_drain_still_triggers() {
        let store = Arc::new(MemoryStore::default());
        let remote = Arc::new(MockRemote::default());
        let monitor = Arc::new(ConnectivityMonitor::new(Duration::from_millis(10)));
        let processor = Arc::new(SyncProcessor::new(
            store.clone(),
            remote.clone(),
            monitor.clone(),
            SyncEventBus::default(),
        ));
        let mut events = processor.events().subscribe();

        store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();

        // The link comes up before the trigger task has polled even once;
        // the offline baseline is captured ahead of the startup drain, so
        // the transition still reads as an edge.
        let _trigger_loop = processor.start();
        monitor.report_link_up();

        events.recv().await.expect("drain after racing transition");
        assert_eq!(store.queue_len(), 0);
        assert!(remote.remote_record(SyncTable::MealLogs, "m1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn online_transition_triggers_a_drain() {
        let store = Arc::new(MemoryStore::default());
        let remote = Arc::new(MockRemote::default());
        let monitor = Arc::new(ConnectivityMonitor::new(Duration::from_millis(10)));
        let processor = Arc::new(SyncProcessor::new(
            store.clone(),
            remote.clone(),
            monitor.clone(),
            SyncEventBus::default(),
        ));
        let mut events = processor.events().subscribe();

        store
            .record_local_mutation(LocalMutation::new(ActionType::Insert, meal_log("m1", 100.0)))
            .await
            .unwrap();

        let _trigger_loop = processor.start();
        tokio::task::yield_now().await;
        assert_eq!(store.queue_len(), 1);

        monitor.report_link_up();
        events.recv().await.expect("drain after online transition");
        assert_eq!(store.queue_len(), 0);
        assert!(remote.remote_record(SyncTable::MealLogs, "m1").is_some());
    }
}
