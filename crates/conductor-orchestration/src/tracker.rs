//! # Process Tracker (C8)
//!
//! The authoritative in-memory graph of every process descending from an
//! agent root. Mutations happen under a single lock; event emission always
//! happens after that lock is released so a subscriber callback can never
//! re-enter the tracker mid-mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use conductor_domain::{
    ProcessEvent, ProcessEventStore, ProcessEventType, ProcessFilter, ProcessNode, ProcessStatus,
};
use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

pub use conductor_domain::{GraphEdge, GraphNode, ProcessGraphData, TrackerStats};

struct TrackerState {
    processes: HashMap<String, ProcessNode>,
    children: HashMap<String, Vec<String>>,
    pid_to_id: HashMap<u32, String>,
    subscribers: HashMap<String, mpsc::Sender<ProcessEvent>>,
}

impl TrackerState {
    fn new() -> Self {
        Self {
            processes: HashMap::new(),
            children: HashMap::new(),
            pid_to_id: HashMap::new(),
            subscribers: HashMap::new(),
        }
    }

    fn insert(&mut self, node: ProcessNode) {
        self.pid_to_id.insert(node.pid, node.id.clone());
        if let Some(parent_id) = &node.parent_id {
            self.children.entry(parent_id.clone()).or_default().push(node.id.clone());
        }
        self.processes.insert(node.id.clone(), node);
    }
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    event_store: Option<Arc<dyn ProcessEventStore>>,
    tick: Duration,
    subscriber_capacity: usize,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
}

/// Cheap-to-clone handle; the background reconciliation loop holds its own
/// clone so it outlives the call that spawned it.
#[derive(Clone)]
pub struct ProcessTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for ProcessTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessTracker").finish_non_exhaustive()
    }
}

impl ProcessTracker {
    pub fn new(
        event_store: Option<Arc<dyn ProcessEventStore>>,
        tick: Duration,
        subscriber_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::new()),
                event_store,
                tick,
                subscriber_capacity,
                stop_tx: Mutex::new(None),
            }),
        }
    }

    /// Assigns `id` if empty, defaults `status=starting`/`started_at=now`,
    /// inserts into all indices, persists, and emits a `started` event.
    #[instrument(skip(self, node), fields(pid = node.pid))]
    pub async fn register(&self, mut node: ProcessNode) -> OrchestrationResult<ProcessNode> {
        if node.id.is_empty() {
            node.id = format!("proc-{}", conductor_shared::ids::short_random_token());
        }
        node.status = ProcessStatus::Starting;
        node.started_at = Utc::now();

        {
            let mut state = self.inner.state.lock();
            state.insert(node.clone());
        }

        if let Some(store) = &self.inner.event_store {
            store.put_node(node.clone()).await?;
        }

        let event = ProcessEvent {
            event_type: ProcessEventType::Started,
            old_status: None,
            new_status: node.status,
            exit_code: None,
            process_id: node.id.clone(),
            pid: node.pid,
            task_id: node.task_id,
            instance_id: node.instance_id.clone(),
            timestamp: Utc::now(),
        };
        self.emit(&node.id, event.clone()).await?;

        debug!(id = %node.id, "process registered");
        Ok(node)
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: &str,
        new_status: ProcessStatus,
        exit_code: Option<i32>,
    ) -> OrchestrationResult<ProcessNode> {
        let (updated, old_status) = {
            let mut state = self.inner.state.lock();
            let node = state
                .processes
                .get_mut(id)
                .ok_or_else(|| OrchestrationError::ProcessNotFound(id.to_string()))?;
            let old_status = node.status;
            node.status = new_status;
            node.exit_code = exit_code.or(node.exit_code);
            if new_status.is_terminal() {
                node.ended_at = Some(Utc::now());
            }
            (node.clone(), old_status)
        };

        if let Some(store) = &self.inner.event_store {
            store.update_node(updated.clone()).await?;
        }

        let event = ProcessEvent {
            event_type: ProcessEventType::StatusChange,
            old_status: Some(old_status),
            new_status,
            exit_code,
            process_id: updated.id.clone(),
            pid: updated.pid,
            task_id: updated.task_id,
            instance_id: updated.instance_id.clone(),
            timestamp: Utc::now(),
        };
        self.emit(&updated.id, event).await?;

        if new_status.is_terminal() {
            let ended = ProcessEvent {
                event_type: ProcessEventType::Ended,
                old_status: Some(old_status),
                new_status,
                exit_code,
                process_id: updated.id.clone(),
                pid: updated.pid,
                task_id: updated.task_id,
                instance_id: updated.instance_id.clone(),
                timestamp: Utc::now(),
            };
            self.emit(&updated.id, ended).await?;
        }

        Ok(updated)
    }

    pub async fn update_by_pid(
        &self,
        pid: u32,
        new_status: ProcessStatus,
        exit_code: Option<i32>,
    ) -> OrchestrationResult<ProcessNode> {
        let id = {
            let state = self.inner.state.lock();
            state
                .pid_to_id
                .get(&pid)
                .cloned()
                .ok_or_else(|| OrchestrationError::ProcessNotFound(format!("pid {pid}")))?
        };
        self.update_status(&id, new_status, exit_code).await
    }

    pub async fn get(&self, id: &str) -> OrchestrationResult<Option<ProcessNode>> {
        if let Some(node) = self.inner.state.lock().processes.get(id).cloned() {
            return Ok(Some(node));
        }
        match &self.inner.event_store {
            Some(store) => Ok(store.get_node(id).await?),
            None => Ok(None),
        }
    }

    pub async fn get_by_pid(&self, pid: u32) -> OrchestrationResult<Option<ProcessNode>> {
        let in_memory = {
            let state = self.inner.state.lock();
            state
                .pid_to_id
                .get(&pid)
                .and_then(|id| state.processes.get(id))
                .cloned()
        };
        if in_memory.is_some() {
            return Ok(in_memory);
        }
        match &self.inner.event_store {
            Some(store) => Ok(store.get_node_by_pid(pid).await?),
            None => Ok(None),
        }
    }

    /// Merges in-memory with persisted rows, deduplicating by id (in-memory wins).
    pub async fn list(&self, filter: &ProcessFilter) -> OrchestrationResult<Vec<ProcessNode>> {
        let in_memory: HashMap<String, ProcessNode> = {
            let state = self.inner.state.lock();
            state
                .processes
                .values()
                .filter(|n| filter.matches(n))
                .map(|n| (n.id.clone(), n.clone()))
                .collect()
        };

        let mut merged = in_memory.clone();
        if let Some(store) = &self.inner.event_store {
            for node in store.list(filter).await? {
                merged.entry(node.id.clone()).or_insert(node);
            }
        }

        Ok(merged.into_values().collect())
    }

    /// Cycles cannot exist: parent ids are set exactly once, at insert.
    pub fn tree(&self, root_id: &str) -> Vec<ProcessNode> {
        let state = self.inner.state.lock();
        let mut result = Vec::new();
        let mut stack = vec![root_id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(node) = state.processes.get(&id) {
                result.push(node.clone());
                if let Some(children) = state.children.get(&id) {
                    stack.extend(children.iter().cloned());
                }
            }
        }
        result
    }

    pub fn snapshot_stats(&self) -> TrackerStats {
        let state = self.inner.state.lock();
        TrackerStats::build(state.processes.values())
    }

    /// Merges in-memory with persisted rows first, the same way `list()`
    /// does, so a tracker backed by a real store reports the same set of
    /// processes here as it does through `list()`.
    pub async fn graph(&self, filter: &ProcessFilter) -> OrchestrationResult<ProcessGraphData> {
        let merged = self.list(filter).await?;
        Ok(ProcessGraphData::build(merged.iter()))
    }

    pub fn active(&self) -> Vec<ProcessNode> {
        let state = self.inner.state.lock();
        state
            .processes
            .values()
            .filter(|n| matches!(n.status, ProcessStatus::Starting | ProcessStatus::Running))
            .cloned()
            .collect()
    }

    /// Multiple subscribers; a full buffer (capacity from `self.inner.subscriber_capacity`)
    /// discards that subscriber's event only.
    pub fn subscribe(&self, subscriber_id: impl Into<String>) -> ReceiverStream<ProcessEvent> {
        let (tx, rx) = mpsc::channel(self.inner.subscriber_capacity);
        self.inner.state.lock().subscribers.insert(subscriber_id.into(), tx);
        ReceiverStream::new(rx)
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        self.inner.state.lock().subscribers.remove(subscriber_id);
    }

    /// Enumerates OS children of `parent_pid`; newly discovered children are
    /// registered with `is_agent_root=false` and attribution inherited from
    /// the parent, recursing into each.
    pub async fn discover_children(
        &self,
        parent_pid: u32,
        task_id: Uuid,
        instance_id: &str,
        agent_type: &str,
    ) -> OrchestrationResult<Vec<ProcessNode>> {
        let parent = match self.get_by_pid(parent_pid).await? {
            Some(node) => node,
            None => {
                warn!(parent_pid, "discover_children called for unknown parent");
                return Ok(Vec::new());
            }
        };

        let mut sys = System::new_all();
        sys.refresh_all();

        let known_pids: std::collections::HashSet<u32> =
            self.inner.state.lock().pid_to_id.keys().copied().collect();

        let mut discovered = Vec::new();
        for (pid, process) in sys.processes() {
            let pid_u32 = pid.as_u32();
            if known_pids.contains(&pid_u32) {
                continue;
            }
            let is_child = process
                .parent()
                .map(|p| p.as_u32() == parent_pid)
                .unwrap_or(false);
            if !is_child {
                continue;
            }

            let command = process
                .exe()
                .and_then(|p| p.to_str())
                .unwrap_or_else(|| process.name().to_str().unwrap_or("unknown"))
                .to_string();

            let mut child = ProcessNode::child_of(&parent, pid_u32, command);
            child.task_id = task_id;
            child.instance_id = instance_id.to_string();
            child.agent_type = agent_type.to_string();

            let registered = self.register(child).await?;
            let grandchildren = Box::pin(self.discover_children(pid_u32, task_id, instance_id, agent_type)).await?;
            discovered.push(registered);
            discovered.extend(grandchildren);
        }

        Ok(discovered)
    }

    /// Depth-first: terminate children, then this node.
    #[instrument(skip(self))]
    pub async fn terminate(&self, id: &str) -> OrchestrationResult<()> {
        let children = {
            let state = self.inner.state.lock();
            state.children.get(id).cloned().unwrap_or_default()
        };
        for child_id in children {
            Box::pin(self.terminate(&child_id)).await?;
        }

        let pid = self
            .inner
            .state
            .lock()
            .processes
            .get(id)
            .map(|n| n.pid);

        if let Some(pid) = pid {
            let mut sys = System::new_all();
            sys.refresh_all();
            if let Some(process) = sys.process(Pid::from_u32(pid)) {
                process.kill();
            }
        }

        self.update_status(id, ProcessStatus::Terminated, None).await?;
        Ok(())
    }

    /// Evicts nodes whose `ended_at` predates `max_age` from in-memory
    /// indices only; persisted rows are untouched.
    pub fn cleanup_ended(&self, max_age: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::zero());
        let mut state = self.inner.state.lock();
        let stale: Vec<String> = state
            .processes
            .values()
            .filter(|n| n.ended_at.map(|ts| ts < cutoff).unwrap_or(false))
            .map(|n| n.id.clone())
            .collect();

        for id in stale {
            if let Some(node) = state.processes.remove(&id) {
                state.pid_to_id.remove(&node.pid);
                if let Some(parent_id) = &node.parent_id {
                    if let Some(siblings) = state.children.get_mut(parent_id) {
                        siblings.retain(|c| c != &id);
                    }
                }
                state.children.remove(&id);
            }
        }
    }

    /// One reconciliation pass over every non-terminal node.
    async fn reconcile_once(&self) {
        let candidates: Vec<ProcessNode> = {
            let state = self.inner.state.lock();
            state
                .processes
                .values()
                .filter(|n| matches!(n.status, ProcessStatus::Starting | ProcessStatus::Running))
                .cloned()
                .collect()
        };

        if candidates.is_empty() {
            return;
        }

        let mut sys = System::new_all();
        sys.refresh_all();

        for node in candidates {
            let process = sys.process(Pid::from_u32(node.pid));
            let alive = process.is_some();

            if !alive {
                let exit_code = process.and_then(|p| p.exit_status()).and_then(|s| s.code());
                let new_status = match exit_code {
                    Some(0) => ProcessStatus::Completed,
                    _ => ProcessStatus::Failed,
                };
                if let Err(e) = self.update_status(&node.id, new_status, exit_code).await {
                    warn!(id = %node.id, error = %e, "failed to record reconciled exit");
                }
                continue;
            }

            if node.status == ProcessStatus::Starting {
                if let Err(e) = self.update_status(&node.id, ProcessStatus::Running, None).await {
                    warn!(id = %node.id, error = %e, "failed to promote starting -> running");
                }
            }

            if let Some(process) = process {
                let mut state = self.inner.state.lock();
                if let Some(tracked) = state.processes.get_mut(&node.id) {
                    tracked.cpu_percent = process.cpu_usage();
                    tracked.memory_bytes = process.memory();
                }
            }

            if let Err(e) = self
                .discover_children(node.pid, node.task_id, &node.instance_id, &node.agent_type)
                .await
            {
                warn!(id = %node.id, error = %e, "discover_children failed during reconciliation");
            }
        }
    }

    /// Spawns the background reconciliation loop. `stop()` closes the stop
    /// channel; the loop exits within one tick.
    pub fn spawn_reconciliation_loop(&self) {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        *self.inner.stop_tx.lock() = Some(stop_tx);

        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tracker.inner.tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => tracker.reconcile_once().await,
                    _ = stop_rx.recv() => break,
                }
            }
        });
    }

    pub fn stop(&self) {
        if let Some(tx) = self.inner.stop_tx.lock().take() {
            let _ = tx.try_send(());
        }
    }

    /// Snapshot the subscriber senders, release the lock, then emit — a
    /// subscriber callback can never re-enter the tracker mid-mutation.
    async fn emit(&self, _process_id: &str, event: ProcessEvent) -> OrchestrationResult<()> {
        if let Some(store) = &self.inner.event_store {
            store.put_event(event.clone()).await?;
        }

        let subscribers: Vec<mpsc::Sender<ProcessEvent>> =
            self.inner.state.lock().subscribers.values().cloned().collect();

        for sender in subscribers {
            let _ = sender.try_send(event.clone());
        }

        Ok(())
    }
}
