//! # Task Engine
//!
//! Runs operations that outlive a request. [`TaskEngine::submit`] allocates an
//! id, records the task as `running` and returns at once; the operation runs on
//! its own Tokio task and a supervisor records how it ended.
//!
//! ## Concurrency Model
//!
//! - Id allocation is a single atomic increment, so ids are unique and follow
//!   submission order.
//! - Every task has its own cell behind its own lock. Only the task's
//!   [`TaskHandle`] (progress) and its supervisor (terminal state) write to it,
//!   so tasks never contend with each other.
//! - The registry lock is held only to insert, look up or evict cells.
//!
//! ## Fault Handling
//!
//! The operation's result decides the terminal state: `Ok(msg)` finishes,
//! `Err(e)` fails with `e`'s message, and a panic fails with the panic payload.
//! A task cannot stay `running` because its operation crashed.
//!
//! ## Retention
//!
//! Terminal tasks are evicted once they have been terminal for longer than
//! [`TaskConfig::retention`]. Running tasks are never evicted.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::model::{TaskId, TaskSnapshot, TaskStatus, DEFAULT_MESSAGE};
use crate::error::ModelError;

/// Retention settings for the engine.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// How long a finished or failed task stays queryable. `None` keeps
    /// terminal tasks for the life of the process.
    pub retention: Option<Duration>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            retention: Some(Duration::from_secs(3600)),
        }
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    message: String,
    ended_at: Option<Instant>,
}

#[derive(Debug)]
struct TaskCell {
    id: TaskId,
    target_uri: Option<String>,
    state: RwLock<TaskState>,
}

impl TaskCell {
    fn snapshot(&self) -> TaskSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        TaskSnapshot {
            id: self.id,
            status: state.status,
            message: state.message.clone(),
            target_uri: self.target_uri.clone(),
        }
    }

    fn set_message(&self, message: String) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.status.is_terminal() {
            warn!(task_id = self.id, "Progress after completion ignored");
            return;
        }
        state.message = message;
    }

    fn complete(&self, message: String, success: bool) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.status.is_terminal() {
            warn!(task_id = self.id, status = %state.status, "Task already completed");
            return;
        }
        state.status = if success {
            TaskStatus::Finished
        } else {
            TaskStatus::Failed
        };
        state.ended_at = Some(Instant::now());
        if success {
            info!(task_id = self.id, message = %message, "Task finished");
        } else {
            warn!(task_id = self.id, message = %message, "Task failed");
        }
        state.message = message;
    }

    fn expired(&self, now: Instant, retention: Duration) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .ended_at
            .is_some_and(|ended| now.saturating_duration_since(ended) >= retention)
    }
}

/// The running operation's view of its own task.
///
/// Handed to the operation by [`TaskEngine::submit`]; it is the only way to
/// publish progress while the task is `running`.
#[derive(Debug)]
pub struct TaskHandle {
    cell: Arc<TaskCell>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    /// Replace the task message without leaving `running`.
    pub fn update(&self, message: impl Into<String>) {
        self.cell.set_message(message.into());
    }
}

/// Owner of the task registry.
#[derive(Debug)]
pub struct TaskEngine {
    next_id: AtomicU64,
    tasks: RwLock<BTreeMap<TaskId, Arc<TaskCell>>>,
    config: TaskConfig,
}

impl Default for TaskEngine {
    fn default() -> Self {
        Self::new(TaskConfig::default())
    }
}

impl TaskEngine {
    pub fn new(config: TaskConfig) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    fn register(&self, target_uri: Option<String>) -> Arc<TaskCell> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cell = Arc::new(TaskCell {
            id,
            target_uri,
            state: RwLock::new(TaskState {
                status: TaskStatus::Running,
                message: DEFAULT_MESSAGE.to_string(),
                ended_at: None,
            }),
        });
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&cell));
        cell
    }

    /// Launch `op` in the background and return its task id immediately.
    ///
    /// `op` receives the task's [`TaskHandle`] and builds the future to run.
    /// Building happens on the spawned task too, so a panic there fails the
    /// task instead of reaching the caller. Must be called from within a
    /// Tokio runtime.
    pub fn submit<F, Fut>(&self, target_uri: Option<String>, op: F) -> TaskId
    where
        F: FnOnce(TaskHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, ModelError>> + Send + 'static,
    {
        self.purge_expired();
        let cell = self.register(target_uri);
        let id = cell.id;
        info!(task_id = id, target_uri = ?cell.target_uri, "Task submitted");

        let handle = TaskHandle {
            cell: Arc::clone(&cell),
        };
        let work = tokio::spawn(async move { op(handle).await });
        tokio::spawn(supervise(cell, work));
        id
    }

    /// Like [`submit`](Self::submit) for blocking operations, which run on
    /// Tokio's blocking pool.
    pub fn submit_blocking<F>(&self, target_uri: Option<String>, op: F) -> TaskId
    where
        F: FnOnce(&TaskHandle) -> Result<String, ModelError> + Send + 'static,
    {
        self.purge_expired();
        let cell = self.register(target_uri);
        let id = cell.id;
        info!(task_id = id, target_uri = ?cell.target_uri, "Blocking task submitted");

        let handle = TaskHandle {
            cell: Arc::clone(&cell),
        };
        let work = tokio::task::spawn_blocking(move || op(&handle));
        tokio::spawn(supervise(cell, work));
        id
    }

    /// Snapshot of one task.
    pub fn lookup(&self, id: TaskId) -> Result<TaskSnapshot, ModelError> {
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks
            .get(&id)
            .map(|cell| cell.snapshot())
            .ok_or_else(|| ModelError::NotFound(format!("task {id} not found")))
    }

    /// Ids of all retained tasks, ascending.
    pub fn list(&self) -> Vec<TaskId> {
        self.purge_expired();
        let tasks = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        tasks.keys().copied().collect()
    }

    /// Evict terminal tasks older than the retention period. Returns how many
    /// were evicted.
    pub fn purge_expired(&self) -> usize {
        let Some(retention) = self.config.retention else {
            return 0;
        };
        let now = Instant::now();
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, cell| !cell.expired(now, retention));
        let evicted = before - tasks.len();
        if evicted > 0 {
            debug!(evicted, remaining = tasks.len(), "Evicted expired tasks");
        }
        evicted
    }
}

async fn supervise(cell: Arc<TaskCell>, work: JoinHandle<Result<String, ModelError>>) {
    let (message, success) = match work.await {
        Ok(Ok(message)) => (message, true),
        Ok(Err(e)) => (e.to_string(), false),
        Err(e) => (fault_message(e), false),
    };
    cell.complete(message, success);
}

fn fault_message(e: JoinError) -> String {
    if !e.is_panic() {
        return "task was cancelled".to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}
