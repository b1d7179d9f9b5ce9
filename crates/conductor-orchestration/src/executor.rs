//! # Executor Capability Set (C6)
//!
//! The engine (C7) treats executors as opaque: no knowledge of containers,
//! SSH, or subprocess plumbing lives here or in `engine.rs`. A backend owns
//! all of that.

use async_trait::async_trait;
use conductor_domain::{AgentDefinition, Task};
use tokio_util::sync::CancellationToken;

/// Per-run context handed to a backend. Cancellation is cooperative: a
/// backend MUST observe `cancelled()` and return promptly, never return a
/// stale success after the token fires.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
        }
    }

    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub instance_id: String,
    pub task: Task,
    pub agent_def: AgentDefinition,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error_message: None,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error_message: Some(error_message.into()),
        }
    }

    pub fn cancelled() -> Self {
        Self::failure("cancelled")
    }
}

/// An execution backend. Four operations only; the core never reaches past
/// this trait into a backend's internals.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    fn can_execute(&self, task: &Task, agent_def: &AgentDefinition) -> bool;

    /// MUST respect `ctx` cancellation: on cancel, terminate managed
    /// processes and return a failed result or error — never a stale success.
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        request: ExecutionRequest,
    ) -> Result<ExecutionResult, String>;

    /// Idempotent forced stop.
    async fn stop(&self, instance_id: &str) -> Result<(), String>;

    async fn is_running(&self, instance_id: &str) -> bool;
}

/// A minimal backend spawning a short-lived process, used by the engine's
/// and tracker's own integration tests in place of a real executor.
#[cfg(any(test, feature = "test-utils"))]
pub mod in_process {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tokio::process::Command;

    #[derive(Debug, Default)]
    pub struct InProcessExecutor {
        running: Mutex<HashSet<String>>,
    }

    impl InProcessExecutor {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Executor for InProcessExecutor {
        fn name(&self) -> &str {
            "in-process"
        }

        fn can_execute(&self, _task: &Task, agent_def: &AgentDefinition) -> bool {
            agent_def.base_runtime == "local-shell"
        }

        async fn execute(
            &self,
            ctx: &ExecutionContext,
            request: ExecutionRequest,
        ) -> Result<ExecutionResult, String> {
            self.running
                .lock()
                .unwrap()
                .insert(request.instance_id.clone());

            let mut child = Command::new("true")
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| e.to_string())?;

            let outcome = tokio::select! {
                status = child.wait() => status.map_err(|e| e.to_string()),
                _ = ctx.cancelled() => {
                    let _ = child.start_kill();
                    self.running.lock().unwrap().remove(&request.instance_id);
                    return Ok(ExecutionResult::cancelled());
                }
            };

            self.running.lock().unwrap().remove(&request.instance_id);

            match outcome {
                Ok(status) if status.success() => Ok(ExecutionResult::ok("done")),
                Ok(status) => Ok(ExecutionResult::failure(format!("exited with {status}"))),
                Err(e) => Err(e),
            }
        }

        async fn stop(&self, instance_id: &str) -> Result<(), String> {
            self.running.lock().unwrap().remove(instance_id);
            Ok(())
        }

        async fn is_running(&self, instance_id: &str) -> bool {
            self.running.lock().unwrap().contains(instance_id)
        }
    }
}
