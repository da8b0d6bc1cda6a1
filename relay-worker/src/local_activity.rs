//! Local activity execution: the tunnel, the task handler, and the poller.
//!
//! Local activities run in-process and never round-trip through the server;
//! their outcome is recorded as a marker in workflow history. The tunnel
//! shuttles tasks from workflow processing to the executor pool and carries
//! no per-workflow context: each task holds the channels needed to route its
//! own result back.

use crate::metrics::{counters, timers, WorkerMetrics};
use crate::pollers::{BasePoller, TaskPoller};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use relay_core::{CanceledError, PanicError, RelayError};
use relay_proto::shared::{WorkflowExecution, WorkflowType};
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How many queued local activity tasks the tunnel holds before producers
/// block.
pub const LOCAL_ACTIVITY_TUNNEL_CAPACITY: usize = 1000;

/// Identity of the workflow a local activity belongs to.
#[derive(Debug, Clone)]
pub struct WorkflowInfo {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub namespace: String,
    pub task_list: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub attempt: i32,
}

/// Execution environment handed to the user function.
#[derive(Debug, Clone)]
pub struct LocalActivityEnvironment {
    pub workflow_execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub namespace: String,
    pub task_list: String,
    pub activity_type: String,
    pub activity_id: String,
    pub attempt: i32,
    pub is_local_activity: bool,
}

/// The user function invoked for a local activity.
pub type LocalActivityFn = Arc<
    dyn Fn(
            LocalActivityEnvironment,
            Option<Vec<u8>>,
        ) -> BoxFuture<'static, Result<Option<Vec<u8>>, RelayError>>
        + Send
        + Sync,
>;

/// Everything needed to run one local activity.
#[derive(Clone)]
pub struct ExecuteLocalActivityParams {
    pub workflow_info: WorkflowInfo,
    pub activity_type: String,
    pub activity_fn: LocalActivityFn,
    pub input: Option<Vec<u8>>,
    pub schedule_to_close_timeout_seconds: i32,
    pub start_to_close_timeout_seconds: i32,
}

struct LocalActivityTaskState {
    canceled: bool,
    cancel: Option<CancellationToken>,
}

/// One queued local activity execution.
///
/// `la_result_tx`/`done` route the result back to the workflow task that
/// spawned it; if that task already finished, the result is dropped.
pub struct LocalActivityTask {
    pub params: ExecuteLocalActivityParams,
    pub activity_id: String,
    /// Zero-based; a non-zero attempt means an earlier run already failed.
    pub attempt: i32,
    /// Absolute expiry carried over from the first attempt's retry policy.
    pub expire_time: Option<Instant>,
    state: StdMutex<LocalActivityTaskState>,
    pub(crate) la_result_tx: mpsc::Sender<LocalActivityResult>,
    pub(crate) done: watch::Receiver<bool>,
}

impl LocalActivityTask {
    pub fn new(
        params: ExecuteLocalActivityParams,
        activity_id: impl Into<String>,
        attempt: i32,
        expire_time: Option<Instant>,
        la_result_tx: mpsc::Sender<LocalActivityResult>,
        done: watch::Receiver<bool>,
    ) -> Self {
        Self {
            params,
            activity_id: activity_id.into(),
            attempt,
            expire_time,
            state: StdMutex::new(LocalActivityTaskState {
                canceled: false,
                cancel: None,
            }),
            la_result_tx,
            done,
        }
    }

    /// Cancel this task. Cancels the running execution if one is in flight,
    /// otherwise marks the task so execution is skipped.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.canceled = true;
        if let Some(cancel) = &state.cancel {
            cancel.cancel();
        }
    }
}

/// Outcome of a local activity execution.
pub struct LocalActivityResult {
    pub task: Arc<LocalActivityTask>,
    pub result: Option<Vec<u8>>,
    pub error: Option<RelayError>,
    /// Backoff the workflow side should apply before the next attempt.
    pub backoff: Option<Duration>,
}

impl LocalActivityResult {
    fn completed(task: Arc<LocalActivityTask>, result: Option<Vec<u8>>) -> Self {
        Self {
            task,
            result,
            error: None,
            backoff: None,
        }
    }

    fn failed(task: Arc<LocalActivityTask>, error: RelayError) -> Self {
        Self {
            task,
            result: None,
            error: Some(error),
            backoff: None,
        }
    }
}

/// Bounded channel pair shuttling local-activity tasks out to executors and
/// results back. One stop signal aborts both directions.
pub struct LocalActivityTunnel {
    task_tx: mpsc::Sender<Arc<LocalActivityTask>>,
    task_rx: Mutex<mpsc::Receiver<Arc<LocalActivityTask>>>,
    result_tx: mpsc::Sender<LocalActivityResult>,
    result_rx: Mutex<mpsc::Receiver<LocalActivityResult>>,
    stop: CancellationToken,
}

impl LocalActivityTunnel {
    pub fn new(stop: CancellationToken) -> Self {
        let (task_tx, task_rx) = mpsc::channel(LOCAL_ACTIVITY_TUNNEL_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(1);
        Self {
            task_tx,
            task_rx: Mutex::new(task_rx),
            result_tx,
            result_rx: Mutex::new(result_rx),
            stop,
        }
    }

    /// Blocks until a task is available; `None` when the worker is stopping.
    pub async fn get_task(&self) -> Option<Arc<LocalActivityTask>> {
        let mut task_rx = self.task_rx.lock().await;
        tokio::select! {
            task = task_rx.recv() => task,
            _ = self.stop.cancelled() => None,
        }
    }

    /// Returns false when the worker is stopping instead of blocking on a
    /// full queue forever.
    pub async fn send_task(&self, task: Arc<LocalActivityTask>) -> bool {
        tokio::select! {
            sent = self.task_tx.send(task) => sent.is_ok(),
            _ = self.stop.cancelled() => false,
        }
    }

    pub async fn get_result(&self) -> Option<LocalActivityResult> {
        let mut result_rx = self.result_rx.lock().await;
        tokio::select! {
            result = result_rx.recv() => result,
            _ = self.stop.cancelled() => None,
        }
    }

    pub async fn send_result(&self, result: LocalActivityResult) -> bool {
        tokio::select! {
            sent = self.result_tx.send(result) => sent.is_ok(),
            _ = self.stop.cancelled() => false,
        }
    }
}

/// Executes local activity tasks with deadline, cancellation, and panic
/// capture.
pub struct LocalActivityTaskHandler {
    metrics: Arc<dyn WorkerMetrics>,
}

impl LocalActivityTaskHandler {
    pub fn new(metrics: Arc<dyn WorkerMetrics>) -> Self {
        Self { metrics }
    }

    pub async fn execute_local_activity_task(
        &self,
        task: Arc<LocalActivityTask>,
    ) -> LocalActivityResult {
        let activity_type = task.params.activity_type.clone();
        let activity_id = task.activity_id.clone();
        let execution = task.params.workflow_info.workflow_execution.clone();
        self.metrics
            .increment_counter(counters::LOCAL_ACTIVITY_TOTAL);

        // Deadline is min(schedule_to_close, start_to_close), clamped by the
        // first attempt's expiry when this is a retry.
        let mut timeout_seconds = task.params.schedule_to_close_timeout_seconds;
        if task.params.start_to_close_timeout_seconds != 0
            && task.params.start_to_close_timeout_seconds < timeout_seconds
        {
            timeout_seconds = task.params.start_to_close_timeout_seconds;
        }
        let timeout = Duration::from_secs(timeout_seconds.max(0) as u64);
        let mut deadline = Instant::now() + timeout;
        if task.attempt > 0 {
            if let Some(expire_time) = task.expire_time {
                if expire_time < deadline {
                    deadline = expire_time;
                }
            }
        }

        let cancel = CancellationToken::new();
        {
            let mut state = task.state.lock().unwrap();
            if state.canceled {
                return self.finish(LocalActivityResult::failed(
                    task.clone(),
                    RelayError::Canceled(CanceledError::default()),
                ));
            }
            state.cancel = Some(cancel.clone());
        }

        let environment = LocalActivityEnvironment {
            workflow_execution: execution.clone(),
            workflow_type: task.params.workflow_info.workflow_type.clone(),
            namespace: task.params.workflow_info.namespace.clone(),
            task_list: task.params.workflow_info.task_list.clone(),
            activity_type: activity_type.clone(),
            activity_id: activity_id.clone(),
            attempt: task.attempt,
            is_local_activity: true,
        };

        let user_future = (task.params.activity_fn)(environment, task.params.input.clone());
        let (executor_done_tx, mut executor_done_rx) = oneshot::channel::<()>();
        let executor_metrics = self.metrics.clone();
        let executor_activity_id = activity_id.clone();
        let executor_activity_type = activity_type.clone();
        let executor = tokio::spawn(async move {
            let execution_start = std::time::Instant::now();
            let outcome = AssertUnwindSafe(user_future).catch_unwind().await;
            let execution_latency = execution_start.elapsed();
            let _ = executor_done_tx.send(());
            executor_metrics.record_timer(timers::LOCAL_ACTIVITY_EXECUTION_LATENCY, execution_latency);
            if execution_latency > timeout {
                // The deadline already fired and the result will be
                // discarded; leave a trace for diagnosing clock/quota drift.
                warn!(
                    local_activity_id = %executor_activity_id,
                    local_activity_type = %executor_activity_type,
                    timeout_seconds,
                    actual_execution = ?execution_latency,
                    "local activity takes too long to complete"
                );
            }
            outcome
        });

        // Completion wins over deadline/cancel: re-check the completion
        // signal before concluding either.
        tokio::select! {
            _ = &mut executor_done_rx => {}
            _ = tokio::time::sleep_until(deadline) => {
                if executor_done_rx.try_recv().is_err() {
                    self.metrics.increment_counter(counters::LOCAL_ACTIVITY_TIMEOUT_TOTAL);
                    return self.finish(LocalActivityResult::failed(
                        task.clone(),
                        RelayError::DeadlineExceeded,
                    ));
                }
            }
            _ = cancel.cancelled() => {
                if executor_done_rx.try_recv().is_err() {
                    self.metrics.increment_counter(counters::LOCAL_ACTIVITY_CANCELED_TOTAL);
                    return self.finish(LocalActivityResult::failed(
                        task.clone(),
                        RelayError::Canceled(CanceledError::default()),
                    ));
                }
            }
        }

        let outcome = match executor.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                return self.finish(LocalActivityResult::failed(
                    task.clone(),
                    RelayError::Generic(format!("local activity executor failed: {}", join_err)),
                ))
            }
        };

        let result = match outcome {
            Ok(Ok(payload)) => LocalActivityResult::completed(task.clone(), payload),
            Ok(Err(err)) => {
                debug!(
                    local_activity_id = %activity_id,
                    local_activity_type = %activity_type,
                    error = %err,
                    "local activity failed"
                );
                LocalActivityResult::failed(task.clone(), err)
            }
            Err(panic_payload) => {
                let panic_err = PanicError::from_panic_payload(
                    panic_payload.as_ref(),
                    Backtrace::force_capture().to_string(),
                );
                error!(
                    workflow_id = %execution.workflow_id,
                    run_id = %execution.run_id,
                    local_activity_type = %activity_type,
                    panic_message = %panic_err.message,
                    "local activity panic"
                );
                self.metrics
                    .increment_counter(counters::LOCAL_ACTIVITY_PANIC_TOTAL);
                LocalActivityResult::failed(task.clone(), RelayError::Panic(panic_err))
            }
        };
        self.finish(result)
    }

    fn finish(&self, result: LocalActivityResult) -> LocalActivityResult {
        if result.error.is_some() {
            self.metrics
                .increment_counter(counters::LOCAL_ACTIVITY_FAILED_TOTAL);
        }
        result
    }
}

/// Pulls local activity tasks from the tunnel, executes them, and posts the
/// result back to the owning workflow task.
pub struct LocalActivityTaskPoller {
    base: BasePoller,
    handler: LocalActivityTaskHandler,
    tunnel: Arc<LocalActivityTunnel>,
}

impl LocalActivityTaskPoller {
    pub fn new(
        stop: CancellationToken,
        metrics: Arc<dyn WorkerMetrics>,
        tunnel: Arc<LocalActivityTunnel>,
    ) -> Self {
        Self {
            base: BasePoller::new(stop),
            handler: LocalActivityTaskHandler::new(metrics),
            tunnel,
        }
    }
}

#[async_trait]
impl TaskPoller for LocalActivityTaskPoller {
    type Task = Option<Arc<LocalActivityTask>>;

    async fn poll_task(&self) -> Result<Self::Task, RelayError> {
        Ok(self.tunnel.get_task().await)
    }

    async fn process_task(&self, task: Self::Task) -> Result<(), RelayError> {
        if self.base.stopping() {
            return Err(RelayError::WorkerStopped);
        }
        let Some(task) = task else {
            return Err(RelayError::WorkerStopped);
        };

        let result = self.handler.execute_local_activity_task(task).await;

        // Route the result to the owning workflow task. The `done` arm keeps
        // this from blocking forever once that task's processing loop has
        // returned; the result is simply dropped then.
        let la_result_tx = result.task.la_result_tx.clone();
        let mut done = result.task.done.clone();
        tokio::select! {
            _ = la_result_tx.send(result) => {}
            _ = done.changed() => {}
        }
        Ok(())
    }
}
