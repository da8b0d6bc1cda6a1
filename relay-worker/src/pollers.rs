//! Task pollers: long-poll the orchestration service for decision and
//! activity tasks, dispatch them to handlers, and report the results.

use crate::handlers::{
    ActivityTaskHandler, ActivityTaskResponse, ActivityTaskResponseById, DecisionHeartbeat,
    WorkflowTaskCompletedRequest, WorkflowTaskHandler,
};
use crate::history::HistoryIterator;
use crate::metrics::{counters, timers, WorkerMetrics};
use crate::retry::{dynamic_service_retry_policy, retry};
use crate::task::{ActivityTask, ResetStickinessTask, WorkflowTask};
use crate::worker::WorkerExecutionParameters;
use crate::SharedWorkflowService;
use async_trait::async_trait;
use futures::FutureExt;
use relay_core::{is_service_transient_error, PanicError, RelayError};
use relay_proto::shared::{
    DecisionTaskFailedCause, StickyExecutionAttributes, TaskList, TaskListKind, TaskListMetadata,
};
use relay_proto::workflow_service::*;
use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bound on a single long-poll request; slightly above the server's long-poll
/// window so the server side times out first.
pub const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(150);

/// Fraction of the decision task timeout after which the workflow handler
/// force-completes the task through the heartbeat callback.
pub const FORCE_COMPLETE_DECISION_TASK_RATIO: f64 = 0.8;

/// Poll for one task, process one task. The stop sentinel
/// (`RelayError::WorkerStopped`) signals orderly shutdown, not failure.
#[async_trait]
pub trait TaskPoller: Send + Sync {
    type Task: Send;

    async fn poll_task(&self) -> Result<Self::Task, RelayError>;
    async fn process_task(&self, task: Self::Task) -> Result<(), RelayError>;
}

/// Shared stop handling for all pollers.
pub struct BasePoller {
    stop: CancellationToken,
}

impl BasePoller {
    pub fn new(stop: CancellationToken) -> Self {
        Self { stop }
    }

    pub fn stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Run a poll with the long-poll bound; the worker stop signal preempts
    /// the wait and yields the stop sentinel.
    pub async fn do_poll<T, F>(&self, poll: F) -> Result<T, RelayError>
    where
        F: Future<Output = Result<T, RelayError>>,
    {
        if self.stopping() {
            return Err(RelayError::WorkerStopped);
        }
        tokio::select! {
            result = tokio::time::timeout(LONG_POLL_TIMEOUT, poll) => match result {
                Ok(inner) => inner,
                Err(_) => Err(RelayError::DeadlineExceeded),
            },
            _ = self.stop.cancelled() => Err(RelayError::WorkerStopped),
        }
    }
}

/// Sticky task list name for a worker; a deterministic function of the
/// worker-lifetime UUID.
pub fn sticky_worker_task_list(sticky_uuid: &Uuid) -> String {
    format!("sticky:{}", sticky_uuid)
}

#[derive(Default)]
struct PollRequestState {
    pending_regular_poll_count: i64,
    pending_sticky_poll_count: i64,
    sticky_backlog: i64,
}

/// Tasks a workflow poller can process: polled decision tasks plus the
/// side-band reset-stickiness task injected by cache eviction.
pub enum WorkflowPollerTask {
    Decision(Option<Box<WorkflowTask>>),
    ResetStickiness(ResetStickinessTask),
}

/// Long-polls decision tasks, chooses between the sticky and normal queue,
/// and drives decision processing including heartbeat continuations.
pub struct WorkflowTaskPoller {
    base: BasePoller,
    service: SharedWorkflowService,
    namespace: String,
    task_list_name: String,
    identity: String,
    binary_checksum: String,
    task_handler: Arc<dyn WorkflowTaskHandler>,
    metrics: Arc<dyn WorkerMetrics>,
    sticky_uuid: Uuid,
    disable_sticky_execution: bool,
    sticky_schedule_to_start_timeout: Duration,
    request_state: Mutex<PollRequestState>,
}

/// Decrements the pending-poll count for the chosen queue when the poll
/// settles, including when the poll future is dropped by stop or timeout.
struct PollReleaser<'a> {
    poller: &'a WorkflowTaskPoller,
    kind: TaskListKind,
}

impl Drop for PollReleaser<'_> {
    fn drop(&mut self) {
        self.poller.release(self.kind);
    }
}

impl WorkflowTaskPoller {
    pub fn new(
        task_handler: Arc<dyn WorkflowTaskHandler>,
        service: SharedWorkflowService,
        params: &WorkerExecutionParameters,
    ) -> Self {
        Self {
            base: BasePoller::new(params.stop.clone()),
            service,
            namespace: params.namespace.clone(),
            task_list_name: params.task_list.clone(),
            identity: params.identity.clone(),
            binary_checksum: params.binary_checksum.clone(),
            task_handler,
            metrics: params.metrics.clone(),
            sticky_uuid: Uuid::new_v4(),
            disable_sticky_execution: params.disable_sticky_execution,
            sticky_schedule_to_start_timeout: params.sticky_schedule_to_start_timeout,
            request_state: Mutex::new(PollRequestState::default()),
        }
    }

    /// Queue selection rules: sticky disabled polls normal; a sticky backlog
    /// always prefers sticky; otherwise poll whichever queue has fewer
    /// pending requests, sticky on ties.
    fn get_next_poll_request(&self) -> PollForDecisionTaskRequest {
        let mut task_list_name = self.task_list_name.clone();
        let mut task_list_kind = TaskListKind::Normal;
        if !self.disable_sticky_execution {
            let mut state = self.request_state.lock().unwrap();
            if state.sticky_backlog > 0
                || state.pending_sticky_poll_count <= state.pending_regular_poll_count
            {
                state.pending_sticky_poll_count += 1;
                task_list_name = sticky_worker_task_list(&self.sticky_uuid);
                task_list_kind = TaskListKind::Sticky;
            } else {
                state.pending_regular_poll_count += 1;
            }
        }
        PollForDecisionTaskRequest {
            namespace: self.namespace.clone(),
            task_list: TaskList {
                name: task_list_name,
                kind: task_list_kind,
            },
            identity: self.identity.clone(),
            binary_checksum: self.binary_checksum.clone(),
        }
    }

    fn release(&self, kind: TaskListKind) {
        if self.disable_sticky_execution {
            return;
        }
        let mut state = self.request_state.lock().unwrap();
        if kind == TaskListKind::Sticky {
            state.pending_sticky_poll_count -= 1;
        } else {
            state.pending_regular_poll_count -= 1;
        }
    }

    fn update_backlog(&self, kind: TaskListKind, backlog_count_hint: i64) {
        // Only the sticky backlog matters for queue selection.
        if kind == TaskListKind::Normal || self.disable_sticky_execution {
            return;
        }
        let mut state = self.request_state.lock().unwrap();
        state.sticky_backlog = backlog_count_hint;
    }

    async fn poll(&self) -> Result<Option<Box<WorkflowTask>>, RelayError> {
        let start = Instant::now();
        self.metrics
            .increment_counter(counters::DECISION_POLL_TOTAL);
        debug!("polling for decision task");

        let request = self.get_next_poll_request();
        let kind = request.task_list.kind;
        let _releaser = PollReleaser { poller: self, kind };

        let response = match self.service.poll_for_decision_task(request).await {
            Ok(response) => response,
            Err(err) => {
                if is_service_transient_error(&err) {
                    self.metrics
                        .increment_counter(counters::DECISION_POLL_TRANSIENT_FAILED_TOTAL);
                } else {
                    self.metrics
                        .increment_counter(counters::DECISION_POLL_FAILED_TOTAL);
                }
                self.update_backlog(kind, 0);
                return Err(err);
            }
        };

        if response.task_token.is_empty() {
            self.metrics
                .increment_counter(counters::DECISION_POLL_NO_TASK_TOTAL);
            self.update_backlog(kind, 0);
            return Ok(None);
        }

        self.update_backlog(kind, response.backlog_count_hint);
        self.metrics
            .increment_counter(counters::DECISION_POLL_SUCCEED_TOTAL);
        self.metrics
            .record_timer(timers::DECISION_POLL_LATENCY, start.elapsed());
        if let (Some(scheduled), Some(started)) =
            (response.scheduled_timestamp, response.started_timestamp)
        {
            self.metrics.record_timer(
                timers::DECISION_SCHEDULED_TO_START_LATENCY,
                Duration::from_nanos((started - scheduled).max(0) as u64),
            );
        }
        debug!(
            started_event_id = response.started_event_id,
            attempt = response.attempt,
            is_query_task = response.query.is_some(),
            "decision task received"
        );
        Ok(Some(Box::new(self.to_workflow_task(response))))
    }

    fn to_workflow_task(&self, response: PollForDecisionTaskResponse) -> WorkflowTask {
        let history_iterator = HistoryIterator::new(
            self.service.clone(),
            self.namespace.clone(),
            response.workflow_execution.clone().unwrap_or_default(),
            response.next_page_token.clone(),
            response.started_event_id,
            self.metrics.clone(),
        );
        WorkflowTask {
            task: response,
            history_iterator,
            done: None,
            la_result_tx: None,
            la_result_rx: None,
        }
    }

    /// Cheap copy of a poll response for logging and the attempt check,
    /// without dragging the history along.
    fn response_summary(task: &PollForDecisionTaskResponse) -> PollForDecisionTaskResponse {
        PollForDecisionTaskResponse {
            task_token: task.task_token.clone(),
            workflow_execution: task.workflow_execution.clone(),
            workflow_type: task.workflow_type.clone(),
            previous_started_event_id: task.previous_started_event_id,
            started_event_id: task.started_event_id,
            attempt: task.attempt,
            backlog_count_hint: task.backlog_count_hint,
            history: None,
            next_page_token: None,
            query: task.query.clone(),
            scheduled_timestamp: task.scheduled_timestamp,
            started_timestamp: task.started_timestamp,
        }
    }

    pub async fn process_workflow_task(
        &self,
        task: Option<Box<WorkflowTask>>,
    ) -> Result<(), RelayError> {
        let Some(mut task) = task else {
            // Empty poll; nothing to do.
            debug!("workflow task unavailable");
            return Ok(());
        };

        let (done_tx, done_rx) = watch::channel(false);
        let (la_result_tx, la_result_rx) = mpsc::channel(1);
        task.attach_channels(done_rx.clone(), la_result_tx.clone(), Some(la_result_rx));
        // Dropped on every return path, unblocking any local activity still
        // trying to deliver a result to this task.
        let _done_guard = done_tx;

        loop {
            let start_time = Instant::now();
            let mut heartbeat = PollerDecisionHeartbeat {
                poller: self,
                done: done_rx.clone(),
                la_result_tx: la_result_tx.clone(),
                task_response: Self::response_summary(&task.task),
            };
            // A panic out of workflow processing means an illegal state
            // transition or non-determinism; capture it with a stack trace
            // and fail the decision task instead of tearing the worker down.
            let handled = match AssertUnwindSafe(
                self.task_handler
                    .process_workflow_task(&mut task, &mut heartbeat),
            )
            .catch_unwind()
            .await
            {
                Ok(handled) => handled,
                Err(panic_payload) => Err(RelayError::Panic(PanicError::from_panic_payload(
                    panic_payload.as_ref(),
                    Backtrace::force_capture().to_string(),
                ))),
            };

            let completed = match handled {
                // Already answered (heartbeat or query path).
                Ok(None) => return Ok(()),
                // The heartbeat completion itself failed; the task must not
                // be responded to a second time.
                Err(err @ RelayError::DecisionHeartbeat(_)) => return Err(err),
                Ok(Some(request)) => Ok(request),
                Err(err) => Err(err),
            };

            let response = self
                .respond_task_completed_with_metrics(completed, &task.task, start_time)
                .await?;

            match response.and_then(|response| response.decision_task) {
                Some(next) => {
                    // The server piggybacked the next decision task; keep the
                    // processing loop and channels and continue with it.
                    let mut next_task = self.to_workflow_task(next);
                    next_task.attach_channels(done_rx.clone(), la_result_tx.clone(), None);
                    task = Box::new(next_task);
                }
                None => return Ok(()),
            }
        }
    }

    pub async fn process_reset_stickiness_task(
        &self,
        task: ResetStickinessTask,
    ) -> Result<(), RelayError> {
        self.metrics
            .increment_counter(counters::STICKY_CACHE_EVICT_TOTAL);
        let request = ResetStickyTaskListRequest {
            namespace: self.namespace.clone(),
            execution: task.execution.clone(),
        };
        if let Err(err) = self.service.reset_sticky_task_list(request).await {
            warn!(
                workflow_id = %task.execution.workflow_id,
                run_id = %task.execution.run_id,
                error = %err,
                "reset sticky task list failed"
            );
            return Err(err);
        }
        Ok(())
    }

    async fn respond_task_completed_with_metrics(
        &self,
        completed: Result<WorkflowTaskCompletedRequest, RelayError>,
        task: &PollForDecisionTaskResponse,
        start_time: Instant,
    ) -> Result<Option<RespondDecisionTaskCompletedResponse>, RelayError> {
        let request = match completed {
            Ok(request) => {
                self.metrics
                    .increment_counter(counters::DECISION_TASK_COMPLETED_TOTAL);
                request
            }
            Err(task_err) => {
                self.metrics
                    .increment_counter(counters::DECISION_EXECUTION_FAILED_TOTAL);
                warn!(
                    workflow_id = %task
                        .workflow_execution
                        .as_ref()
                        .map(|e| e.workflow_id.as_str())
                        .unwrap_or_default(),
                    run_id = %task
                        .workflow_execution
                        .as_ref()
                        .map(|e| e.run_id.as_str())
                        .unwrap_or_default(),
                    error = %task_err,
                    "failed to process decision task"
                );
                WorkflowTaskCompletedRequest::Failed(self.error_to_fail_decision_task(
                    task.task_token.clone(),
                    &task_err,
                ))
            }
        };
        self.metrics
            .record_timer(timers::DECISION_EXECUTION_LATENCY, start_time.elapsed());

        let response_start = Instant::now();
        let response = match self.respond_task_completed(request, task).await {
            Ok(response) => response,
            Err(err) => {
                self.metrics
                    .increment_counter(counters::DECISION_RESPONSE_FAILED_TOTAL);
                return Err(err);
            }
        };
        self.metrics
            .record_timer(timers::DECISION_RESPONSE_LATENCY, response_start.elapsed());
        Ok(response)
    }

    fn error_to_fail_decision_task(
        &self,
        task_token: Vec<u8>,
        err: &RelayError,
    ) -> RespondDecisionTaskFailedRequest {
        let details = match err {
            RelayError::Panic(panic) => format!("{}\n{}", panic.message, panic.stack_trace),
            other => other.to_string(),
        };
        RespondDecisionTaskFailedRequest {
            task_token,
            cause: DecisionTaskFailedCause::WorkflowWorkerUnhandledFailure,
            details: Some(details.into_bytes()),
            identity: self.identity.clone(),
            binary_checksum: self.binary_checksum.clone(),
        }
    }

    async fn respond_task_completed(
        &self,
        mut request: WorkflowTaskCompletedRequest,
        task: &PollForDecisionTaskResponse,
    ) -> Result<Option<RespondDecisionTaskCompletedResponse>, RelayError> {
        if let WorkflowTaskCompletedRequest::Completed(completed) = &mut request {
            if completed.sticky_attributes.is_none() && !self.disable_sticky_execution {
                completed.sticky_attributes = Some(StickyExecutionAttributes {
                    worker_task_list: TaskList {
                        name: sticky_worker_task_list(&self.sticky_uuid),
                        kind: TaskListKind::Sticky,
                    },
                    schedule_to_start_timeout_seconds: self
                        .sticky_schedule_to_start_timeout
                        .as_secs_f64()
                        .ceil() as i32,
                });
            } else {
                completed.return_new_decision_task = false;
            }
        }

        let policy = dynamic_service_retry_policy();
        match request {
            WorkflowTaskCompletedRequest::Failed(failed) => {
                // Only fail a decision task on its first attempt; re-failing
                // a retried task would spin, so later attempts are left to
                // the server-side timeout.
                if task.attempt == 0 {
                    retry(&policy, is_service_transient_error, || {
                        let service = self.service.clone();
                        let request = failed.clone();
                        async move { service.respond_decision_task_failed(request).await }
                    })
                    .await
                    .map_err(|err| {
                        debug!(error = %err, "RespondDecisionTaskFailed failed");
                        err
                    })?;
                }
                Ok(None)
            }
            WorkflowTaskCompletedRequest::Completed(completed) => {
                let response = retry(&policy, is_service_transient_error, || {
                    let service = self.service.clone();
                    let request = completed.clone();
                    async move { service.respond_decision_task_completed(request).await }
                })
                .await
                .map_err(|err| {
                    debug!(error = %err, "RespondDecisionTaskCompleted failed");
                    err
                })?;
                Ok(Some(response))
            }
            WorkflowTaskCompletedRequest::QueryCompleted(query) => {
                retry(&policy, is_service_transient_error, || {
                    let service = self.service.clone();
                    let request = query.clone();
                    async move { service.respond_query_task_completed(request).await }
                })
                .await
                .map_err(|err| {
                    debug!(error = %err, "RespondQueryTaskCompleted failed");
                    err
                })?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TaskPoller for WorkflowTaskPoller {
    type Task = WorkflowPollerTask;

    async fn poll_task(&self) -> Result<Self::Task, RelayError> {
        let task = self.base.do_poll(self.poll()).await?;
        Ok(WorkflowPollerTask::Decision(task))
    }

    async fn process_task(&self, task: Self::Task) -> Result<(), RelayError> {
        if self.base.stopping() {
            return Err(RelayError::WorkerStopped);
        }
        match task {
            WorkflowPollerTask::Decision(task) => self.process_workflow_task(task).await,
            WorkflowPollerTask::ResetStickiness(task) => {
                self.process_reset_stickiness_task(task).await
            }
        }
    }
}

struct PollerDecisionHeartbeat<'a> {
    poller: &'a WorkflowTaskPoller,
    done: watch::Receiver<bool>,
    la_result_tx: mpsc::Sender<crate::local_activity::LocalActivityResult>,
    task_response: PollForDecisionTaskResponse,
}

#[async_trait]
impl DecisionHeartbeat for PollerDecisionHeartbeat<'_> {
    async fn force_complete(
        &mut self,
        request: RespondDecisionTaskCompletedRequest,
        start_time: Instant,
    ) -> Result<Option<WorkflowTask>, RelayError> {
        debug!(
            started_event_id = self.task_response.started_event_id,
            "force completing decision task"
        );
        self.poller
            .metrics
            .increment_counter(counters::DECISION_TASK_FORCE_COMPLETED_TOTAL);
        let response = self
            .poller
            .respond_task_completed_with_metrics(
                Ok(WorkflowTaskCompletedRequest::Completed(request)),
                &self.task_response,
                start_time,
            )
            .await
            .map_err(|err| RelayError::DecisionHeartbeat(err.to_string()))?;

        match response.and_then(|response| response.decision_task) {
            None => Ok(None),
            Some(next) => {
                let mut task = self.poller.to_workflow_task(next);
                task.attach_channels(self.done.clone(), self.la_result_tx.clone(), None);
                Ok(Some(task))
            }
        }
    }
}

/// Long-polls activity tasks, executes them through the handler, and reports
/// the classified outcome.
pub struct ActivityTaskPoller {
    base: BasePoller,
    service: SharedWorkflowService,
    namespace: String,
    task_list_name: String,
    identity: String,
    task_handler: Arc<dyn ActivityTaskHandler>,
    metrics: Arc<dyn WorkerMetrics>,
    activities_per_second: f64,
}

impl ActivityTaskPoller {
    pub fn new(
        task_handler: Arc<dyn ActivityTaskHandler>,
        service: SharedWorkflowService,
        params: &WorkerExecutionParameters,
    ) -> Self {
        Self {
            base: BasePoller::new(params.stop.clone()),
            service,
            namespace: params.namespace.clone(),
            task_list_name: params.task_list.clone(),
            identity: params.identity.clone(),
            task_handler,
            metrics: params.metrics.clone(),
            activities_per_second: params.task_list_activities_per_second,
        }
    }

    async fn poll(&self) -> Result<Option<ActivityTask>, RelayError> {
        let start = Instant::now();
        self.metrics
            .increment_counter(counters::ACTIVITY_POLL_TOTAL);
        debug!("polling for activity task");

        let request = PollForActivityTaskRequest {
            namespace: self.namespace.clone(),
            task_list: TaskList {
                name: self.task_list_name.clone(),
                kind: TaskListKind::Normal,
            },
            identity: self.identity.clone(),
            task_list_metadata: Some(TaskListMetadata {
                max_tasks_per_second: Some(self.activities_per_second),
            }),
        };

        let response = match self.service.poll_for_activity_task(request).await {
            Ok(response) => response,
            Err(err) => {
                if is_service_transient_error(&err) {
                    self.metrics
                        .increment_counter(counters::ACTIVITY_POLL_TRANSIENT_FAILED_TOTAL);
                } else {
                    self.metrics
                        .increment_counter(counters::ACTIVITY_POLL_FAILED_TOTAL);
                }
                return Err(err);
            }
        };

        if response.task_token.is_empty() {
            self.metrics
                .increment_counter(counters::ACTIVITY_POLL_NO_TASK_TOTAL);
            return Ok(None);
        }

        self.metrics
            .increment_counter(counters::ACTIVITY_POLL_SUCCEED_TOTAL);
        self.metrics
            .record_timer(timers::ACTIVITY_POLL_LATENCY, start.elapsed());
        if let (Some(scheduled), Some(started)) = (
            response.scheduled_timestamp_of_this_attempt,
            response.started_timestamp,
        ) {
            self.metrics.record_timer(
                timers::ACTIVITY_SCHEDULED_TO_START_LATENCY,
                Duration::from_nanos((started - scheduled).max(0) as u64),
            );
        }

        Ok(Some(ActivityTask {
            task: response,
            poll_start_time: start,
        }))
    }
}

#[async_trait]
impl TaskPoller for ActivityTaskPoller {
    type Task = Option<ActivityTask>;

    async fn poll_task(&self) -> Result<Self::Task, RelayError> {
        self.base.do_poll(self.poll()).await
    }

    async fn process_task(&self, task: Self::Task) -> Result<(), RelayError> {
        if self.base.stopping() {
            return Err(RelayError::WorkerStopped);
        }
        let Some(activity_task) = task else {
            debug!("activity task unavailable");
            return Ok(());
        };

        let execution_start = Instant::now();
        let response = match self
            .task_handler
            .execute(&self.task_list_name, activity_task.task)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.metrics
                    .increment_counter(counters::ACTIVITY_EXECUTION_FAILED_TOTAL);
                return Err(err);
            }
        };
        self.metrics
            .record_timer(timers::ACTIVITY_EXECUTION_LATENCY, execution_start.elapsed());

        if matches!(response, ActivityTaskResponse::Pending) {
            // Asynchronous completion; nothing to report.
            return Ok(());
        }

        // Worker is stopping; skip reporting so shutdown stays prompt.
        if self.base.stopping() {
            return Err(RelayError::WorkerStopped);
        }

        let response_start = Instant::now();
        report_activity_complete(self.service.clone(), response, self.metrics.as_ref())
            .await
            .map_err(|err| {
                self.metrics
                    .increment_counter(counters::ACTIVITY_RESPONSE_FAILED_TOTAL);
                debug!(error = %err, "reporting activity completion failed");
                err
            })?;
        self.metrics
            .record_timer(timers::ACTIVITY_RESPONSE_LATENCY, response_start.elapsed());
        self.metrics.record_timer(
            timers::ACTIVITY_END_TO_END_LATENCY,
            activity_task.poll_start_time.elapsed(),
        );
        Ok(())
    }
}

/// Report an activity outcome by task token, retrying transient failures.
pub async fn report_activity_complete(
    service: SharedWorkflowService,
    response: ActivityTaskResponse,
    metrics: &dyn WorkerMetrics,
) -> Result<(), RelayError> {
    let policy = dynamic_service_retry_policy();
    match response {
        ActivityTaskResponse::Pending => Ok(()),
        ActivityTaskResponse::Completed(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_completed(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_COMPLETED_TOTAL);
            Ok(())
        }
        ActivityTaskResponse::Failed(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_failed(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_FAILED_TOTAL);
            Ok(())
        }
        ActivityTaskResponse::Canceled(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_canceled(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_CANCELED_TOTAL);
            Ok(())
        }
    }
}

/// Report an activity outcome by workflow/activity id, used for asynchronous
/// completion where no task token is at hand.
pub async fn report_activity_complete_by_id(
    service: SharedWorkflowService,
    response: ActivityTaskResponseById,
    metrics: &dyn WorkerMetrics,
) -> Result<(), RelayError> {
    let policy = dynamic_service_retry_policy();
    match response {
        ActivityTaskResponseById::Pending => Ok(()),
        ActivityTaskResponseById::Completed(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_completed_by_id(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_COMPLETED_BY_ID_TOTAL);
            Ok(())
        }
        ActivityTaskResponseById::Failed(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_failed_by_id(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_FAILED_BY_ID_TOTAL);
            Ok(())
        }
        ActivityTaskResponseById::Canceled(request) => {
            retry(&policy, is_service_transient_error, || {
                let service = service.clone();
                let request = request.clone();
                async move { service.respond_activity_task_canceled_by_id(request).await }
            })
            .await?;
            metrics.increment_counter(counters::ACTIVITY_TASK_CANCELED_BY_ID_TOTAL);
            Ok(())
        }
    }
}
