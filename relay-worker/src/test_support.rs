//! In-memory service and metrics doubles shared by the unit tests.

use crate::metrics::WorkerMetrics;
use relay_core::RelayError;
use relay_proto::shared::{EventType, HistoryEvent, WorkflowExecution, WorkflowType};
use relay_proto::workflow_service::*;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) fn event(event_id: i64, event_type: EventType) -> HistoryEvent {
    HistoryEvent {
        event_id,
        timestamp: 0,
        event_type,
        attributes: None,
    }
}

pub(crate) fn decision_task_response(
    task_token: Vec<u8>,
    attempt: i64,
) -> PollForDecisionTaskResponse {
    PollForDecisionTaskResponse {
        task_token,
        workflow_execution: Some(WorkflowExecution::new("wf-1", "run-1")),
        workflow_type: Some(WorkflowType {
            name: "TestWorkflow".to_string(),
        }),
        started_event_id: 3,
        attempt,
        ..Default::default()
    }
}

/// Counter/timer recorder for asserting on emitted metrics.
#[derive(Default)]
pub(crate) struct RecordingMetrics {
    counters: Mutex<HashMap<&'static str, u64>>,
    timers: Mutex<Vec<(&'static str, Duration)>>,
}

impl RecordingMetrics {
    pub(crate) fn counter_value(&self, name: &'static str) -> u64 {
        *self.counters.lock().unwrap().get(name).unwrap_or(&0)
    }

    pub(crate) fn timer_count(&self, name: &'static str) -> usize {
        self.timers
            .lock()
            .unwrap()
            .iter()
            .filter(|(recorded, _)| *recorded == name)
            .count()
    }
}

impl WorkerMetrics for RecordingMetrics {
    fn increment_counter(&self, name: &'static str) {
        *self.counters.lock().unwrap().entry(name).or_insert(0) += 1;
    }

    fn record_timer(&self, name: &'static str, elapsed: Duration) {
        self.timers.lock().unwrap().push((name, elapsed));
    }
}

/// Scriptable in-memory workflow service: responses are queued per RPC and
/// every request is recorded for assertions. Empty queues yield empty
/// responses, which pollers treat as "no task".
#[derive(Default)]
pub(crate) struct MockService {
    hang_decision_polls: AtomicBool,

    decision_polls: Mutex<VecDeque<Result<PollForDecisionTaskResponse, RelayError>>>,
    completed_responses: Mutex<VecDeque<RespondDecisionTaskCompletedResponse>>,
    heartbeat_responses: Mutex<VecDeque<RecordActivityTaskHeartbeatResponse>>,
    activity_polls: Mutex<VecDeque<Result<PollForActivityTaskResponse, RelayError>>>,
    history_responses: Mutex<VecDeque<Result<GetWorkflowExecutionHistoryResponse, RelayError>>>,

    decision_poll_requests: Mutex<Vec<PollForDecisionTaskRequest>>,
    completed_requests: Mutex<Vec<RespondDecisionTaskCompletedRequest>>,
    failed_requests: Mutex<Vec<RespondDecisionTaskFailedRequest>>,
    query_requests: Mutex<Vec<RespondQueryTaskCompletedRequest>>,
    activity_poll_requests: Mutex<Vec<PollForActivityTaskRequest>>,
    heartbeat_requests: Mutex<Vec<RecordActivityTaskHeartbeatRequest>>,
    activity_completed: Mutex<Vec<RespondActivityTaskCompletedRequest>>,
    activity_failed: Mutex<Vec<RespondActivityTaskFailedRequest>>,
    activity_canceled: Mutex<Vec<RespondActivityTaskCanceledRequest>>,
    activity_completed_by_id: Mutex<Vec<RespondActivityTaskCompletedByIdRequest>>,
    activity_failed_by_id: Mutex<Vec<RespondActivityTaskFailedByIdRequest>>,
    activity_canceled_by_id: Mutex<Vec<RespondActivityTaskCanceledByIdRequest>>,
    history_requests: Mutex<Vec<GetWorkflowExecutionHistoryRequest>>,
    reset_sticky_requests: Mutex<Vec<ResetStickyTaskListRequest>>,
}

impl MockService {
    pub(crate) fn hang_decision_polls(&self) {
        self.hang_decision_polls.store(true, Ordering::SeqCst);
    }

    pub(crate) fn push_decision_poll(
        &self,
        response: Result<PollForDecisionTaskResponse, RelayError>,
    ) {
        self.decision_polls.lock().unwrap().push_back(response);
    }

    pub(crate) fn push_completed_response(&self, response: RespondDecisionTaskCompletedResponse) {
        self.completed_responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn push_heartbeat_response(&self, response: RecordActivityTaskHeartbeatResponse) {
        self.heartbeat_responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn heartbeat_requests(&self) -> Vec<RecordActivityTaskHeartbeatRequest> {
        self.heartbeat_requests.lock().unwrap().clone()
    }

    pub(crate) fn push_activity_poll(
        &self,
        response: Result<PollForActivityTaskResponse, RelayError>,
    ) {
        self.activity_polls.lock().unwrap().push_back(response);
    }

    pub(crate) fn push_history_response(
        &self,
        response: Result<GetWorkflowExecutionHistoryResponse, RelayError>,
    ) {
        self.history_responses.lock().unwrap().push_back(response);
    }

    pub(crate) fn completed_requests(&self) -> Vec<RespondDecisionTaskCompletedRequest> {
        self.completed_requests.lock().unwrap().clone()
    }

    pub(crate) fn failed_requests(&self) -> Vec<RespondDecisionTaskFailedRequest> {
        self.failed_requests.lock().unwrap().clone()
    }

    pub(crate) fn query_requests(&self) -> Vec<RespondQueryTaskCompletedRequest> {
        self.query_requests.lock().unwrap().clone()
    }

    pub(crate) fn activity_poll_requests(&self) -> Vec<PollForActivityTaskRequest> {
        self.activity_poll_requests.lock().unwrap().clone()
    }

    pub(crate) fn activity_completed_requests(&self) -> Vec<RespondActivityTaskCompletedRequest> {
        self.activity_completed.lock().unwrap().clone()
    }

    pub(crate) fn activity_failed_requests(&self) -> Vec<RespondActivityTaskFailedRequest> {
        self.activity_failed.lock().unwrap().clone()
    }

    pub(crate) fn activity_canceled_requests(&self) -> Vec<RespondActivityTaskCanceledRequest> {
        self.activity_canceled.lock().unwrap().clone()
    }

    pub(crate) fn activity_completed_by_id_requests(
        &self,
    ) -> Vec<RespondActivityTaskCompletedByIdRequest> {
        self.activity_completed_by_id.lock().unwrap().clone()
    }

    pub(crate) fn history_requests(&self) -> Vec<GetWorkflowExecutionHistoryRequest> {
        self.history_requests.lock().unwrap().clone()
    }

    pub(crate) fn reset_sticky_requests(&self) -> Vec<ResetStickyTaskListRequest> {
        self.reset_sticky_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl WorkflowService for MockService {
    type Error = RelayError;

    async fn poll_for_decision_task(
        &self,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, RelayError> {
        self.decision_poll_requests.lock().unwrap().push(request);
        if self.hang_decision_polls.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        let queued = self.decision_polls.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => Ok(PollForDecisionTaskResponse::default()),
        }
    }

    async fn respond_decision_task_completed(
        &self,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, RelayError> {
        self.completed_requests.lock().unwrap().push(request);
        let queued = self.completed_responses.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_default())
    }

    async fn respond_decision_task_failed(
        &self,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<RespondDecisionTaskFailedResponse, RelayError> {
        self.failed_requests.lock().unwrap().push(request);
        Ok(RespondDecisionTaskFailedResponse::default())
    }

    async fn respond_query_task_completed(
        &self,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<RespondQueryTaskCompletedResponse, RelayError> {
        self.query_requests.lock().unwrap().push(request);
        Ok(RespondQueryTaskCompletedResponse::default())
    }

    async fn poll_for_activity_task(
        &self,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, RelayError> {
        self.activity_poll_requests.lock().unwrap().push(request);
        let queued = self.activity_polls.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => Ok(PollForActivityTaskResponse::default()),
        }
    }

    async fn record_activity_task_heartbeat(
        &self,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, RelayError> {
        self.heartbeat_requests.lock().unwrap().push(request);
        let queued = self.heartbeat_responses.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_default())
    }

    async fn respond_activity_task_completed(
        &self,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<RespondActivityTaskCompletedResponse, RelayError> {
        self.activity_completed.lock().unwrap().push(request);
        Ok(RespondActivityTaskCompletedResponse::default())
    }

    async fn respond_activity_task_failed(
        &self,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<RespondActivityTaskFailedResponse, RelayError> {
        self.activity_failed.lock().unwrap().push(request);
        Ok(RespondActivityTaskFailedResponse::default())
    }

    async fn respond_activity_task_canceled(
        &self,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<RespondActivityTaskCanceledResponse, RelayError> {
        self.activity_canceled.lock().unwrap().push(request);
        Ok(RespondActivityTaskCanceledResponse::default())
    }

    async fn respond_activity_task_completed_by_id(
        &self,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<RespondActivityTaskCompletedResponse, RelayError> {
        self.activity_completed_by_id.lock().unwrap().push(request);
        Ok(RespondActivityTaskCompletedResponse::default())
    }

    async fn respond_activity_task_failed_by_id(
        &self,
        request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<RespondActivityTaskFailedResponse, RelayError> {
        self.activity_failed_by_id.lock().unwrap().push(request);
        Ok(RespondActivityTaskFailedResponse::default())
    }

    async fn respond_activity_task_canceled_by_id(
        &self,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<RespondActivityTaskCanceledResponse, RelayError> {
        self.activity_canceled_by_id.lock().unwrap().push(request);
        Ok(RespondActivityTaskCanceledResponse::default())
    }

    async fn get_workflow_execution_history(
        &self,
        request: GetWorkflowExecutionHistoryRequest,
    ) -> Result<GetWorkflowExecutionHistoryResponse, RelayError> {
        self.history_requests.lock().unwrap().push(request);
        let queued = self.history_responses.lock().unwrap().pop_front();
        match queued {
            Some(response) => response,
            None => Ok(GetWorkflowExecutionHistoryResponse::default()),
        }
    }

    async fn reset_sticky_task_list(
        &self,
        request: ResetStickyTaskListRequest,
    ) -> Result<ResetStickyTaskListResponse, RelayError> {
        self.reset_sticky_requests.lock().unwrap().push(request);
        Ok(ResetStickyTaskListResponse::default())
    }
}
