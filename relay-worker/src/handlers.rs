//! Handler seams and result classification.
//!
//! Workflow and activity handlers are external collaborators: the workflow
//! handler replays user code deterministically, the activity handler runs
//! registered activity functions. The pollers only depend on these traits.

use crate::task::WorkflowTask;
use async_trait::async_trait;
use relay_core::RelayError;
use relay_proto::workflow_service::*;
use std::time::Instant;

/// What the workflow handler asks the poller to send for a processed task.
#[derive(Debug, Clone)]
pub enum WorkflowTaskCompletedRequest {
    Completed(RespondDecisionTaskCompletedRequest),
    Failed(RespondDecisionTaskFailedRequest),
    QueryCompleted(RespondQueryTaskCompletedRequest),
}

/// Callback handed to the workflow handler for early (heartbeat) completion
/// of a decision task before its server-side timeout elapses.
#[async_trait]
pub trait DecisionHeartbeat: Send {
    /// Sends the completion now. When the server piggybacks a follow-up
    /// decision task, it is returned with the processing channels already
    /// attached and the handler continues with it.
    async fn force_complete(
        &mut self,
        request: RespondDecisionTaskCompletedRequest,
        start_time: Instant,
    ) -> Result<Option<WorkflowTask>, RelayError>;
}

#[async_trait]
pub trait WorkflowTaskHandler: Send + Sync {
    /// Process one decision task. Returning `Ok(None)` means the task was
    /// already answered (e.g. through the heartbeat callback) and there is
    /// nothing left to send.
    async fn process_workflow_task(
        &self,
        task: &mut WorkflowTask,
        heartbeat: &mut dyn DecisionHeartbeat,
    ) -> Result<Option<WorkflowTaskCompletedRequest>, RelayError>;
}

/// Classified outcome of one activity execution.
#[derive(Debug, Clone)]
pub enum ActivityTaskResponse {
    Completed(RespondActivityTaskCompletedRequest),
    Failed(RespondActivityTaskFailedRequest),
    Canceled(RespondActivityTaskCanceledRequest),
    /// The activity will complete asynchronously; nothing to report.
    Pending,
}

/// Same classification, reported by workflow/activity id instead of token.
#[derive(Debug, Clone)]
pub enum ActivityTaskResponseById {
    Completed(RespondActivityTaskCompletedByIdRequest),
    Failed(RespondActivityTaskFailedByIdRequest),
    Canceled(RespondActivityTaskCanceledByIdRequest),
    Pending,
}

#[async_trait]
pub trait ActivityTaskHandler: Send + Sync {
    async fn execute(
        &self,
        task_list: &str,
        task: PollForActivityTaskResponse,
    ) -> Result<ActivityTaskResponse, RelayError>;
}

/// Map an activity execution outcome to the report request to send.
///
/// A typed cancellation keeps its details on the wire; a bare context cancel
/// carries none. A pending result produces no report at all.
pub fn activity_result_to_respond_request(
    identity: &str,
    task_token: Vec<u8>,
    result: Result<Option<Vec<u8>>, RelayError>,
) -> ActivityTaskResponse {
    match result {
        Err(RelayError::ResultPending) => ActivityTaskResponse::Pending,
        Ok(payload) => ActivityTaskResponse::Completed(RespondActivityTaskCompletedRequest {
            task_token,
            result: payload,
            identity: identity.to_string(),
        }),
        Err(RelayError::Canceled(err)) => {
            ActivityTaskResponse::Canceled(RespondActivityTaskCanceledRequest {
                task_token,
                details: Some(err.details),
                identity: identity.to_string(),
            })
        }
        Err(RelayError::ContextCanceled) => {
            ActivityTaskResponse::Canceled(RespondActivityTaskCanceledRequest {
                task_token,
                details: None,
                identity: identity.to_string(),
            })
        }
        Err(err) => ActivityTaskResponse::Failed(RespondActivityTaskFailedRequest {
            task_token,
            reason: Some(error_reason(&err)),
            details: Some(error_details(&err)),
            identity: identity.to_string(),
        }),
    }
}

pub fn activity_result_to_respond_request_by_id(
    identity: &str,
    namespace: &str,
    workflow_id: &str,
    run_id: &str,
    activity_id: &str,
    result: Result<Option<Vec<u8>>, RelayError>,
) -> ActivityTaskResponseById {
    let identity = identity.to_string();
    let namespace = namespace.to_string();
    let workflow_id = workflow_id.to_string();
    let run_id = run_id.to_string();
    let activity_id = activity_id.to_string();
    match result {
        Err(RelayError::ResultPending) => ActivityTaskResponseById::Pending,
        Ok(payload) => {
            ActivityTaskResponseById::Completed(RespondActivityTaskCompletedByIdRequest {
                namespace,
                workflow_id,
                run_id,
                activity_id,
                result: payload,
                identity,
            })
        }
        Err(RelayError::Canceled(err)) => {
            ActivityTaskResponseById::Canceled(RespondActivityTaskCanceledByIdRequest {
                namespace,
                workflow_id,
                run_id,
                activity_id,
                details: Some(err.details),
                identity,
            })
        }
        Err(RelayError::ContextCanceled) => {
            ActivityTaskResponseById::Canceled(RespondActivityTaskCanceledByIdRequest {
                namespace,
                workflow_id,
                run_id,
                activity_id,
                details: None,
                identity,
            })
        }
        Err(err) => ActivityTaskResponseById::Failed(RespondActivityTaskFailedByIdRequest {
            namespace,
            workflow_id,
            run_id,
            activity_id,
            reason: Some(error_reason(&err)),
            details: Some(error_details(&err)),
            identity,
        }),
    }
}

fn error_reason(err: &RelayError) -> String {
    match err {
        RelayError::Panic(_) => "PanicError".to_string(),
        RelayError::Timeout(timeout) => format!("TimeoutError: {}", timeout.timeout_type),
        RelayError::DeadlineExceeded => "DeadlineExceeded".to_string(),
        RelayError::Serialization(_) => "SerializationError".to_string(),
        _ => "GenericError".to_string(),
    }
}

fn error_details(err: &RelayError) -> Vec<u8> {
    match err {
        // Keep the stack trace: it is the only clue the server side gets.
        RelayError::Panic(panic) => {
            format!("{}\n{}", panic.message, panic.stack_trace).into_bytes()
        }
        other => other.to_string().into_bytes(),
    }
}
