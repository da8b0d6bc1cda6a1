//! Error types for the Relay client.
//!
//! This module defines all error types that can occur when working with
//! workflows and activities, plus the panic-capture helper used to turn
//! programmer errors into reportable failures.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use thiserror::Error;

/// Error type for canceled operations.
///
/// Carries the cancellation details supplied by the canceling side; an empty
/// details payload is valid and means "no details".
#[derive(Debug, Clone, Default, Error)]
#[error("CanceledError: details={details:?}")]
pub struct CanceledError {
    pub details: Vec<u8>,
}

impl CanceledError {
    pub fn new(details: Vec<u8>) -> Self {
        Self { details }
    }

    pub fn details(&self) -> &[u8] {
        &self.details
    }
}

/// Error type for timeouts.
#[derive(Debug, Clone, Error)]
#[error("TimeoutError: timeout_type={timeout_type}")]
pub struct TimeoutError {
    pub timeout_type: TimeoutType,
    pub details: Vec<u8>,
}

impl TimeoutError {
    pub fn new(timeout_type: TimeoutType, details: Vec<u8>) -> Self {
        Self {
            timeout_type,
            details,
        }
    }
}

/// The kind of timeout that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeoutType {
    StartToClose,
    ScheduleToStart,
    ScheduleToClose,
    Heartbeat,
}

impl fmt::Display for TimeoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutType::StartToClose => write!(f, "START_TO_CLOSE"),
            TimeoutType::ScheduleToStart => write!(f, "SCHEDULE_TO_START"),
            TimeoutType::ScheduleToClose => write!(f, "SCHEDULE_TO_CLOSE"),
            TimeoutType::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// A captured panic, carrying the panic message and the stack trace taken at
/// the capture site.
///
/// Illegal state transitions in the decision state machines and panics inside
/// user code are both surfaced as this type so that the decision task can be
/// failed without tearing the worker down.
#[derive(Debug, Clone, Error)]
#[error("PanicError: {message}")]
pub struct PanicError {
    pub message: String,
    pub stack_trace: String,
}

impl PanicError {
    pub fn new(message: impl Into<String>, stack_trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// Build a `PanicError` from a payload recovered by `catch_unwind`.
    pub fn from_panic_payload(payload: &(dyn Any + Send), stack_trace: impl Into<String>) -> Self {
        Self::new(panic_message(payload), stack_trace)
    }
}

/// Extract a human-readable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `f`, converting a panic into a `PanicError` with a captured backtrace.
///
/// The process survives; the caller decides how to report the failure.
pub fn catch_panic<T>(f: impl FnOnce() -> T) -> Result<T, PanicError> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => Err(PanicError::from_panic_payload(
            payload.as_ref(),
            Backtrace::force_capture().to_string(),
        )),
    }
}

/// Server-reported error types.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("EntityNotExistsError: {message}")]
    EntityNotExists { message: String },

    #[error("BadRequestError: {message}")]
    BadRequest { message: String },

    #[error("NamespaceNotActiveError: {message}")]
    NamespaceNotActive { message: String },

    #[error("ServiceBusyError: {message}")]
    ServiceBusy { message: String },

    #[error("InternalServiceError: {message}")]
    InternalService { message: String },

    #[error("QueryFailedError: {message}")]
    QueryFailed { message: String },
}

/// Main error type used across the worker.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Canceled(#[from] CanceledError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Panic(#[from] PanicError),

    #[error(transparent)]
    Server(#[from] ServerError),

    /// The surrounding context was canceled without typed details, e.g. by
    /// worker shutdown reaching an in-flight activity.
    #[error("context canceled")]
    ContextCanceled,

    /// An execution ran past its computed deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The activity will be completed asynchronously; there is nothing to
    /// report for it now.
    #[error("activity result is pending")]
    ResultPending,

    /// Orderly-shutdown sentinel returned by pollers when the worker stop
    /// signal fires. Never reported to the server and never retried.
    #[error("worker is stopping")]
    WorkerStopped,

    /// A decision-task heartbeat completion failed; the task must not be
    /// responded to again.
    #[error("decision task heartbeat failed: {0}")]
    DecisionHeartbeat(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Generic(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

/// Whether an RPC error is transient and worth retrying with backoff.
pub fn is_service_transient_error(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::Transport(_)
            | RelayError::Server(ServerError::ServiceBusy { .. })
            | RelayError::Server(ServerError::InternalService { .. })
    )
}

/// Whether an error is the orderly-shutdown sentinel.
pub fn is_stop_error(err: &RelayError) -> bool {
    matches!(err, RelayError::WorkerStopped)
}

pub fn is_canceled_error(err: &RelayError) -> bool {
    matches!(err, RelayError::Canceled(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_panic_captures_message_and_stack() {
        let err = catch_panic(|| -> () { panic!("state machine drift: {}", 42) }).unwrap_err();
        assert_eq!(err.message, "state machine drift: 42");
        assert!(!err.stack_trace.is_empty());
    }

    #[test]
    fn catch_panic_passes_through_success() {
        assert_eq!(catch_panic(|| 7).unwrap(), 7);
    }

    #[test]
    fn transient_classification() {
        assert!(is_service_transient_error(&RelayError::Transport(
            "connection reset".into()
        )));
        assert!(is_service_transient_error(&RelayError::Server(
            ServerError::ServiceBusy {
                message: "throttled".into()
            }
        )));
        assert!(!is_service_transient_error(&RelayError::Server(
            ServerError::EntityNotExists {
                message: "no such workflow".into()
            }
        )));
        assert!(!is_service_transient_error(&RelayError::WorkerStopped));
    }

    #[test]
    fn stop_sentinel_is_distinguishable() {
        assert!(is_stop_error(&RelayError::WorkerStopped));
        assert!(!is_stop_error(&RelayError::DeadlineExceeded));
        assert!(!is_stop_error(&RelayError::ContextCanceled));
    }
}
