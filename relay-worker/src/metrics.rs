//! Metric seam for the worker.
//!
//! Metric sinks live outside the worker core; pollers and handlers report
//! through this trait and the worker runs fine with the no-op default.

use std::time::Duration;

pub trait WorkerMetrics: Send + Sync {
    fn increment_counter(&self, name: &'static str);
    fn record_timer(&self, name: &'static str, elapsed: Duration);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl WorkerMetrics for NoopMetrics {
    fn increment_counter(&self, _name: &'static str) {}
    fn record_timer(&self, _name: &'static str, _elapsed: Duration) {}
}

pub mod counters {
    pub const DECISION_POLL_TOTAL: &str = "decision_poll_total";
    pub const DECISION_POLL_FAILED_TOTAL: &str = "decision_poll_failed_total";
    pub const DECISION_POLL_TRANSIENT_FAILED_TOTAL: &str = "decision_poll_transient_failed_total";
    pub const DECISION_POLL_NO_TASK_TOTAL: &str = "decision_poll_no_task_total";
    pub const DECISION_POLL_SUCCEED_TOTAL: &str = "decision_poll_succeed_total";
    pub const DECISION_TASK_COMPLETED_TOTAL: &str = "decision_task_completed_total";
    pub const DECISION_TASK_FORCE_COMPLETED_TOTAL: &str = "decision_task_force_completed_total";
    pub const DECISION_EXECUTION_FAILED_TOTAL: &str = "decision_execution_failed_total";
    pub const DECISION_RESPONSE_FAILED_TOTAL: &str = "decision_response_failed_total";
    pub const STICKY_CACHE_EVICT_TOTAL: &str = "sticky_cache_evict_total";

    pub const ACTIVITY_POLL_TOTAL: &str = "activity_poll_total";
    pub const ACTIVITY_POLL_FAILED_TOTAL: &str = "activity_poll_failed_total";
    pub const ACTIVITY_POLL_TRANSIENT_FAILED_TOTAL: &str = "activity_poll_transient_failed_total";
    pub const ACTIVITY_POLL_NO_TASK_TOTAL: &str = "activity_poll_no_task_total";
    pub const ACTIVITY_POLL_SUCCEED_TOTAL: &str = "activity_poll_succeed_total";
    pub const ACTIVITY_EXECUTION_FAILED_TOTAL: &str = "activity_execution_failed_total";
    pub const ACTIVITY_RESPONSE_FAILED_TOTAL: &str = "activity_response_failed_total";
    pub const ACTIVITY_TASK_COMPLETED_TOTAL: &str = "activity_task_completed_total";
    pub const ACTIVITY_TASK_FAILED_TOTAL: &str = "activity_task_failed_total";
    pub const ACTIVITY_TASK_CANCELED_TOTAL: &str = "activity_task_canceled_total";
    pub const ACTIVITY_TASK_COMPLETED_BY_ID_TOTAL: &str = "activity_task_completed_by_id_total";
    pub const ACTIVITY_TASK_FAILED_BY_ID_TOTAL: &str = "activity_task_failed_by_id_total";
    pub const ACTIVITY_TASK_CANCELED_BY_ID_TOTAL: &str = "activity_task_canceled_by_id_total";

    pub const LOCAL_ACTIVITY_TOTAL: &str = "local_activity_total";
    pub const LOCAL_ACTIVITY_FAILED_TOTAL: &str = "local_activity_failed_total";
    pub const LOCAL_ACTIVITY_PANIC_TOTAL: &str = "local_activity_panic_total";
    pub const LOCAL_ACTIVITY_CANCELED_TOTAL: &str = "local_activity_canceled_total";
    pub const LOCAL_ACTIVITY_TIMEOUT_TOTAL: &str = "local_activity_timeout_total";

    pub const WORKFLOW_GET_HISTORY_TOTAL: &str = "workflow_get_history_total";
    pub const WORKFLOW_GET_HISTORY_FAILED_TOTAL: &str = "workflow_get_history_failed_total";
    pub const WORKFLOW_GET_HISTORY_SUCCEED_TOTAL: &str = "workflow_get_history_succeed_total";
}

pub mod timers {
    pub const DECISION_POLL_LATENCY: &str = "decision_poll_latency";
    pub const DECISION_SCHEDULED_TO_START_LATENCY: &str = "decision_scheduled_to_start_latency";
    pub const DECISION_EXECUTION_LATENCY: &str = "decision_execution_latency";
    pub const DECISION_RESPONSE_LATENCY: &str = "decision_response_latency";

    pub const ACTIVITY_POLL_LATENCY: &str = "activity_poll_latency";
    pub const ACTIVITY_SCHEDULED_TO_START_LATENCY: &str = "activity_scheduled_to_start_latency";
    pub const ACTIVITY_EXECUTION_LATENCY: &str = "activity_execution_latency";
    pub const ACTIVITY_RESPONSE_LATENCY: &str = "activity_response_latency";
    pub const ACTIVITY_END_TO_END_LATENCY: &str = "activity_end_to_end_latency";

    pub const LOCAL_ACTIVITY_EXECUTION_LATENCY: &str = "local_activity_execution_latency";

    pub const WORKFLOW_GET_HISTORY_LATENCY: &str = "workflow_get_history_latency";
}
