//! Relay worker implementation.
//!
//! This crate provides the task pollers that long-poll the orchestration
//! service for decision and activity tasks, the in-process local-activity
//! pipeline, and the lazy history iterator.

pub mod handlers;
pub mod heartbeat;
pub mod history;
pub mod local_activity;
pub mod metrics;
pub mod pollers;
pub mod retry;
pub mod task;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

use relay_core::RelayError;
use relay_proto::workflow_service::WorkflowService;
use std::sync::Arc;

/// Shared handle to the orchestration service.
pub type SharedWorkflowService = Arc<dyn WorkflowService<Error = RelayError> + Send + Sync>;
