//! Protocol types for the Relay orchestration service.
//!
//! This crate defines the data structures exchanged with the server
//! (workflow history events, decisions, task lists) and the
//! [`workflow_service::WorkflowService`] trait that transports implement.

pub mod shared;
pub mod workflow_service;
