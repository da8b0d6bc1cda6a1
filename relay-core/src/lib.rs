//! Core types and utilities for the Relay client.
//!
//! This crate provides the error taxonomy, panic capture, and the
//! serialization framework used throughout the worker.

pub mod encoded;
pub mod error;
pub mod types;

pub use encoded::*;
pub use error::*;
pub use types::*;
