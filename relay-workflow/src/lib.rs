//! Decision state machine engine.
//!
//! Per-workflow bookkeeping that tracks the lifecycle of every commanded
//! side effect from local intent through server acknowledgement to terminal
//! outcome.

pub mod state_machine;

pub use state_machine::*;
