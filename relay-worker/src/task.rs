//! Task wrappers handed from pollers to handlers.

use crate::history::HistoryIterator;
use crate::local_activity::LocalActivityResult;
use relay_proto::shared::WorkflowExecution;
use relay_proto::workflow_service::{PollForActivityTaskResponse, PollForDecisionTaskResponse};
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// A decision task together with the channels that tie its processing loop to
/// in-flight local activities.
///
/// `done` observes the owning processing loop: once that loop finishes, any
/// local activity still holding a sender drops its result instead of
/// blocking. `la_result_tx` is cloned into each spawned local activity;
/// `la_result_rx` is taken by the workflow handler, which is the only
/// consumer of this task's results. The channels are attached before handler
/// dispatch and reattached to tasks received through heartbeat completion.
pub struct WorkflowTask {
    pub task: PollForDecisionTaskResponse,
    pub history_iterator: HistoryIterator,
    pub done: Option<watch::Receiver<bool>>,
    pub la_result_tx: Option<mpsc::Sender<LocalActivityResult>>,
    pub la_result_rx: Option<mpsc::Receiver<LocalActivityResult>>,
}

impl WorkflowTask {
    pub(crate) fn attach_channels(
        &mut self,
        done: watch::Receiver<bool>,
        la_result_tx: mpsc::Sender<LocalActivityResult>,
        la_result_rx: Option<mpsc::Receiver<LocalActivityResult>>,
    ) {
        self.done = Some(done);
        self.la_result_tx = Some(la_result_tx);
        if la_result_rx.is_some() {
            self.la_result_rx = la_result_rx;
        }
    }
}

/// Side-band task issued when a workflow is evicted from the in-memory cache:
/// tells the server to stop dispatching to the sticky queue for it.
#[derive(Debug, Clone)]
pub struct ResetStickinessTask {
    pub execution: WorkflowExecution,
}

/// An activity task plus the poll time used for end-to-end latency.
#[derive(Debug)]
pub struct ActivityTask {
    pub task: PollForActivityTaskResponse,
    pub poll_start_time: Instant,
}
