//! Lazy, paged retrieval of workflow history.

use crate::metrics::{counters, timers, WorkerMetrics};
use crate::retry::{dynamic_service_retry_policy, retry};
use crate::SharedWorkflowService;
use relay_core::{is_service_transient_error, DataConverter, JsonDataConverter, RelayError};
use relay_proto::shared::{DataBlob, EncodingType, EventType, History, HistoryEvent, WorkflowExecution};
use relay_proto::workflow_service::GetWorkflowExecutionHistoryRequest;
use std::sync::Arc;
use std::time::Instant;

/// Pages through a workflow's history, bounded by the event id of the
/// decision-task-completed event the current task replays up to.
///
/// The iterator is restartable: `reset` clears the page cursor so the next
/// fetch starts from the beginning again.
pub struct HistoryIterator {
    service: SharedWorkflowService,
    namespace: String,
    execution: WorkflowExecution,
    next_page_token: Option<Vec<u8>>,
    max_event_id: i64,
    metrics: Arc<dyn WorkerMetrics>,
}

impl HistoryIterator {
    pub fn new(
        service: SharedWorkflowService,
        namespace: String,
        execution: WorkflowExecution,
        next_page_token: Option<Vec<u8>>,
        max_event_id: i64,
        metrics: Arc<dyn WorkerMetrics>,
    ) -> Self {
        Self {
            service,
            namespace,
            execution,
            next_page_token,
            max_event_id,
            metrics,
        }
    }

    /// Fetch the next page, retrying transient failures with backoff.
    ///
    /// When the page crosses `max_event_id`, the events are truncated
    /// inclusively at that id and the stream ends; the last kept event must
    /// then be a DecisionTaskCompleted or the history is malformed.
    pub async fn get_next_page(&mut self) -> Result<History, RelayError> {
        self.metrics
            .increment_counter(counters::WORKFLOW_GET_HISTORY_TOTAL);
        let start = Instant::now();

        let policy = dynamic_service_retry_policy();
        let service = self.service.clone();
        let namespace = self.namespace.clone();
        let execution = self.execution.clone();
        let next_page_token = self.next_page_token.clone();
        let response = retry(&policy, is_service_transient_error, || {
            let service = service.clone();
            let request = GetWorkflowExecutionHistoryRequest {
                namespace: namespace.clone(),
                execution: execution.clone(),
                next_page_token: next_page_token.clone(),
            };
            async move { service.get_workflow_execution_history(request).await }
        })
        .await
        .map_err(|err| {
            self.metrics
                .increment_counter(counters::WORKFLOW_GET_HISTORY_FAILED_TOTAL);
            err
        })?;

        self.metrics
            .increment_counter(counters::WORKFLOW_GET_HISTORY_SUCCEED_TOTAL);
        self.metrics
            .record_timer(timers::WORKFLOW_GET_HISTORY_LATENCY, start.elapsed());

        let mut history = match response.raw_history {
            Some(blobs) => decode_raw_history(blobs)?,
            None => response.history.unwrap_or_default(),
        };
        let mut next_page_token = response.next_page_token;

        if let (Some(first), Some(last)) = (history.events.first(), history.events.last()) {
            if self.max_event_id > 0 && last.event_id > self.max_event_id {
                // Event ids are dense within a page, so the index of
                // max_event_id follows from the first id on the page.
                let keep = (self.max_event_id - first.event_id + 1).max(0) as usize;
                history.events.truncate(keep);
                match history.events.last() {
                    Some(event) if event.event_type == EventType::DecisionTaskCompleted => {}
                    _ => {
                        return Err(RelayError::Generic(format!(
                            "history page truncated at event id {} which is not a DecisionTaskCompleted event",
                            self.max_event_id
                        )))
                    }
                }
                next_page_token = None;
            }
        }

        self.next_page_token = next_page_token;
        Ok(history)
    }

    /// Clear the page cursor; iteration restarts from the first page.
    pub fn reset(&mut self) {
        self.next_page_token = None;
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page_token.is_some()
    }
}

fn decode_raw_history(blobs: Vec<DataBlob>) -> Result<History, RelayError> {
    let converter = JsonDataConverter;
    let mut events = Vec::new();
    for blob in blobs {
        match blob.encoding_type {
            EncodingType::Json => {
                let batch: Vec<HistoryEvent> = converter.decode(&blob.data)?;
                events.extend(batch);
            }
            other => {
                return Err(RelayError::Serialization(format!(
                    "unsupported raw history encoding {:?}",
                    other
                )))
            }
        }
    }
    Ok(History { events })
}
