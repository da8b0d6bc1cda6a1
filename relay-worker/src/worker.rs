//! Worker configuration and the poll/process loop driver.

use crate::metrics::{NoopMetrics, WorkerMetrics};
use crate::pollers::TaskPoller;
use relay_core::is_stop_error;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Pause after a failed poll so a broken connection doesn't hot-loop.
const POLL_FAILURE_BACKOFF: Duration = Duration::from_millis(200);

/// Default sticky schedule-to-start timeout.
pub const STICKY_SCHEDULE_TO_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a poller needs from its hosting worker.
#[derive(Clone)]
pub struct WorkerExecutionParameters {
    pub namespace: String,
    pub task_list: String,
    pub identity: String,
    pub binary_checksum: String,
    pub disable_sticky_execution: bool,
    pub sticky_schedule_to_start_timeout: Duration,
    /// Rate hint attached to activity polls for server-side dispatch pacing.
    pub task_list_activities_per_second: f64,
    /// Process-wide stop signal observed by every poller.
    pub stop: CancellationToken,
    pub metrics: Arc<dyn WorkerMetrics>,
}

impl Default for WorkerExecutionParameters {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            task_list: String::new(),
            identity: default_identity(),
            binary_checksum: String::new(),
            disable_sticky_execution: false,
            sticky_schedule_to_start_timeout: STICKY_SCHEDULE_TO_START_TIMEOUT,
            task_list_activities_per_second: 100_000.0,
            stop: CancellationToken::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }
}

fn default_identity() -> String {
    format!(
        "relay-worker@{}-pid-{}",
        std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        std::process::id()
    )
}

/// Drive one poller until the stop sentinel surfaces. Poll errors are logged
/// and retried after a short pause; processing errors are logged and the
/// loop continues with the next poll.
pub async fn run_poller<P: TaskPoller>(poller: Arc<P>) {
    loop {
        let task = match poller.poll_task().await {
            Ok(task) => task,
            Err(err) if is_stop_error(&err) => {
                debug!("poller stopping");
                return;
            }
            Err(err) => {
                warn!(error = %err, "poll failed");
                tokio::time::sleep(POLL_FAILURE_BACKOFF).await;
                continue;
            }
        };
        match poller.process_task(task).await {
            Ok(()) => {}
            Err(err) if is_stop_error(&err) => {
                debug!("poller stopping");
                return;
            }
            Err(err) => error!(error = %err, "task processing failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::RelayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingPoller {
        polls: AtomicU32,
        processed: AtomicU32,
        stop_after: u32,
    }

    #[async_trait]
    impl TaskPoller for CountingPoller {
        type Task = u32;

        async fn poll_task(&self) -> Result<u32, RelayError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n >= self.stop_after {
                Err(RelayError::WorkerStopped)
            } else {
                Ok(n)
            }
        }

        async fn process_task(&self, _task: u32) -> Result<(), RelayError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_poller_drains_until_stop_sentinel() {
        let poller = Arc::new(CountingPoller {
            polls: AtomicU32::new(0),
            processed: AtomicU32::new(0),
            stop_after: 3,
        });
        run_poller(poller.clone()).await;
        assert_eq!(poller.processed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn default_identity_names_host_and_pid() {
        let params = WorkerExecutionParameters::default();
        assert!(params.identity.starts_with("relay-worker@"));
        assert!(params.identity.contains("-pid-"));
    }
}
