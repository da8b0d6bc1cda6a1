//! Heartbeat manager for long-running activities.

use crate::SharedWorkflowService;
use relay_proto::workflow_service::RecordActivityTaskHeartbeatRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically records activity heartbeats and relays a server-side
/// cancellation request back to the running activity.
pub struct HeartbeatManager {
    service: SharedWorkflowService,
    identity: String,
}

impl HeartbeatManager {
    pub fn new(service: SharedWorkflowService, identity: impl Into<String>) -> Self {
        Self {
            service,
            identity: identity.into(),
        }
    }

    /// Start a heartbeat task for one activity execution.
    ///
    /// Beats at 80% of the heartbeat timeout, carrying the latest details
    /// recorded by the activity, until either `finished_rx` fires (the
    /// activity completed) or the server requests cancellation, which
    /// cancels `server_cancel` and stops the loop.
    pub fn start_heartbeat(
        &self,
        task_token: Vec<u8>,
        heartbeat_timeout: Duration,
        finished_rx: oneshot::Receiver<()>,
        server_cancel: CancellationToken,
        details: Arc<Mutex<Option<Vec<u8>>>>,
    ) -> tokio::task::JoinHandle<()> {
        let service = self.service.clone();
        let identity = self.identity.clone();
        let interval = heartbeat_timeout.mul_f32(0.8);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut finished_rx = finished_rx;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let current_details = details.lock().await.clone();
                        let request = RecordActivityTaskHeartbeatRequest {
                            task_token: task_token.clone(),
                            details: current_details,
                            identity: identity.clone(),
                        };
                        match service.record_activity_task_heartbeat(request).await {
                            Ok(response) => {
                                if response.cancel_requested {
                                    info!("activity cancellation requested by server");
                                    server_cancel.cancel();
                                    break;
                                }
                            }
                            Err(err) => {
                                // A single missed beat is not fatal; keep going.
                                warn!(error = %err, "activity heartbeat failed");
                            }
                        }
                    }
                    _ = &mut finished_rx => {
                        debug!("heartbeat stopped; activity finished");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockService;
    use relay_proto::workflow_service::RecordActivityTaskHeartbeatResponse;

    #[tokio::test(start_paused = true)]
    async fn heartbeats_until_activity_finishes() {
        let service = Arc::new(MockService::default());
        let manager = HeartbeatManager::new(service.clone(), "test-worker");
        let (finished_tx, finished_rx) = oneshot::channel();
        let details = Arc::new(Mutex::new(Some(b"progress".to_vec())));

        let handle = manager.start_heartbeat(
            b"token".to_vec(),
            Duration::from_secs(10),
            finished_rx,
            CancellationToken::new(),
            details,
        );

        tokio::time::sleep(Duration::from_secs(20)).await;
        finished_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("heartbeat loop should stop when the activity finishes")
            .unwrap();

        let requests = service.heartbeat_requests();
        assert!(requests.len() >= 2);
        assert_eq!(requests[0].details, Some(b"progress".to_vec()));
        assert_eq!(requests[0].identity, "test-worker");
    }

    #[tokio::test(start_paused = true)]
    async fn server_cancellation_stops_the_loop_and_signals_the_activity() {
        let service = Arc::new(MockService::default());
        service.push_heartbeat_response(RecordActivityTaskHeartbeatResponse {
            cancel_requested: true,
        });
        let manager = HeartbeatManager::new(service.clone(), "test-worker");
        let (_finished_tx, finished_rx) = oneshot::channel();
        let server_cancel = CancellationToken::new();

        let handle = manager.start_heartbeat(
            b"token".to_vec(),
            Duration::from_secs(10),
            finished_rx,
            server_cancel.clone(),
            Arc::new(Mutex::new(None)),
        );

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("heartbeat loop should stop on server cancellation")
            .unwrap();
        assert!(server_cancel.is_cancelled());
    }
}
