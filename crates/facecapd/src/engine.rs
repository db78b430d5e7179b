use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use facecap_core::{verify_liveness, FaceDetector, PipelineConfig, VerificationOutcome};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("verification timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Verify {
        image: String,
        reply: oneshot::Sender<VerificationOutcome>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run a capture through decode, detection, quality gates and persistence.
    ///
    /// The timeout covers queueing as well as processing. A request that times
    /// out keeps running on the engine thread and its result is dropped.
    pub async fn verify(
        &self,
        image: String,
        timeout: Duration,
    ) -> Result<VerificationOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = async {
            self.tx
                .send(EngineRequest::Verify {
                    image,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| EngineError::ChannelClosed)?;
            reply_rx.await.map_err(|_| EngineError::ChannelClosed)
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| EngineError::Timeout(timeout))?
    }

    /// Whether the engine thread is still receiving requests.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Detection and image codecs are CPU-bound, so they run off the async
/// runtime. Requests are processed one at a time in arrival order.
pub fn spawn_engine(
    detector: Box<dyn FaceDetector>,
    config: PipelineConfig,
) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("facecap-engine".into())
        .spawn(move || {
            tracing::info!(capture_dir = %config.capture_dir.display(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Verify { image, reply } => {
                        let run = || verify_liveness(&image, detector.as_ref(), &config);
                        let outcome = panic::catch_unwind(AssertUnwindSafe(run))
                            .unwrap_or_else(|payload| {
                                let msg = panic_message(payload.as_ref());
                                tracing::error!(error = %msg, "verification panicked");
                                VerificationOutcome::rejected(format!("Processing error: {msg}"))
                            });
                        let _ = reply.send(outcome);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "verification panicked".to_string()
    }
}
