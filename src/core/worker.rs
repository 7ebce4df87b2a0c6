//! Single-worker deploy queue.
//!
//! Overlapping triggers must not race on the deployment directory or the
//! handover channel, so every deployment flows through a bounded channel
//! drained by exactly one consuming task. Submitters still block for the
//! full pipeline duration (the report is the response to the trigger); a
//! full queue rejects immediately with [`QueueError::Busy`] instead of
//! piling up runs.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::domain::{DeployReport, InboundTrigger};

use super::orchestrator::Deployer;

/// Submission failures, distinct from pipeline outcomes
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue at capacity; the trigger was dropped without side effects
    #[error("deploy queue is full")]
    Busy,

    /// Worker task is gone; no further deployments possible
    #[error("deploy worker has stopped")]
    Closed,
}

impl QueueError {
    /// HTTP status the transport boundary should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Busy => 409,
            Self::Closed => 503,
        }
    }
}

struct Job {
    trigger: InboundTrigger,
    reply: oneshot::Sender<DeployReport>,
}

/// Handle for submitting triggers to the deploy worker
#[derive(Clone)]
pub struct DeployQueue {
    tx: mpsc::Sender<Job>,
}

impl DeployQueue {
    /// Start the worker task and return the submission handle.
    ///
    /// Capacity comes from the deployer's configuration (minimum one). The
    /// worker stops once every handle is dropped.
    pub fn start(deployer: Deployer) -> Self {
        let capacity = deployer.config().queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        tokio::spawn(run_worker(deployer, rx));

        Self { tx }
    }

    /// Submit a trigger and block until its pipeline run completes.
    ///
    /// Serialization is the point: the returned future resolves only after
    /// every earlier submission has fully finished its run.
    pub async fn deploy(&self, trigger: InboundTrigger) -> Result<DeployReport, QueueError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            trigger,
            reply: reply_tx,
        };

        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Busy,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;

        reply_rx.await.map_err(|_| QueueError::Closed)
    }
}

/// Drain jobs one at a time; at most one pipeline run is ever in flight
async fn run_worker(deployer: Deployer, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        let report = deployer.execute(&job.trigger).await;
        if job.reply.send(report).is_err() {
            warn!("deploy run finished but the submitter went away");
        }
    }
    info!("deploy worker stopped");
}
