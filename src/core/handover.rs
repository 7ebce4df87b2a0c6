//! Handover from the running instance to the newly installed binary.
//!
//! The coordinator pushes a one-shot [`HandoverSignal`] onto the shutdown
//! channel the embedding service listens on, waits up to the configured
//! deadline for acknowledgment, and then starts the installed binary as a
//! detached process either way. Acknowledgment is best effort: the point is
//! to give the old instance a fair chance to drain in-flight work before the
//! new one competes for its listening resources, not to guarantee
//! zero overlap.
//!
//! Signal lifecycle: created, delivered, then acknowledged or timed out,
//! then discarded. The signal is delivered at most once.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, warn};

/// One-shot shutdown request handed to the running instance.
///
/// The receiver should begin graceful shutdown when this arrives and call
/// [`HandoverSignal::acknowledge`] once in-flight work is drained. Dropping
/// the signal unacknowledged is allowed; the coordinator proceeds after the
/// deadline regardless.
#[derive(Debug)]
pub struct HandoverSignal {
    ack: oneshot::Sender<()>,
    deadline: Duration,
}

impl HandoverSignal {
    /// The drain budget this signal carries
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Mark the shutdown as complete, releasing the coordinator early
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// Create the shutdown channel the embedding service should listen on.
///
/// Capacity one: there is a single running instance and at most one
/// deployment in flight (the deploy queue serializes runs).
pub fn shutdown_channel() -> (mpsc::Sender<HandoverSignal>, mpsc::Receiver<HandoverSignal>) {
    mpsc::channel(1)
}

/// How the bounded wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverOutcome {
    /// The old instance finished draining inside the deadline
    Acknowledged,

    /// The deadline elapsed (or the signal was discarded unacknowledged)
    TimedOut,

    /// No live listener on the shutdown channel; nothing to wait for
    NotDelivered,
}

/// Coordinates the shutdown signal and the launch of the new binary
pub struct HandoverCoordinator {
    shutdown_tx: mpsc::Sender<HandoverSignal>,
    deadline: Duration,
}

impl HandoverCoordinator {
    /// Create a coordinator that signals on the given channel.
    ///
    /// The channel is an explicit dependency so tests (and embedders) can
    /// substitute their own listener.
    pub fn new(shutdown_tx: mpsc::Sender<HandoverSignal>, deadline: Duration) -> Self {
        Self {
            shutdown_tx,
            deadline,
        }
    }

    /// Deliver the signal and wait, bounded by the deadline.
    pub async fn signal_shutdown(&self) -> HandoverOutcome {
        let (ack_tx, ack_rx) = oneshot::channel();
        let signal = HandoverSignal {
            ack: ack_tx,
            deadline: self.deadline,
        };

        if self.shutdown_tx.send(signal).await.is_err() {
            warn!("no shutdown listener on handover channel, launching immediately");
            return HandoverOutcome::NotDelivered;
        }

        match timeout(self.deadline, ack_rx).await {
            Ok(Ok(())) => HandoverOutcome::Acknowledged,
            // receiver dropped the signal without acking; no point waiting on
            Ok(Err(_)) => HandoverOutcome::TimedOut,
            Err(_) => HandoverOutcome::TimedOut,
        }
    }

    /// Start the installed binary as a new, independent process.
    ///
    /// Fire and forget: the child is detached and never supervised; its
    /// lifetime is independent of this pipeline run.
    pub fn launch(&self, installed: &Path) -> Result<()> {
        Command::new(installed)
            .spawn()
            .with_context(|| format!("could not start new binary: {}", installed.display()))?;

        Ok(())
    }

    /// Full handover: signal, bounded wait, then unconditional launch.
    pub async fn hand_over(&self, installed: &Path) -> Result<HandoverOutcome> {
        let outcome = self.signal_shutdown().await;
        info!(?outcome, "handover wait finished, starting new binary");

        self.launch(installed)?;
        Ok(outcome)
    }
}
