//! Core pipeline logic.
//!
//! This module contains:
//! - Validator: trigger authenticity and actionability checks
//! - Workspace: disposable per-run checkout directories
//! - Installer: atomic placement of the built binary
//! - Handover: shutdown signaling and process launch
//! - Orchestrator: the stage sequencer
//! - Worker: the single-consumer deploy queue

pub mod handover;
pub mod installer;
pub mod orchestrator;
pub mod validator;
pub mod worker;
pub mod workspace;

// Re-export commonly used types
pub use handover::{shutdown_channel, HandoverCoordinator, HandoverOutcome, HandoverSignal};
pub use orchestrator::Deployer;
pub use worker::{DeployQueue, QueueError};
pub use workspace::WorkArea;
