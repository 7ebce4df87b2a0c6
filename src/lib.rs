//! molt - self-redeploying service core
//!
//! When a push notification for the tracked branch arrives, molt clones the
//! pushed revision, builds it, atomically installs the produced binary over
//! the running one, signals the old instance to drain, and starts the new
//! binary as a detached process.
//!
//! # Architecture
//!
//! The pipeline is strictly forward: trigger validation yields a clone URL
//! and an exact revision; the fetcher materializes that revision in a
//! disposable work area; the builder produces the artifact; the installer
//! renames it over the canonical binary; the handover coordinator signals
//! the old instance and launches the new one. Every run produces exactly one
//! report and leaves no state behind.
//!
//! # Modules
//!
//! - `adapters`: subprocess drivers for git and the build toolchain
//! - `core`: validation, workspace, install, handover, orchestration, queue
//! - `domain`: trigger and report data structures
//! - `config`: layered configuration (env, .molt/config.yaml, defaults)
//! - `cli`: command-line interface
//!
//! # Embedding
//!
//! The HTTP layer is not molt's concern. An embedding service listens on the
//! shutdown channel and forwards signed webhook deliveries:
//!
//! ```rust,ignore
//! let (shutdown_tx, mut shutdown_rx) = molt::core::shutdown_channel();
//! let deployer = molt::core::Deployer::new(config, shutdown_tx);
//! let queue = molt::core::DeployQueue::start(deployer);
//!
//! // per delivery: body + headers in, report out
//! let report = queue.deploy(trigger).await?;
//! respond(report.status.http_status());
//!
//! // in the service's shutdown task:
//! if let Some(signal) = shutdown_rx.recv().await {
//!     drain_in_flight_work().await;
//!     signal.acknowledge();
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::{load_config, ResolvedConfig};
pub use core::{shutdown_channel, Deployer, DeployQueue, HandoverSignal, QueueError};
pub use domain::{DeployReport, DeployStatus, InboundTrigger, TriggerEvent};
