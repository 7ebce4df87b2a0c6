//! Per-run outcome types.
//!
//! Every trigger produces exactly one [`DeployReport`]: a status from the
//! fixed pipeline vocabulary plus a diagnostic that traces to the root cause.
//! Reports are surfaced to the trigger's origin and then discarded; no
//! deployment history is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Why a pipeline stage failed.
///
/// Stage errors wrap the underlying cause rather than swallowing it, so the
/// report's diagnostic always reaches the root failure. The `{:#}` format on
/// the inner error prints the whole `anyhow` chain.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Bad signature or malformed payload
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Well-formed but nothing to deploy (not a true error)
    #[error("not actionable: {0}")]
    NotActionable(String),

    /// Clone/checkout problems: network, auth, unknown revision
    #[error("could not fetch source: {0:#}")]
    Fetch(anyhow::Error),

    /// Build toolchain returned non-zero or timed out
    #[error("build failed: {0:#}")]
    Build(anyhow::Error),

    /// Filesystem I/O while installing the artifact
    #[error("install failed: {0:#}")]
    Install(anyhow::Error),

    /// The newly installed binary failed to start. The most severe outcome:
    /// the old instance may already be draining, so nothing may be serving.
    #[error("could not start new binary: {0:#}")]
    Handover(anyhow::Error),
}

impl DeployError {
    /// Map this failure to the report status vocabulary
    pub fn status(&self) -> DeployStatus {
        match self {
            Self::InvalidTrigger(_) => DeployStatus::RejectedInvalid,
            Self::NotActionable(_) => DeployStatus::RejectedNotActionable,
            Self::Fetch(_) => DeployStatus::FetchFailed,
            Self::Build(_) => DeployStatus::BuildFailed,
            Self::Install(_) => DeployStatus::InstallFailed,
            Self::Handover(_) => DeployStatus::RunFailed,
        }
    }
}

/// Outcome status of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStatus {
    /// Well-formed event with nothing to do (e.g. branch deletion)
    RejectedNotActionable,

    /// Signature mismatch or malformed payload
    RejectedInvalid,

    /// Clone or checkout failed
    FetchFailed,

    /// Build toolchain failed
    BuildFailed,

    /// Artifact could not be installed
    InstallFailed,

    /// New process failed to start
    RunFailed,

    /// Binary installed and new process running
    Succeeded,
}

impl DeployStatus {
    /// HTTP status the transport boundary should answer with.
    ///
    /// Not-actionable events are acknowledged without alarm (204); invalid
    /// triggers are a client error (400); every pipeline-stage failure is a
    /// server error (500). A queue-full rejection maps to 409 at the worker
    /// layer, outside this vocabulary.
    pub fn http_status(self) -> u16 {
        match self {
            Self::RejectedNotActionable => 204,
            Self::RejectedInvalid => 400,
            Self::FetchFailed | Self::BuildFailed | Self::InstallFailed | Self::RunFailed => 500,
            Self::Succeeded => 200,
        }
    }

    /// True for the one terminal state where the new binary is running
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// The result of one pipeline run, surfaced to the trigger's origin and then
/// discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    /// Run identifier, threaded through the logs for this run
    pub run_id: Uuid,

    /// Terminal status
    pub status: DeployStatus,

    /// Root-cause diagnostic for failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,

    /// Revision that was deployed (absent when rejected before fetch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl DeployReport {
    /// Build a success report
    pub fn succeeded(run_id: Uuid, revision: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: DeployStatus::Succeeded,
            diagnostic: None,
            revision: Some(revision),
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Build a failure report from a stage error
    pub fn failed(run_id: Uuid, error: &DeployError, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status: error.status(),
            diagnostic: Some(error.to_string()),
            revision: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Attach the revision to a failure report (known once validation passed)
    pub fn with_revision(mut self, revision: String) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Run duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
