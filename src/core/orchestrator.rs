//! Main orchestrator for the deploy pipeline.
//!
//! Sequences validate, fetch, build, install, and handover for one trigger,
//! short-circuiting at the first failure and mapping it onto the report
//! vocabulary. Exactly one attempt per trigger: a failed deployment needs a
//! new push to retry.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{BuildTool, GitFetcher};
use crate::config::ResolvedConfig;
use crate::domain::{DeployError, DeployReport, InboundTrigger, TriggerEvent};

use super::handover::{HandoverCoordinator, HandoverSignal};
use super::installer;
use super::validator;
use super::workspace::WorkArea;

/// Runs the whole pipeline for one trigger at a time
pub struct Deployer {
    config: ResolvedConfig,
    fetcher: GitFetcher,
    builder: BuildTool,
    handover: HandoverCoordinator,
}

impl Deployer {
    /// Create a deployer.
    ///
    /// The shutdown channel is an explicit dependency (not ambient state) so
    /// tests and embedders control who listens for handover signals.
    pub fn new(config: ResolvedConfig, shutdown_tx: mpsc::Sender<HandoverSignal>) -> Self {
        let builder = BuildTool::new(
            config.build_command.clone(),
            config.artifact_path.clone(),
            config.build_timeout,
        );
        let handover = HandoverCoordinator::new(shutdown_tx, config.handover_timeout);

        Self {
            config,
            fetcher: GitFetcher::new(),
            builder,
            handover,
        }
    }

    /// Replace the git adapter (custom binary path)
    pub fn with_fetcher(mut self, fetcher: GitFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Resolved configuration this deployer runs with
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Run the pipeline for one inbound trigger.
    ///
    /// Always returns a report; failures are mapped, never propagated. The
    /// work area is gone by the time this returns, whatever happened.
    #[instrument(skip_all)]
    pub async fn execute(&self, trigger: &InboundTrigger) -> DeployReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, event = %trigger.event, "deploy run started");

        let event = match validator::validate(
            trigger,
            &self.config.webhook_secret,
            &self.config.tracked_ref(),
        ) {
            Ok(event) => event,
            Err(e) => {
                match &e {
                    DeployError::NotActionable(reason) => {
                        info!(%run_id, %reason, "trigger not actionable")
                    }
                    _ => warn!(%run_id, error = %e, "trigger rejected"),
                }
                return DeployReport::failed(run_id, &e, started_at);
            }
        };

        info!(%run_id, revision = %event.revision, "trigger validated");

        match self.run_stages(run_id, &event).await {
            Ok(()) => {
                info!(%run_id, revision = %event.revision, "deploy succeeded, new binary running");
                DeployReport::succeeded(run_id, event.revision, started_at)
            }
            Err(e) => {
                if matches!(e, DeployError::Handover(_)) {
                    // the old instance may already be draining: the service
                    // could be fully down right now
                    error!(%run_id, error = %e, "HANDOVER FAILED, no process may be serving");
                } else {
                    error!(%run_id, error = %e, "deploy failed");
                }
                DeployReport::failed(run_id, &e, started_at).with_revision(event.revision)
            }
        }
    }

    /// Fetch, build, install, hand over. The work area is removed on every
    /// path before the handover begins.
    async fn run_stages(&self, run_id: Uuid, event: &TriggerEvent) -> Result<(), DeployError> {
        let work = WorkArea::create(&self.config.work_root, &event.revision)
            .await
            .map_err(DeployError::Fetch)?;

        let staged = self.fetch_build_install(run_id, event, &work).await;

        if let Err(e) = work.cleanup() {
            warn!(%run_id, "work area cleanup failed: {:#}", e);
        }

        let installed = staged?;

        let outcome = self
            .handover
            .hand_over(&installed)
            .await
            .map_err(DeployError::Handover)?;
        info!(%run_id, ?outcome, installed = %installed.display(), "handover complete");

        Ok(())
    }

    async fn fetch_build_install(
        &self,
        run_id: Uuid,
        event: &TriggerEvent,
        work: &WorkArea,
    ) -> Result<PathBuf, DeployError> {
        self.fetcher
            .fetch(
                &event.clone_url,
                &event.revision,
                &self.config.branch,
                &self.config.access_token,
                work.path(),
            )
            .await
            .map_err(DeployError::Fetch)?;
        info!(%run_id, "source fetched");

        let artifact = self
            .builder
            .build(work.path())
            .await
            .map_err(DeployError::Build)?;
        info!(%run_id, artifact = %artifact.display(), "build finished");

        let installed =
            installer::install(&artifact, &self.config.deploy_dir, &self.config.binary_name)
                .await
                .map_err(DeployError::Install)?;
        info!(%run_id, installed = %installed.display(), "binary installed");

        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handover::shutdown_channel;
    use crate::core::validator::sign;
    use crate::domain::DeployStatus;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(home: &TempDir, deploy: &TempDir) -> ResolvedConfig {
        ResolvedConfig {
            home: home.path().to_path_buf(),
            work_root: home.path().join("builds"),
            deploy_dir: deploy.path().to_path_buf(),
            branch: "main".to_string(),
            binary_name: "appd".to_string(),
            build_command: vec!["true".to_string()],
            artifact_path: PathBuf::from("out/appd"),
            build_timeout: Duration::from_secs(5),
            handover_timeout: Duration::from_millis(100),
            queue_capacity: 2,
            webhook_secret: "s3cret".to_string(),
            access_token: String::new(),
            config_file: None,
        }
    }

    fn dir_is_empty(path: &std::path::Path) -> bool {
        !path.exists() || std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_not_actionable_trigger_has_no_side_effects() {
        let home = TempDir::new().unwrap();
        let deploy = TempDir::new().unwrap();
        let config = test_config(&home, &deploy);
        let (tx, _rx) = shutdown_channel();
        let deployer = Deployer::new(config, tx);

        let body = br#"{"zen": "keep it simple"}"#.to_vec();
        let trigger = InboundTrigger::new("ping", Some(sign(&body, "s3cret")), body);

        let report = deployer.execute(&trigger).await;

        assert_eq!(report.status, DeployStatus::RejectedNotActionable);
        assert!(dir_is_empty(&home.path().join("builds")));
        assert!(dir_is_empty(deploy.path()));
    }

    #[tokio::test]
    async fn test_invalid_signature_has_no_side_effects() {
        let home = TempDir::new().unwrap();
        let deploy = TempDir::new().unwrap();
        let config = test_config(&home, &deploy);
        let (tx, _rx) = shutdown_channel();
        let deployer = Deployer::new(config, tx);

        let body = br#"{"ref": "refs/heads/main"}"#.to_vec();
        let trigger = InboundTrigger::new("push", Some("sha256=0000".to_string()), body);

        let report = deployer.execute(&trigger).await;

        assert_eq!(report.status, DeployStatus::RejectedInvalid);
        assert!(report.diagnostic.unwrap().contains("signature"));
        assert!(dir_is_empty(&home.path().join("builds")));
        assert!(dir_is_empty(deploy.path()));
    }

    #[tokio::test]
    async fn test_fetch_failure_removes_work_area() {
        let home = TempDir::new().unwrap();
        let deploy = TempDir::new().unwrap();
        let config = test_config(&home, &deploy);
        let (tx, _rx) = shutdown_channel();
        let deployer =
            Deployer::new(config, tx).with_fetcher(GitFetcher::with_binary_path("/nonexistent/git"));

        let body = r#"{
            "ref": "refs/heads/main",
            "deleted": false,
            "head_commit": { "id": "abc123" },
            "repository": { "clone_url": "https://example.invalid/r.git" }
        }"#
        .as_bytes()
        .to_vec();
        let trigger = InboundTrigger::new("push", Some(sign(&body, "s3cret")), body);

        let report = deployer.execute(&trigger).await;

        assert_eq!(report.status, DeployStatus::FetchFailed);
        assert_eq!(report.revision.as_deref(), Some("abc123"));
        assert!(dir_is_empty(&home.path().join("builds")));
        assert!(dir_is_empty(deploy.path()));
    }
}
