//! Build adapter: runs the configured toolchain against a work area.
//!
//! The build command runs with the work area as its working directory so
//! that path-relative dependency resolution (lockfiles, vendored trees)
//! works as it would for a developer in that checkout. A non-zero exit, a
//! timeout, or a missing artifact are all build failures; nothing partial is
//! ever treated as success.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// How much trailing build output is kept in a failure diagnostic
const STDERR_TAIL_BYTES: usize = 2000;

/// Build tool invocation: command, expected artifact, timeout
pub struct BuildTool {
    /// Command and arguments, e.g. ["cargo", "build", "--release"]
    command: Vec<String>,

    /// Artifact location relative to the work area
    artifact: PathBuf,

    /// How long the toolchain may run before the build counts as failed
    build_timeout: Duration,
}

impl BuildTool {
    /// Create a build tool from configuration
    pub fn new(command: Vec<String>, artifact: PathBuf, build_timeout: Duration) -> Self {
        Self {
            command,
            artifact,
            build_timeout,
        }
    }

    /// Run the build and return the absolute artifact path.
    pub async fn build(&self, work_area: &Path) -> Result<PathBuf> {
        let (program, args) = self
            .command
            .split_first()
            .context("build command is empty")?;

        debug!(command = %self.command.join(" "), "starting build");

        let child = Command::new(program)
            .args(args)
            .current_dir(work_area)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // a hung toolchain must not outlive its deadline
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn build command '{}'", program))?;

        let output = timeout(self.build_timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                anyhow::anyhow!("build timed out after {:?}", self.build_timeout)
            })?
            .context("Failed to wait for build command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "build command exited with code {}: {}",
                exit_code,
                tail(stderr.trim(), STDERR_TAIL_BYTES)
            );
        }

        let artifact = work_area.join(&self.artifact);
        if !artifact.exists() {
            anyhow::bail!(
                "build succeeded but produced no artifact at {}",
                self.artifact.display()
            );
        }

        Ok(artifact)
    }
}

/// Last `max` bytes of a diagnostic, on a char boundary
fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_build_produces_artifact() {
        let work = TempDir::new().unwrap();
        let tool = BuildTool::new(
            sh("mkdir -p out && printf 'binary' > out/app"),
            PathBuf::from("out/app"),
            Duration::from_secs(10),
        );

        let artifact = tool.build(work.path()).await.unwrap();
        assert_eq!(artifact, work.path().join("out/app"));
        assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "binary");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let work = TempDir::new().unwrap();
        let tool = BuildTool::new(
            sh("echo 'syntax error' >&2; exit 1"),
            PathBuf::from("out/app"),
            Duration::from_secs(10),
        );

        let err = tool.build(work.path()).await.unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("exited with code 1"), "got {}", msg);
        assert!(msg.contains("syntax error"), "got {}", msg);
    }

    #[tokio::test]
    async fn test_build_timeout() {
        let work = TempDir::new().unwrap();
        let tool = BuildTool::new(
            sh("sleep 5"),
            PathBuf::from("out/app"),
            Duration::from_millis(100),
        );

        let err = tool.build(work.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_failure() {
        let work = TempDir::new().unwrap();
        let tool = BuildTool::new(
            sh("true"),
            PathBuf::from("out/app"),
            Duration::from_secs(10),
        );

        let err = tool.build(work.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no artifact"));
    }

    #[tokio::test]
    async fn test_empty_command_is_failure() {
        let work = TempDir::new().unwrap();
        let tool = BuildTool::new(vec![], PathBuf::from("out/app"), Duration::from_secs(1));

        assert!(tool.build(work.path()).await.is_err());
    }

    #[test]
    fn test_tail_keeps_end() {
        let text = "aaaabbbb";
        assert_eq!(tail(text, 4), "bbbb");
        assert_eq!(tail(text, 100), "aaaabbbb");
    }
}
