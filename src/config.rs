//! Configuration for molt.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MOLT_HOME, MOLT_WEBHOOK_SECRET, MOLT_ACCESS_TOKEN)
//! 2. Config file (.molt/config.yaml)
//! 3. Defaults (~/.molt, current directory as deploy dir)
//!
//! Config file discovery:
//! - Searches current directory and parents for .molt/config.yaml
//! - Relative paths in the config file resolve against the config file's
//!   grandparent directory (the project root holding .molt/)
//!
//! Credentials live in process memory only; nothing is written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub deploy: Option<DeployConfig>,
    #[serde(default)]
    pub build: Option<BuildConfig>,
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Molt state directory (work areas live beneath it)
    pub home: Option<String>,
    /// Deployment directory holding the canonical binary
    pub deploy_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployConfig {
    /// Branch whose pushes trigger deployments
    pub branch: Option<String>,
    /// Canonical name of the installed binary
    pub binary_name: Option<String>,
    /// Seconds the old instance gets to drain before the new one starts
    pub handover_timeout_seconds: Option<u64>,
    /// Triggers held while a run is in progress before rejecting as busy
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildConfig {
    /// Build command and arguments, run with the work area as working root
    pub command: Option<Vec<String>>,
    /// Artifact location relative to the work area
    pub artifact: Option<String>,
    /// Build timeout in seconds
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    /// Shared secret for inbound trigger signatures
    pub webhook_secret: Option<String>,
    /// Access token for outbound source fetches
    pub access_token: Option<String>,
}

/// Resolved configuration with absolute paths and defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to molt home (state root)
    pub home: PathBuf,
    /// Root directory for per-trigger work areas
    pub work_root: PathBuf,
    /// Deployment directory holding the canonical binary
    pub deploy_dir: PathBuf,
    /// Branch whose pushes are deployed
    pub branch: String,
    /// Canonical installed binary name
    pub binary_name: String,
    /// Build command and arguments
    pub build_command: Vec<String>,
    /// Artifact path relative to the work area
    pub artifact_path: PathBuf,
    /// Build timeout
    pub build_timeout: Duration,
    /// Bounded wait for the old instance to acknowledge the handover
    pub handover_timeout: Duration,
    /// Deploy queue capacity
    pub queue_capacity: usize,
    /// Shared secret for trigger signatures
    pub webhook_secret: String,
    /// Access token for source fetches (empty means unauthenticated)
    pub access_token: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Full ref of the tracked branch (e.g. "refs/heads/main")
    pub fn tracked_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    /// Destination path of the installed binary
    pub fn installed_path(&self) -> PathBuf {
        self.deploy_dir.join(&self.binary_name)
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_binary_name() -> String {
    "moltbin".to_string()
}

fn default_build_command() -> Vec<String> {
    vec![
        "cargo".to_string(),
        "build".to_string(),
        "--release".to_string(),
    ]
}

fn default_build_timeout_seconds() -> u64 {
    600
}

fn default_handover_timeout_seconds() -> u64 {
    3
}

fn default_queue_capacity() -> usize {
    4
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".molt").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path_str)
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".molt");

    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    // Base for relative paths: the directory containing .molt/
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .map(Path::to_path_buf);

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();
    let deploy = file.as_ref().and_then(|f| f.deploy.clone()).unwrap_or_default();
    let build = file.as_ref().and_then(|f| f.build.clone()).unwrap_or_default();
    let credentials = file
        .as_ref()
        .and_then(|f| f.credentials.clone())
        .unwrap_or_default();

    let home = if let Ok(env_home) = std::env::var("MOLT_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(base), Some(home_path)) = (base_dir.as_deref(), paths.home.as_deref()) {
        resolve_path(base, home_path)
    } else {
        default_home
    };

    let deploy_dir = if let Some(dir) = paths.deploy_dir.as_deref() {
        let base = base_dir.as_deref().unwrap_or(Path::new("."));
        resolve_path(base, dir)
    } else {
        // The original installs next to the running binary: current directory
        std::env::current_dir().context("Failed to determine current directory")?
    };

    let binary_name = deploy.binary_name.unwrap_or_else(default_binary_name);

    let webhook_secret = std::env::var("MOLT_WEBHOOK_SECRET")
        .ok()
        .or(credentials.webhook_secret)
        .unwrap_or_default();

    let access_token = std::env::var("MOLT_ACCESS_TOKEN")
        .ok()
        .or(credentials.access_token)
        .unwrap_or_default();

    let artifact_path = build
        .artifact
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target/release").join(&binary_name));

    Ok(ResolvedConfig {
        work_root: home.join("builds"),
        home,
        deploy_dir,
        branch: deploy.branch.unwrap_or_else(default_branch),
        binary_name,
        build_command: build.command.unwrap_or_else(default_build_command),
        artifact_path,
        build_timeout: Duration::from_secs(
            build
                .timeout_seconds
                .unwrap_or_else(default_build_timeout_seconds),
        ),
        handover_timeout: Duration::from_secs(
            deploy
                .handover_timeout_seconds
                .unwrap_or_else(default_handover_timeout_seconds),
        ),
        queue_capacity: deploy.queue_capacity.unwrap_or_else(default_queue_capacity),
        webhook_secret,
        access_token,
        config_file,
    })
}
