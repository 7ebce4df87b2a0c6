//! Command-line interface for molt.
//!
//! Provides commands for running a deployment from a payload file, checking
//! a payload without side effects, and inspecting the resolved
//! configuration. The usual production path is embedding the library behind
//! an HTTP listener; the CLI covers manual deploys and debugging.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::core::{shutdown_channel, validator, Deployer};
use crate::domain::InboundTrigger;

/// molt - self-redeploying service core
#[derive(Parser, Debug)]
#[command(name = "molt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one deployment from a trigger payload
    Deploy {
        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Event name the payload came with
        #[arg(short, long, default_value = "push")]
        event: String,

        /// Signature header value (e.g. "sha256=<hex>")
        #[arg(short, long)]
        signature: Option<String>,
    },

    /// Validate a trigger payload without deploying
    Check {
        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Event name the payload came with
        #[arg(short, long, default_value = "push")]
        event: String,

        /// Signature header value (e.g. "sha256=<hex>")
        #[arg(short, long)]
        signature: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Deploy {
                payload,
                event,
                signature,
            } => deploy(payload, event, signature).await,
            Commands::Check {
                payload,
                event,
                signature,
            } => check(payload, event, signature),
            Commands::Config => show_config(),
        }
    }
}

/// Read the payload from a file or stdin
fn read_payload(path: Option<PathBuf>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read payload file: {}", path.display())),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read payload from stdin")?;
            Ok(buf)
        }
    }
}

async fn deploy(payload: Option<PathBuf>, event: String, signature: Option<String>) -> Result<()> {
    let config = config::load_config()?;
    let body = read_payload(payload)?;
    let trigger = InboundTrigger::new(event, signature, body);

    // No embedding service in the CLI path; the coordinator logs the missing
    // listener and proceeds straight to the launch
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    drop(shutdown_rx);
    let deployer = Deployer::new(config, shutdown_tx);

    let report = deployer.execute(&trigger).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.status.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "deploy ended with status {:?}{}",
            report.status,
            report
                .diagnostic
                .map(|d| format!(": {}", d))
                .unwrap_or_default()
        )
    }
}

fn check(payload: Option<PathBuf>, event: String, signature: Option<String>) -> Result<()> {
    let config = config::load_config()?;
    let body = read_payload(payload)?;
    let trigger = InboundTrigger::new(event, signature, body);

    match validator::validate(&trigger, &config.webhook_secret, &config.tracked_ref()) {
        Ok(event) => {
            println!("actionable: would deploy {} at {}", event.clone_url, event.revision);
            Ok(())
        }
        Err(e) => {
            println!("rejected ({:?}): {}", e.status(), e);
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = config::load_config()?;

    println!("home:             {}", config.home.display());
    println!("work root:        {}", config.work_root.display());
    println!("deploy dir:       {}", config.deploy_dir.display());
    println!("tracked ref:      {}", config.tracked_ref());
    println!("binary name:      {}", config.binary_name);
    println!("build command:    {}", config.build_command.join(" "));
    println!("artifact path:    {}", config.artifact_path.display());
    println!("build timeout:    {:?}", config.build_timeout);
    println!("handover timeout: {:?}", config.handover_timeout);
    println!("queue capacity:   {}", config.queue_capacity);
    println!(
        "webhook secret:   {}",
        if config.webhook_secret.is_empty() { "(unset)" } else { "(set)" }
    );
    println!(
        "access token:     {}",
        if config.access_token.is_empty() { "(unset)" } else { "(set)" }
    );
    match config.config_file {
        Some(ref path) => println!("config file:      {}", path.display()),
        None => println!("config file:      (none found)"),
    }

    Ok(())
}
