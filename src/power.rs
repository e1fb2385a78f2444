//! System power actions triggered by the case button.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::info;
use tokio::process::Command;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn reboot(&self) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
}

/// Runs the system's `reboot` and `shutdown` commands.
#[derive(Debug, Clone, Default)]
pub struct SystemPower;

impl SystemPower {
    async fn exec(program: &str, args: &[&str]) -> Result<()> {
        info!("Running {program} {}", args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .with_context(|| format!("Failed to start {program}"))?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

#[async_trait]
impl PowerControl for SystemPower {
    async fn reboot(&self) -> Result<()> {
        Self::exec("reboot", &[]).await
    }

    async fn shutdown(&self) -> Result<()> {
        Self::exec("shutdown", &["now", "-h"]).await
    }
}
