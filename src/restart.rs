// SPDX-License-Identifier: MIT
//! Self-restart — relaunch the launcher so a fresh process sees the PATH
//! entries an install just wrote.
//!
//! The pipeline only *returns* `RestartScheduled`; the binary's entry
//! point owns process lifecycle and calls [`relaunch`] after the restart
//! delay and a best-effort environment refresh. The new instance resumes
//! the run via `--auto-start --work-dir <dir>`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::info;

/// State carried across the restart — serialized only into launch
/// arguments, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartState {
    pub work_dir: PathBuf,
    pub auto_start: bool,
}

impl RestartState {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            auto_start: true,
        }
    }

    /// The argument vector the relaunched instance is started with.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.auto_start {
            args.push("--auto-start".to_string());
        }
        args.push("--work-dir".to_string());
        args.push(self.work_dir.display().to_string());
        args
    }
}

/// Spawn a new instance of the current executable carrying `state`, then
/// return so the caller can exit this one.
pub fn relaunch(state: &RestartState, extra_args: &[String]) -> Result<()> {
    let exe = std::env::current_exe().context("cannot determine launcher executable path")?;
    spawn_instance(&exe, state, extra_args)
}

fn spawn_instance(exe: &Path, state: &RestartState, extra_args: &[String]) -> Result<()> {
    let mut args = state.to_args();
    args.extend_from_slice(extra_args);

    std::process::Command::new(exe)
        .args(&args)
        .spawn()
        .with_context(|| format!("failed to relaunch {}", exe.display()))?;

    info!(exe = %exe.display(), ?args, "relaunched for restart");
    Ok(())
}
