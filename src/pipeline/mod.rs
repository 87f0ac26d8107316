// SPDX-License-Identifier: MIT
//! The bootstrap pipeline — one linear pass from dependency probing to a
//! terminal state.
//!
//! check runtime → install if absent → check package → install if absent
//! → if anything was installed, schedule a restart → else launch.
//!
//! The pipeline is a decision engine over [`ProcessHost`] and [`LogSink`]:
//! it spawns nothing itself and never exits the process, so it can be
//! driven entirely by fakes in tests. Terminal actions (relaunching the
//! executable, exiting) belong to the binary's entry point.
//!
//! One run at a time: a second `run` while one is in flight is rejected
//! with [`LaunchError::Busy`] instead of interleaving subprocesses.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::LauncherConfig;
use crate::context::{display_path, ExecContext};
use crate::installer::{ensure_package, ensure_runtime};
use crate::launcher::{launch_session, select_command};
use crate::logsink::LogSink;
use crate::process::ProcessHost;

/// Typed failures the pipeline itself reports. Everything else is an
/// outcome, not an error.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("an operation is already in progress")]
    Busy,
    #[error("workspace setup failed")]
    Workspace(#[source] anyhow::Error),
    #[error("failed to start the interactive session")]
    SessionSpawn(#[source] anyhow::Error),
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The tool was started in a new interactive session.
    Launched { command: String },
    /// Something was freshly installed; the caller must relaunch the
    /// executable with `--auto-start --work-dir <dir>` and exit.
    RestartScheduled { work_dir: PathBuf },
    /// No command candidate answered the probe.
    Aborted { reason: String },
}

/// The bootstrap pipeline. Construct once, run at most once concurrently.
pub struct Pipeline {
    host: Arc<dyn ProcessHost>,
    sink: Arc<dyn LogSink>,
    busy: AtomicBool,
}

impl Pipeline {
    pub fn new(host: Arc<dyn ProcessHost>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            host,
            sink,
            busy: AtomicBool::new(false),
        }
    }

    /// Run the full pipeline for `cfg` against `work_dir`.
    pub async fn run(
        &self,
        cfg: &LauncherConfig,
        work_dir: &Path,
        bypass: bool,
    ) -> Result<PipelineOutcome, LaunchError> {
        let _guard = self.try_begin()?;

        let ctx = ExecContext::new(work_dir, bypass).map_err(LaunchError::Workspace)?;
        self.sink
            .info(&format!("Working directory: {}", ctx.work_dir.display()));

        let runtime = ensure_runtime(self.host.as_ref(), &ctx, &cfg.runtime, self.sink.as_ref()).await;
        let package = ensure_package(self.host.as_ref(), &ctx, &cfg.tool, self.sink.as_ref()).await;

        if runtime.freshly_installed() || package.freshly_installed() {
            self.sink.info("New installations completed.");
            self.sink.info(
                "Restarting the launcher so the updated environment becomes visible...",
            );
            info!(work_dir = %ctx.work_dir.display(), "restart scheduled after install");
            return Ok(PipelineOutcome::RestartScheduled {
                work_dir: ctx.work_dir,
            });
        }

        self.launch(cfg, &ctx).await
    }

    async fn launch(
        &self,
        cfg: &LauncherConfig,
        ctx: &ExecContext,
    ) -> Result<PipelineOutcome, LaunchError> {
        self.sink.info(&format!("Starting {}...", cfg.tool.name));
        if let Some(path) = std::env::var_os("PATH") {
            self.sink
                .info(&format!("Current PATH: {}", display_path(Path::new(&path))));
        }

        let Some(command) =
            select_command(self.host.as_ref(), ctx, &cfg.tool, self.sink.as_ref()).await
        else {
            let reason = format!(
                "no working {} command found (tried: {})",
                cfg.tool.name,
                cfg.tool.candidates.join(", ")
            );
            self.sink
                .info(&format!("ERROR: No working {} command found.", cfg.tool.name));
            self.sink.info("Checking npm global installations...");
            // Diagnostic dump only; its own failure is not interesting.
            let _ = self
                .host
                .run("npm", &["list", "-g", "--depth=0"], ctx, self.sink.as_ref())
                .await;
            warn!(tool = %cfg.tool.name, "launch aborted — no working candidate");
            return Ok(PipelineOutcome::Aborted { reason });
        };

        launch_session(self.host.as_ref(), ctx, &cfg.tool, &command, self.sink.as_ref())
            .await
            .map_err(LaunchError::SessionSpawn)?;

        Ok(PipelineOutcome::Launched { command })
    }

    fn try_begin(&self) -> Result<BusyGuard<'_>, LaunchError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(BusyGuard(&self.busy))
        } else {
            Err(LaunchError::Busy)
        }
    }
}

/// Clears the busy flag when the run finishes, even on an early return.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
