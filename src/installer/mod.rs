// SPDX-License-Identifier: MIT
//! Installer flow — make sure the runtime and the tool package exist,
//! installing through the platform package manager when they do not.
//!
//! Each `ensure_*` probes first and never touches an installer for a
//! dependency that is already present. After an install that exited 0 the
//! probe is repeated: a still-failing probe classifies the outcome as
//! `InstalledUnverified` rather than a failure — the PATH entries written
//! by the installer are often not visible to the current process yet, and
//! the self-restart that follows re-probes with a fresh environment.
//! Installer errors are reported, never propagated: the pipeline decides
//! whether to keep going.

use tracing::{info, warn};

use crate::config::{RuntimeSpec, ToolSpec};
use crate::context::ExecContext;
use crate::logsink::LogSink;
use crate::process::ProcessHost;

/// Classification of one dependency after `ensure_*` ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Probe succeeded up front; no installer was invoked.
    AlreadyPresent,
    /// Installed and the post-install probe confirmed it.
    Installed,
    /// Installer exited 0 but the post-install probe still fails.
    /// Treated as installed; a restart with a refreshed environment is
    /// expected to make the binary visible.
    InstalledUnverified,
    /// Installer could not be spawned or exited non-zero.
    Failed(String),
}

impl EnsureOutcome {
    /// True when something was freshly written to disk — the signal that
    /// the launcher must restart itself before launching.
    pub fn freshly_installed(&self) -> bool {
        matches!(self, Self::Installed | Self::InstalledUnverified)
    }
}

// ─── Runtime ──────────────────────────────────────────────────────────────────

/// Ensure the Node.js runtime is available.
pub async fn ensure_runtime(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    runtime: &RuntimeSpec,
    sink: &dyn LogSink,
) -> EnsureOutcome {
    sink.info(&format!("Checking for {}...", runtime.command));
    if host
        .probe(&runtime.command, &[runtime.probe_arg.as_str()], ctx)
        .await
    {
        sink.info(&format!("{} is already installed.", runtime.command));
        return EnsureOutcome::AlreadyPresent;
    }

    let Some((program, args)) = runtime_install_invocation(runtime) else {
        let reason = format!(
            "{} is not installed and no unattended installer exists for this platform. \
             Install it manually from https://nodejs.org/ and run again.",
            runtime.command
        );
        sink.info(&reason);
        return EnsureOutcome::Failed(reason);
    };

    sink.info(&format!(
        "{} is not installed. Installing via {program}...",
        runtime.command
    ));
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    match host.run(&program, &arg_refs, ctx, sink).await {
        Ok(result) if result.success() => {
            sink.info(&format!("{} installation completed.", runtime.command));
            verify(host, ctx, &runtime.command, &runtime.probe_arg, sink).await
        }
        Ok(result) => {
            let reason = format!(
                "{program} exited with code {} while installing {}",
                result.exit_code, runtime.command
            );
            warn!(exit_code = result.exit_code, "runtime install failed");
            sink.info(&format!(
                "Failed to install {}: {reason}. Install it manually from https://nodejs.org/",
                runtime.command
            ));
            EnsureOutcome::Failed(reason)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(err = %reason, "runtime installer could not be spawned");
            sink.info(&format!(
                "Failed to install {}: {reason}. Install it manually from https://nodejs.org/",
                runtime.command
            ));
            EnsureOutcome::Failed(reason)
        }
    }
}

/// Platform installer invocation for the runtime, or None where no
/// unattended non-privileged install path exists.
fn runtime_install_invocation(runtime: &RuntimeSpec) -> Option<(String, Vec<String>)> {
    if cfg!(windows) {
        Some((
            "winget".to_string(),
            vec![
                "install".to_string(),
                "-e".to_string(),
                "--id".to_string(),
                runtime.winget_id.clone(),
            ],
        ))
    } else if cfg!(target_os = "macos") {
        Some((
            "brew".to_string(),
            vec!["install".to_string(), "node".to_string()],
        ))
    } else {
        None
    }
}

// ─── Tool package ─────────────────────────────────────────────────────────────

/// Ensure the tool's npm package is installed globally.
pub async fn ensure_package(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    tool: &ToolSpec,
    sink: &dyn LogSink,
) -> EnsureOutcome {
    sink.info(&format!("Checking for {}...", tool.name));

    // The first candidate is the authoritative presence probe; the launch
    // step will settle on whichever candidate actually answers.
    if let Some(first) = tool.candidates.first() {
        if host.probe(first, &[tool.probe_arg.as_str()], ctx).await {
            sink.info(&format!("{} is already installed.", tool.name));
            return EnsureOutcome::AlreadyPresent;
        }
    }

    sink.info(&format!(
        "{} is not installed. Installing via npm...",
        tool.name
    ));
    match host
        .run("npm", &["install", "-g", tool.package.as_str()], ctx, sink)
        .await
    {
        Ok(result) if result.success() => {
            sink.info(&format!("{} installation completed.", tool.name));
            verify_candidates(host, ctx, tool, sink).await
        }
        Ok(result) => {
            let reason = format!(
                "npm exited with code {} while installing {}",
                result.exit_code, tool.package
            );
            warn!(exit_code = result.exit_code, package = %tool.package, "package install failed");
            sink.info(&format!(
                "Failed to install {}: {reason}. Ensure Node.js/npm is properly installed and try again.",
                tool.name
            ));
            EnsureOutcome::Failed(reason)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(err = %reason, package = %tool.package, "npm could not be spawned");
            sink.info(&format!(
                "Failed to install {}: {reason}. Ensure Node.js/npm is properly installed and try again.",
                tool.name
            ));
            EnsureOutcome::Failed(reason)
        }
    }
}

// ─── Post-install verification ────────────────────────────────────────────────

async fn verify(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    command: &str,
    probe_arg: &str,
    sink: &dyn LogSink,
) -> EnsureOutcome {
    if host.probe(command, &[probe_arg], ctx).await {
        sink.info(&format!("{command} installation verified successfully."));
        info!(command, "install verified");
        EnsureOutcome::Installed
    } else {
        sink.info(&format!(
            "WARNING: {command} installation could not be verified. \
             A restart may be needed before it becomes visible."
        ));
        warn!(command, "install finished but probe still failing");
        EnsureOutcome::InstalledUnverified
    }
}

/// Like [`verify`], but accepts any candidate answering the probe.
async fn verify_candidates(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    tool: &ToolSpec,
    sink: &dyn LogSink,
) -> EnsureOutcome {
    for candidate in &tool.candidates {
        if host.probe(candidate, &[tool.probe_arg.as_str()], ctx).await {
            sink.info(&format!(
                "{} installation verified successfully (using `{candidate}`).",
                tool.name
            ));
            info!(tool = %tool.name, candidate = %candidate, "install verified");
            return EnsureOutcome::Installed;
        }
    }

    sink.info(&format!(
        "WARNING: {} installation could not be verified. \
         A restart may be needed before it becomes visible.",
        tool.name
    ));
    warn!(tool = %tool.name, "install finished but no candidate answers the probe");
    EnsureOutcome::InstalledUnverified
}
