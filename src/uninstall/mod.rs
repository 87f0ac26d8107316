// SPDX-License-Identifier: MIT
//! Uninstall flow — remove the tool package, optionally the runtime, and
//! the debris npm leaves behind.
//!
//! Order: `npm uninstall -g`, then direct deletion of any command shims
//! still sitting in the npm global bin dir, a `where`/`which` post-check,
//! an optional config-directory purge under the user profile, and an
//! optional runtime removal through the system package manager (run
//! without output capture — the elevation prompt owns the console).

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, warn};

use crate::config::LauncherConfig;
use crate::context::{home_dir, npm_global_dir, ExecContext};
use crate::logsink::LogSink;
use crate::process::ProcessHost;

/// What to remove beyond the npm package itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Also remove the Node.js runtime via the system package manager.
    pub with_runtime: bool,
    /// Also delete the tool's config directory under the user profile.
    pub purge_config: bool,
}

/// Run the uninstall flow. Individual steps log and continue on failure;
/// only a completely unusable environment returns an error.
pub async fn uninstall(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    cfg: &LauncherConfig,
    opts: UninstallOptions,
    sink: &dyn LogSink,
) -> Result<()> {
    let tool = &cfg.tool;

    sink.info(&format!("Uninstalling {}...", tool.name));
    match host
        .run("npm", &["uninstall", "-g", tool.package.as_str()], ctx, sink)
        .await
    {
        Ok(result) if result.success() => {
            sink.info(&format!("{} uninstall command finished.", tool.name));
        }
        Ok(result) => {
            sink.info(&format!(
                "npm uninstall exited with code {} — continuing with direct cleanup.",
                result.exit_code
            ));
        }
        Err(e) => {
            sink.info(&format!(
                "npm could not be spawned ({e:#}) — continuing with direct cleanup."
            ));
        }
    }

    if let Some(dir) = npm_global_dir() {
        remove_shims_in(&dir, &tool.name, sink);
    }

    let locator = if cfg!(windows) { "where" } else { "which" };
    if host.probe(locator, &[tool.name.as_str()], ctx).await {
        sink.info(&format!(
            "Warning: {} command is still available. Please check manually.",
            tool.name
        ));
        warn!(tool = %tool.name, "command still resolvable after uninstall");
    } else {
        sink.info(&format!(
            "{} command has been successfully removed.",
            tool.name
        ));
    }

    if opts.purge_config {
        if let Some(home) = home_dir() {
            purge_config_dir(&home, &tool.config_dir, sink);
        }
    }

    if opts.with_runtime {
        remove_runtime(host, ctx, cfg, sink).await;
    }

    sink.info("Uninstallation process finished.");
    Ok(())
}

/// Delete the shim files npm writes for `stem` in `dir`. Returns the paths
/// actually deleted.
pub fn remove_shims_in(dir: &Path, stem: &str, sink: &dyn LogSink) -> Vec<PathBuf> {
    sink.info(&format!("Removing {stem} command files directly..."));

    let shims = [
        dir.join(stem),
        dir.join(format!("{stem}.cmd")),
        dir.join(format!("{stem}.ps1")),
    ];

    let mut deleted = Vec::new();
    for shim in shims {
        if !shim.exists() {
            sink.info(&format!("File not found: {}", shim.display()));
            continue;
        }
        match std::fs::remove_file(&shim) {
            Ok(()) => {
                sink.info(&format!("Deleted: {}", shim.display()));
                deleted.push(shim);
            }
            Err(e) => {
                sink.info(&format!("File deletion error {}: {e}", shim.display()));
                warn!(path = %shim.display(), err = %e, "shim deletion failed");
            }
        }
    }
    deleted
}

/// Delete `{home}/{config_dir_name}` recursively if it exists. Returns
/// true when a directory was removed.
pub fn purge_config_dir(home: &Path, config_dir_name: &str, sink: &dyn LogSink) -> bool {
    let config_path = home.join(config_dir_name);
    sink.info(&format!(
        "Removing {config_dir_name} configuration folder..."
    ));

    if !config_path.exists() {
        sink.info(&format!(
            "Configuration folder does not exist: {}",
            config_path.display()
        ));
        return false;
    }

    match std::fs::remove_dir_all(&config_path) {
        Ok(()) => {
            sink.info(&format!(
                "Configuration folder deleted: {}",
                config_path.display()
            ));
            info!(path = %config_path.display(), "config folder purged");
            true
        }
        Err(e) => {
            sink.info(&format!(
                "Configuration folder deletion error {}: {e}. Please delete manually.",
                config_path.display()
            ));
            warn!(path = %config_path.display(), err = %e, "config purge failed");
            false
        }
    }
}

async fn remove_runtime(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    cfg: &LauncherConfig,
    sink: &dyn LogSink,
) {
    sink.info(&format!("Uninstalling {}...", cfg.runtime.command));

    let invocation: Option<(&str, Vec<String>)> = if cfg!(windows) {
        Some((
            "winget",
            vec![
                "uninstall".to_string(),
                "--id".to_string(),
                cfg.runtime.winget_id.clone(),
                "--accept-source-agreements".to_string(),
            ],
        ))
    } else if cfg!(target_os = "macos") {
        Some(("brew", vec!["uninstall".to_string(), "node".to_string()]))
    } else {
        None
    };

    let Some((program, args)) = invocation else {
        sink.info("Runtime removal is not automated on this platform — skipping.");
        return;
    };

    sink.info("This may require administrator privileges and a confirmation prompt.");
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    match host.run_elevated(program, &arg_refs, ctx).await {
        Ok(0) => sink.info(&format!("{} uninstall command finished.", cfg.runtime.command)),
        Ok(code) => sink.info(&format!(
            "{program} exited with code {code} — the runtime may still be installed."
        )),
        Err(e) => sink.info(&format!("Failed to run {program}: {e:#}")),
    }
}
