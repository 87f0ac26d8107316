// SPDX-License-Identifier: MIT
//! Environment refresh — pull PATH entries written by an installer into
//! the current process before relaunching.
//!
//! Two strategies, tried in order, every failure swallowed: a shell-level
//! refresh command, then a direct read of the persisted environment store.
//! Both shell out (the same way the rest of the launcher administers the
//! platform) so no OS-API bindings leak into the dependency tree. On
//! non-Windows platforms both strategies are no-ops — installs there land
//! in directories the context already prepends.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::context::ExecContext;
use crate::process::ProcessHost;

/// One best-effort strategy for refreshing the in-process environment.
#[async_trait]
pub trait EnvRefresher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn refresh(&self, host: &dyn ProcessHost, ctx: &ExecContext) -> Result<()>;
}

/// Run every refresher in order. Failures are logged at debug level and
/// otherwise ignored — a stale environment is recovered by the restart
/// itself re-reading the persisted store at startup.
pub async fn refresh_environment(
    refreshers: &[Box<dyn EnvRefresher>],
    host: &dyn ProcessHost,
    ctx: &ExecContext,
) {
    for refresher in refreshers {
        match refresher.refresh(host, ctx).await {
            Ok(()) => debug!(strategy = refresher.name(), "environment refresh ok"),
            Err(e) => debug!(strategy = refresher.name(), err = %format!("{e:#}"), "environment refresh failed — continuing"),
        }
    }
}

/// The default strategy chain: shell refresh first, then store read.
pub fn default_refreshers() -> Vec<Box<dyn EnvRefresher>> {
    vec![Box::new(ShellRefresher), Box::new(StoreRefresher)]
}

// ─── ShellRefresher ───────────────────────────────────────────────────────────

/// Runs the Chocolatey-installed `refreshenv` helper when present.
pub struct ShellRefresher;

#[async_trait]
impl EnvRefresher for ShellRefresher {
    fn name(&self) -> &'static str {
        "shell-refresh"
    }

    async fn refresh(&self, host: &dyn ProcessHost, ctx: &ExecContext) -> Result<()> {
        if !cfg!(windows) {
            return Ok(());
        }
        // Output is captured and discarded; only the exit code matters.
        let sink = crate::logsink::MemorySink::new();
        let result = host
            .run("cmd.exe", &["/c", "refreshenv"], ctx, &sink)
            .await
            .context("refreshenv could not be spawned")?;
        anyhow::ensure!(
            result.success(),
            "refreshenv exited with code {}",
            result.exit_code
        );
        Ok(())
    }
}

// ─── StoreRefresher ───────────────────────────────────────────────────────────

/// Reads the persisted PATH values out of the registry (machine scope
/// first, then user scope appended) and applies them to this process.
pub struct StoreRefresher;

const MACHINE_ENV_KEY: &str = r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";
const USER_ENV_KEY: &str = r"HKCU\Environment";

#[async_trait]
impl EnvRefresher for StoreRefresher {
    fn name(&self) -> &'static str {
        "store-read"
    }

    async fn refresh(&self, host: &dyn ProcessHost, ctx: &ExecContext) -> Result<()> {
        if !cfg!(windows) {
            return Ok(());
        }

        let machine = query_store_path(host, ctx, MACHINE_ENV_KEY).await;
        let user = query_store_path(host, ctx, USER_ENV_KEY).await;

        let mut path = String::new();
        if let Some(m) = machine {
            path.push_str(&m);
        }
        if let Some(u) = user {
            if !path.is_empty() {
                path.push(';');
            }
            path.push_str(&u);
        }
        anyhow::ensure!(!path.is_empty(), "no PATH value found in the environment store");

        std::env::set_var("PATH", &path);
        debug!(len = path.len(), "process PATH replaced from persisted store");
        Ok(())
    }
}

async fn query_store_path(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    key: &str,
) -> Option<String> {
    let sink = crate::logsink::MemorySink::new();
    let result = host
        .run("reg", &["query", key, "/v", "Path"], ctx, &sink)
        .await
        .ok()?;
    if !result.success() {
        return None;
    }
    parse_reg_query_value(&result.stdout_text())
}

/// Extract the value from `reg query ... /v Path` output, e.g.
///
/// ```text
/// HKEY_CURRENT_USER\Environment
///     Path    REG_EXPAND_SZ    C:\Users\me\AppData\Roaming\npm;...
/// ```
fn parse_reg_query_value(output: &str) -> Option<String> {
    for line in output.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("Path") else {
            continue;
        };
        let rest = rest.trim_start();
        for kind in ["REG_EXPAND_SZ", "REG_SZ"] {
            if let Some(value) = rest.strip_prefix(kind) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
