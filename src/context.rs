// SPDX-License-Identifier: MIT
//! Execution context — working directory plus the augmented search path
//! every child process is spawned with.
//!
//! Built once at the start of a pipeline run and read-only afterwards.
//! Well-known install locations are prepended to `PATH` so binaries written
//! by an install earlier in the same run shadow stale entries.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;

/// Immutable per-run execution context.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Working directory for every spawned process. Guaranteed to exist.
    pub work_dir: PathBuf,
    /// Extra search-path entries, highest priority first.
    pub path_entries: Vec<PathBuf>,
    /// Forward the tool's bypass flag when launching.
    pub bypass: bool,
}

impl ExecContext {
    /// Build the context, creating the working directory if it is missing.
    ///
    /// An empty working directory string is rejected — no installation step
    /// may run without a concrete directory on disk.
    pub fn new(work_dir: impl Into<PathBuf>, bypass: bool) -> Result<Self> {
        let work_dir: PathBuf = work_dir.into();
        if work_dir.as_os_str().is_empty() {
            anyhow::bail!("working directory must not be empty");
        }
        if !work_dir.exists() {
            debug!(dir = %work_dir.display(), "working directory missing — creating");
            std::fs::create_dir_all(&work_dir).with_context(|| {
                format!("failed to create working directory {}", work_dir.display())
            })?;
        }

        Ok(Self {
            work_dir,
            path_entries: well_known_install_dirs(),
            bypass,
        })
    }

    /// The `PATH` value children are spawned with: augmented entries first,
    /// then the current process `PATH`.
    pub fn child_path(&self) -> std::ffi::OsString {
        let current = std::env::var_os("PATH").unwrap_or_default();
        let mut entries: Vec<PathBuf> = self.path_entries.clone();
        entries.extend(std::env::split_paths(&current));
        dedupe(&mut entries);
        std::env::join_paths(entries.iter()).unwrap_or(current)
    }
}

/// Directories npm and the Node installer are known to write binaries into.
/// Only existing directories are returned, in shadowing order.
fn well_known_install_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if cfg!(windows) {
        // %APPDATA%\npm and %USERPROFILE%\AppData\Roaming\npm hold the
        // global shims; %ProgramFiles%\nodejs holds node itself.
        if let Some(appdata) = std::env::var_os("APPDATA") {
            dirs.push(PathBuf::from(appdata).join("npm"));
        }
        if let Some(profile) = std::env::var_os("USERPROFILE") {
            dirs.push(
                PathBuf::from(profile)
                    .join("AppData")
                    .join("Roaming")
                    .join("npm"),
            );
        }
        if let Some(pf) = std::env::var_os("ProgramFiles") {
            dirs.push(PathBuf::from(pf).join("nodejs"));
        }
    } else {
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            // `npm config set prefix ~/.npm-global` layout, then the nvm
            // and Homebrew defaults.
            dirs.push(home.join(".npm-global").join("bin"));
            dirs.push(home.join(".local").join("bin"));
        }
        dirs.push(PathBuf::from("/usr/local/bin"));
        dirs.push(PathBuf::from("/opt/homebrew/bin"));
    }

    dirs.retain(|d| d.is_dir());
    dirs
}

fn dedupe(entries: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|e| seen.insert(e.clone()));
}

/// Resolve the user's home directory from the platform environment.
pub fn home_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        std::env::var_os("USERPROFILE").map(PathBuf::from).or_else(|| {
            let drive = std::env::var_os("HOMEDRIVE")?;
            let path = std::env::var_os("HOMEPATH")?;
            let mut joined = PathBuf::from(drive);
            joined.push(path);
            Some(joined)
        })
    } else {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}

/// The npm global bin directory for the current platform, if it exists.
pub fn npm_global_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        std::env::var_os("APPDATA").map(|a| PathBuf::from(a).join("npm"))
    } else {
        home_dir().map(|h| h.join(".npm-global").join("bin"))
    }
    .filter(|p| p.is_dir())
}

/// Truncate a PATH-sized string for a single human-readable log line.
pub fn display_path(path: &Path) -> String {
    const MAX: usize = 200;
    let s = path.display().to_string();
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s,
    }
}
