// SPDX-License-Identifier: MIT
//! Launcher configuration.
//!
//! Three layers, highest priority first: CLI flag / env var, then
//! `{data_dir}/config.toml`, then built-in defaults. A config file that
//! fails to parse is logged and ignored rather than aborting the launcher.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::error;

const DEFAULT_RESTART_DELAY_MS: u64 = 3000;
const DEFAULT_EXIT_DELAY_MS: u64 = 1000;
const DEFAULT_LOG: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";
const NODE_WINGET_ID: &str = "OpenJS.NodeJS";

// ─── RuntimeSpec ──────────────────────────────────────────────────────────────

/// The runtime every supported tool needs (`[runtime]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeSpec {
    /// Binary probed to decide whether the runtime is present.
    pub command: String,
    /// winget package id used to install the runtime on Windows.
    pub winget_id: String,
    /// Argument passed for the availability probe.
    pub probe_arg: String,
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            winget_id: NODE_WINGET_ID.to_string(),
            probe_arg: "--version".to_string(),
        }
    }
}

// ─── ToolSpec ─────────────────────────────────────────────────────────────────

/// One launchable CLI tool (`[tool.<name>]` in config.toml).
///
/// Immutable once resolved; the pipeline only reads it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolSpec {
    /// Preset key, e.g. "codex". Also the default shim/command stem.
    pub name: String,
    /// npm package installed globally when the tool is missing.
    pub package: String,
    /// Command candidates, declared order, first working probe wins.
    pub candidates: Vec<String>,
    /// Flag appended at launch when the user opts into bypass mode.
    pub bypass_flag: Option<String>,
    /// Config directory under the user profile (`uninstall --purge-config`).
    pub config_dir: String,
    /// Argument passed for the availability probe.
    #[serde(default = "default_probe_arg")]
    pub probe_arg: String,
}

fn default_probe_arg() -> String {
    "--version".to_string()
}

/// Candidate list for a command stem. On Windows the `.cmd` shim is tried
/// before the extension-less name: npm writes both and only the shim is
/// spawnable without a shell there.
fn candidates_for(stem: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{stem}.cmd"), stem.to_string()]
    } else {
        vec![stem.to_string()]
    }
}

impl ToolSpec {
    /// Built-in preset for a tool name. Unknown names get a generic preset:
    /// package == stem, no bypass flag.
    pub fn preset(name: &str) -> Self {
        match name {
            "claude" => Self {
                name: "claude".into(),
                package: "@anthropic-ai/claude-code".into(),
                candidates: candidates_for("claude"),
                bypass_flag: Some("--dangerously-skip-permissions".into()),
                config_dir: ".claude".into(),
                probe_arg: default_probe_arg(),
            },
            "codex" => Self {
                name: "codex".into(),
                package: "@openai/codex".into(),
                candidates: candidates_for("codex"),
                bypass_flag: Some("--dangerously-bypass-approvals-and-sandbox".into()),
                config_dir: ".codex".into(),
                probe_arg: default_probe_arg(),
            },
            "gemini" => Self {
                name: "gemini".into(),
                package: "@google/gemini-cli".into(),
                candidates: candidates_for("gemini"),
                bypass_flag: Some("--yolo".into()),
                config_dir: ".gemini".into(),
                probe_arg: default_probe_arg(),
            },
            other => Self {
                name: other.to_string(),
                package: other.to_string(),
                candidates: candidates_for(other),
                bypass_flag: None,
                config_dir: format!(".{other}"),
                probe_arg: default_probe_arg(),
            },
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// Partial tool override — only the fields present in TOML replace the
/// preset values.
#[derive(Debug, Clone, Deserialize, Default)]
struct ToolOverride {
    package: Option<String>,
    candidates: Option<Vec<String>>,
    bypass_flag: Option<String>,
    config_dir: Option<String>,
    probe_arg: Option<String>,
}

/// `{data_dir}/config.toml` — all fields are optional overrides.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,launchpad=trace".
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Delay before the self-restart after an installation (milliseconds).
    restart_delay_ms: Option<u64>,
    /// Grace delay before the launcher exits after a successful launch.
    exit_delay_ms: Option<u64>,
    /// Runtime override (`[runtime]`).
    runtime: Option<RuntimeSpec>,
    /// Per-tool overrides (`[tool.claude]`, `[tool.codex]`, ...).
    tool: Option<std::collections::HashMap<String, ToolOverride>>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── Resolved configuration ───────────────────────────────────────────────────

/// Fully resolved launcher configuration handed to the pipeline.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub tool: ToolSpec,
    pub runtime: RuntimeSpec,
    pub restart_delay_ms: u64,
    pub exit_delay_ms: u64,
    pub log: String,
    pub log_format: String,
    pub data_dir: PathBuf,
}

impl LauncherConfig {
    /// Layer TOML over presets and CLI values over both.
    pub fn resolve(
        tool_name: &str,
        data_dir: PathBuf,
        cli_log: Option<String>,
        cli_log_format: Option<String>,
    ) -> Self {
        let toml_cfg = load_toml(&data_dir).unwrap_or_default();

        let mut tool = ToolSpec::preset(tool_name);
        if let Some(ov) = toml_cfg.tool.as_ref().and_then(|m| m.get(tool_name)) {
            if let Some(v) = &ov.package {
                tool.package = v.clone();
            }
            if let Some(v) = &ov.candidates {
                tool.candidates = v.clone();
            }
            if let Some(v) = &ov.bypass_flag {
                tool.bypass_flag = Some(v.clone());
            }
            if let Some(v) = &ov.config_dir {
                tool.config_dir = v.clone();
            }
            if let Some(v) = &ov.probe_arg {
                tool.probe_arg = v.clone();
            }
        }

        Self {
            tool,
            runtime: toml_cfg.runtime.unwrap_or_default(),
            restart_delay_ms: toml_cfg
                .restart_delay_ms
                .unwrap_or(DEFAULT_RESTART_DELAY_MS),
            exit_delay_ms: toml_cfg.exit_delay_ms.unwrap_or(DEFAULT_EXIT_DELAY_MS),
            log: cli_log
                .or(toml_cfg.log)
                .unwrap_or_else(|| DEFAULT_LOG.to_string()),
            log_format: cli_log_format
                .or(toml_cfg.log_format)
                .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string()),
            data_dir,
        }
    }
}

/// Default data directory: `~/.launchpad` (or a relative `.launchpad` as a
/// last resort when no home can be determined).
pub fn default_data_dir() -> PathBuf {
    crate::context::home_dir()
        .map(|h| h.join(".launchpad"))
        .unwrap_or_else(|| PathBuf::from(".launchpad"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn codex_preset_carries_bypass_flag() {
        let spec = ToolSpec::preset("codex");
        assert_eq!(spec.package, "@openai/codex");
        assert_eq!(
            spec.bypass_flag.as_deref(),
            Some("--dangerously-bypass-approvals-and-sandbox")
        );
        let expected_first = if cfg!(windows) { "codex.cmd" } else { "codex" };
        assert_eq!(
            spec.candidates.first().map(String::as_str),
            Some(expected_first)
        );
    }

    #[test]
    fn unknown_tool_gets_generic_preset() {
        let spec = ToolSpec::preset("mycli");
        assert_eq!(spec.package, "mycli");
        assert!(spec.bypass_flag.is_none());
        assert_eq!(spec.config_dir, ".mycli");
    }

    #[test]
    fn defaults_apply_without_config_file() {
        let tmp = TempDir::new().unwrap();
        let cfg = LauncherConfig::resolve("codex", tmp.path().to_path_buf(), None, None);
        assert_eq!(cfg.restart_delay_ms, 3000);
        assert_eq!(cfg.exit_delay_ms, 1000);
        assert_eq!(cfg.log, "info");
        assert_eq!(cfg.runtime.command, "node");
    }

    #[test]
    fn toml_overrides_preset_fields() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            r#"
restart_delay_ms = 500

[runtime]
command = "nodejs"

[tool.codex]
package = "@openai/codex-preview"
candidates = ["codex-preview"]
"#,
        )
        .unwrap();

        let cfg = LauncherConfig::resolve("codex", tmp.path().to_path_buf(), None, None);
        assert_eq!(cfg.restart_delay_ms, 500);
        assert_eq!(cfg.runtime.command, "nodejs");
        assert_eq!(cfg.tool.package, "@openai/codex-preview");
        assert_eq!(cfg.tool.candidates, vec!["codex-preview".to_string()]);
        // Untouched preset fields survive the override.
        assert_eq!(
            cfg.tool.bypass_flag.as_deref(),
            Some("--dangerously-bypass-approvals-and-sandbox")
        );
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "this is { not toml").unwrap();

        let cfg = LauncherConfig::resolve("claude", tmp.path().to_path_buf(), None, None);
        assert_eq!(cfg.tool.package, "@anthropic-ai/claude-code");
        assert_eq!(cfg.restart_delay_ms, 3000);
    }

    #[test]
    fn cli_log_wins_over_toml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "log = \"warn\"\n").unwrap();

        let cfg = LauncherConfig::resolve(
            "claude",
            tmp.path().to_path_buf(),
            Some("trace".into()),
            None,
        );
        assert_eq!(cfg.log, "trace");
    }
}
