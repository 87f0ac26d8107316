// SPDX-License-Identifier: MIT
//! Pre-flight diagnostic checks for the `doctor` subcommand.
//!
//! Self-contained: probes the same binaries the pipeline would use, but
//! changes nothing on disk. Exit code 0 iff every check passes.

use std::path::Path;

use serde::Serialize;

use crate::config::LauncherConfig;
use crate::context::ExecContext;
use crate::logsink::MemorySink;
use crate::process::ProcessHost;

/// The result of a single diagnostic check.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Full doctor report.
#[derive(Debug, Serialize)]
pub struct DoctorReport {
    /// ISO 8601 timestamp of the run.
    pub generated_at: String,
    pub checks: Vec<CheckResult>,
}

impl DoctorReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    cfg: &LauncherConfig,
) -> DoctorReport {
    let checks = vec![
        check_runtime(host, ctx, cfg).await,
        check_npm(host, ctx).await,
        check_tool(host, ctx, cfg).await,
        check_work_dir_writable(&ctx.work_dir),
    ];

    DoctorReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        checks,
    }
}

/// One line per check, pass/fail marker first.
pub fn print_doctor_results(report: &DoctorReport) {
    for check in &report.checks {
        let marker = if check.passed { "ok" } else { "FAIL" };
        println!("[{marker:>4}] {} — {}", check.name, check.detail);
    }
    if report.all_passed() {
        println!("\nAll checks passed.");
    } else {
        println!("\nSome checks failed. Fix the issues above and re-run.");
    }
}

// ─── Individual checks ────────────────────────────────────────────────────────

async fn check_runtime(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    cfg: &LauncherConfig,
) -> CheckResult {
    versioned_binary_check(
        host,
        ctx,
        &cfg.runtime.command,
        &cfg.runtime.probe_arg,
        format!("{} runtime installed", cfg.runtime.command),
    )
    .await
}

async fn check_npm(host: &dyn ProcessHost, ctx: &ExecContext) -> CheckResult {
    versioned_binary_check(host, ctx, "npm", "--version", "npm installed".to_string()).await
}

async fn check_tool(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    cfg: &LauncherConfig,
) -> CheckResult {
    for candidate in &cfg.tool.candidates {
        if host
            .probe(candidate, &[cfg.tool.probe_arg.as_str()], ctx)
            .await
        {
            return CheckResult {
                name: format!("{} CLI installed", cfg.tool.name),
                passed: true,
                detail: format!("`{candidate}` answers the version probe"),
            };
        }
    }
    CheckResult {
        name: format!("{} CLI installed", cfg.tool.name),
        passed: false,
        detail: format!(
            "none of [{}] found in PATH (run `launchpad --tool {}` to install)",
            cfg.tool.candidates.join(", "),
            cfg.tool.name
        ),
    }
}

fn check_work_dir_writable(work_dir: &Path) -> CheckResult {
    let probe = work_dir.join(".launchpad-write-probe");
    let passed = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);
    CheckResult {
        name: "work dir writable".to_string(),
        passed,
        detail: if passed {
            format!("{} is writable", work_dir.display())
        } else {
            format!("cannot write into {}", work_dir.display())
        },
    }
}

/// Probe a binary and, when present, surface its first version line.
async fn versioned_binary_check(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    binary: &str,
    probe_arg: &str,
    name: String,
) -> CheckResult {
    let sink = MemorySink::new();
    match host.run(binary, &[probe_arg], ctx, &sink).await {
        Ok(result) if result.success() => {
            let version = result
                .stdout_text()
                .lines()
                .next()
                .unwrap_or("unknown version")
                .trim()
                .to_string();
            CheckResult {
                name,
                passed: true,
                detail: version,
            }
        }
        _ => CheckResult {
            name,
            passed: false,
            detail: "not found in PATH".to_string(),
        },
    }
}
