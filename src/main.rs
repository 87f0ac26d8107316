// SPDX-License-Identifier: MIT
//! launchpad binary — argument parsing, logging setup, and ownership of
//! the terminal actions the pipeline only decides on (restart, exit).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use launchpad::config::{default_data_dir, LauncherConfig};
use launchpad::context::ExecContext;
use launchpad::doctor;
use launchpad::envrefresh::{default_refreshers, refresh_environment};
use launchpad::logsink::{ConsoleSink, LogSink};
use launchpad::pipeline::{Pipeline, PipelineOutcome};
use launchpad::process::SystemProcessHost;
use launchpad::restart::{relaunch, RestartState};
use launchpad::uninstall::{self, UninstallOptions};

#[derive(Parser)]
#[command(
    name = "launchpad",
    about = "Dependency bootstrapper & launcher for Node-based AI CLIs",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Tool to bootstrap and launch (claude, codex, gemini, or any
    /// configured name)
    #[arg(long, env = "LAUNCHPAD_TOOL", default_value = "codex", global = true)]
    tool: String,

    /// Working directory the session starts in (created if missing;
    /// default: current directory)
    #[arg(long, env = "LAUNCHPAD_WORK_DIR", global = true)]
    work_dir: Option<PathBuf>,

    /// Append the tool's approval/sandbox bypass flag at launch
    #[arg(long, global = true)]
    bypass: bool,

    /// Resume the pipeline immediately (set by the self-restart)
    #[arg(long, global = true)]
    auto_start: bool,

    /// Data directory for config.toml and logs
    #[arg(long, env = "LAUNCHPAD_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LAUNCHPAD_LOG", global = true)]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "LAUNCHPAD_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Log output format: "pretty" (default) | "json"
    #[arg(long, env = "LAUNCHPAD_LOG_FORMAT", global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap dependencies and start the tool (default when no
    /// subcommand given).
    ///
    /// Probes for Node.js and the tool's CLI, installs whatever is
    /// missing, restarts itself once after an install so new PATH entries
    /// are visible, then opens the tool in a new interactive session.
    ///
    /// Examples:
    ///   launchpad
    ///   launchpad --tool claude --work-dir ~/projects/app
    ///   launchpad --tool codex --bypass
    Launch,
    /// Run diagnostic checks without changing anything.
    ///
    /// Checks runtime and npm availability, the tool's command
    /// candidates, and working-directory writability.
    ///
    /// Exit code 0 if all checks pass, 1 if any check fails.
    ///
    /// Examples:
    ///   launchpad doctor
    ///   launchpad doctor --tool gemini --json
    Doctor {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
    /// Remove the tool and optionally the runtime.
    ///
    /// Runs `npm uninstall -g`, deletes leftover command shims, and can
    /// additionally remove Node.js and the tool's config directory.
    ///
    /// Examples:
    ///   launchpad uninstall --tool codex
    ///   launchpad uninstall --tool claude --with-runtime --purge-config --yes
    Uninstall {
        /// Also remove the Node.js runtime (may prompt for elevation)
        #[arg(long)]
        with_runtime: bool,
        /// Also delete the tool's config directory under the user profile
        #[arg(long)]
        purge_config: bool,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    let cfg = LauncherConfig::resolve(
        &args.tool,
        data_dir,
        args.log.clone(),
        args.log_format.clone(),
    );

    let _log_guard = setup_logging(&cfg.log, args.log_file.as_deref(), &cfg.log_format);

    let work_dir = args
        .work_dir
        .clone()
        .map(Ok)
        .unwrap_or_else(|| std::env::current_dir().context("cannot determine current directory"))?;

    let flags = args_snapshot(&args);
    match args.command.unwrap_or(Command::Launch) {
        Command::Launch => run_launch(&flags, &cfg, work_dir).await,
        Command::Doctor { json } => run_doctor(&cfg, work_dir, json).await,
        Command::Uninstall {
            with_runtime,
            purge_config,
            yes,
        } => {
            run_uninstall(
                &cfg,
                work_dir,
                UninstallOptions {
                    with_runtime,
                    purge_config,
                },
                yes,
            )
            .await
        }
    }
}

/// The launch-relevant flags, detached from clap so they can be forwarded
/// across the self-restart.
struct LaunchFlags {
    tool: String,
    bypass: bool,
    auto_start: bool,
    data_dir: Option<PathBuf>,
}

fn args_snapshot(args: &Args) -> LaunchFlags {
    LaunchFlags {
        tool: args.tool.clone(),
        bypass: args.bypass,
        auto_start: args.auto_start,
        data_dir: args.data_dir.clone(),
    }
}

// ─── launch ───────────────────────────────────────────────────────────────────

async fn run_launch(flags: &LaunchFlags, cfg: &LauncherConfig, work_dir: PathBuf) -> Result<()> {
    let host = Arc::new(SystemProcessHost);
    let sink: Arc<ConsoleSink> = Arc::new(ConsoleSink);
    let pipeline = Pipeline::new(host.clone(), sink.clone());

    if flags.auto_start {
        sink.info("Starting auto-execution after restart...");
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }

    let outcome = match pipeline.run(cfg, &work_dir, flags.bypass).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Catch-all: surface the fault and exit non-zero instead of
            // leaving the terminal with a half-finished run.
            let err = anyhow::Error::from(e);
            sink.info(&format!("An error occurred: {err:#}"));
            error!(err = %format!("{err:#}"), "pipeline run failed");
            std::process::exit(1);
        }
    };

    match outcome {
        PipelineOutcome::Launched { command } => {
            info!(command = %command, "session launched");
            tokio::time::sleep(Duration::from_millis(cfg.exit_delay_ms)).await;
            Ok(())
        }
        PipelineOutcome::RestartScheduled { work_dir } => {
            sink.info(&format!(
                "Restarting in {} seconds to update environment variables...",
                cfg.restart_delay_ms / 1000
            ));
            tokio::time::sleep(Duration::from_millis(cfg.restart_delay_ms)).await;
            sink.info("Restarting application...");

            let ctx = ExecContext::new(&work_dir, flags.bypass)?;
            refresh_environment(&default_refreshers(), host.as_ref(), &ctx).await;

            let mut extra = vec!["--tool".to_string(), flags.tool.clone()];
            if flags.bypass {
                extra.push("--bypass".to_string());
            }
            if let Some(dir) = &flags.data_dir {
                extra.push("--data-dir".to_string());
                extra.push(dir.display().to_string());
            }

            if let Err(e) = relaunch(&RestartState::new(work_dir), &extra) {
                sink.info(&format!("Failed to restart application: {e:#}"));
                error!(err = %format!("{e:#}"), "self-restart failed");
                std::process::exit(1);
            }
            Ok(())
        }
        PipelineOutcome::Aborted { reason } => {
            error!(reason = %reason, "launch aborted");
            std::process::exit(1);
        }
    }
}

// ─── doctor ───────────────────────────────────────────────────────────────────

async fn run_doctor(cfg: &LauncherConfig, work_dir: PathBuf, json: bool) -> Result<()> {
    let host = SystemProcessHost;
    let ctx = ExecContext::new(&work_dir, false)?;
    let report = doctor::run_doctor(&host, &ctx, cfg).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        doctor::print_doctor_results(&report);
    }

    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

// ─── uninstall ────────────────────────────────────────────────────────────────

async fn run_uninstall(
    cfg: &LauncherConfig,
    work_dir: PathBuf,
    opts: UninstallOptions,
    yes: bool,
) -> Result<()> {
    if !yes && !confirm_uninstall(cfg, opts)? {
        println!("Aborted.");
        return Ok(());
    }

    let host = SystemProcessHost;
    let sink = ConsoleSink;
    let ctx = ExecContext::new(&work_dir, false)?;
    uninstall::uninstall(&host, &ctx, cfg, opts, &sink).await
}

fn confirm_uninstall(cfg: &LauncherConfig, opts: UninstallOptions) -> Result<bool> {
    let scope = if opts.with_runtime {
        format!("{} and Node.js", cfg.tool.name)
    } else {
        cfg.tool.name.clone()
    };
    print!("Are you sure you want to uninstall {scope}? [y/N] ");
    use std::io::Write as _;
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

// ─── logging setup ────────────────────────────────────────────────────────────

/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format)
/// or `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stderr-only
/// logging with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("launchpad.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr",
                dir.display()
            );
            init_stderr_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_stderr_only(log_level, use_json);
        None
    }
}

/// Tracing goes to stderr so subprocess transcripts own stdout.
fn init_stderr_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
