// SPDX-License-Identifier: MIT
//! Process host — every external command the launcher runs goes through
//! this seam so the pipeline can be tested without spawning anything real.
//!
//! [`SystemProcessHost`] is the production implementation on top of
//! `tokio::process`. Output capture streams stdout and stderr line-by-line
//! into the caller's [`LogSink`] in arrival order; the future resolves when
//! the child exits. There is no cancellation and no timeout — a step waits
//! for its child indefinitely.

use std::process::Stdio;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::context::ExecContext;
use crate::logsink::{LogLine, LogSink, StreamSource};

/// Outcome of one captured subprocess invocation. Transient — produced,
/// logged, and dropped per step.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub exit_code: i32,
    /// Combined stdout/stderr lines in arrival order.
    pub lines: Vec<LogLine>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Concatenated stdout text (diagnostic greps).
    pub fn stdout_text(&self) -> String {
        self.lines
            .iter()
            .filter(|l| l.source == StreamSource::Stdout)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Seam between the pipeline and the operating system.
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// True iff `program args` spawns and exits 0. A spawn failure (binary
    /// not found) is "not available", never an error.
    async fn probe(&self, program: &str, args: &[&str], ctx: &ExecContext) -> bool;

    /// Run to completion, streaming each output line to `sink` as it
    /// arrives.
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        ctx: &ExecContext,
        sink: &dyn LogSink,
    ) -> Result<ProcessResult>;

    /// Run without output capture and block until exit. Elevated children
    /// cannot be piped, so their output goes straight to the console.
    async fn run_elevated(&self, program: &str, args: &[&str], ctx: &ExecContext) -> Result<i32>;

    /// Spawn and do not wait — used to hand the terminal session over to
    /// the launched tool.
    async fn spawn_detached(&self, program: &str, args: &[&str], ctx: &ExecContext) -> Result<()>;
}

// ─── SystemProcessHost ────────────────────────────────────────────────────────

/// Production host backed by `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct SystemProcessHost;

/// Programs that must resolve through the shell on Windows: `npm` is a
/// `.cmd` shim, and `.cmd`/`.bat` files are not directly spawnable.
const SHELL_RESOLVED: &[&str] = &["npm", "node", "npx"];

fn needs_shell(program: &str) -> bool {
    cfg!(windows)
        && (SHELL_RESOLVED.contains(&program)
            || program.ends_with(".cmd")
            || program.ends_with(".bat"))
}

impl SystemProcessHost {
    fn command(&self, program: &str, args: &[&str], ctx: &ExecContext) -> Command {
        let mut cmd = if needs_shell(program) {
            let mut c = Command::new("cmd.exe");
            c.arg("/c").arg(program).args(args);
            c
        } else {
            let mut c = Command::new(program);
            c.args(args);
            c
        };
        cmd.current_dir(&ctx.work_dir);
        cmd.env("PATH", ctx.child_path());
        cmd
    }
}

#[async_trait]
impl ProcessHost for SystemProcessHost {
    async fn probe(&self, program: &str, args: &[&str], ctx: &ExecContext) -> bool {
        let status = self
            .command(program, args, ctx)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(s) => s.success(),
            Err(e) => {
                debug!(program, err = %e, "probe spawn failed");
                false
            }
        }
    }

    async fn run(
        &self,
        program: &str,
        args: &[&str],
        ctx: &ExecContext,
        sink: &dyn LogSink,
    ) -> Result<ProcessResult> {
        let mut child = self
            .command(program, args, ctx)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn `{program}`"))?;

        let stdout = child.stdout.take().context("no stdout handle")?;
        let stderr = child.stderr.take().context("no stderr handle")?;

        // Both streams drain into one channel; the receiver sees lines in
        // arrival order regardless of which stream produced them.
        let (tx, mut rx) = mpsc::channel::<LogLine>(256);
        spawn_line_reader(stdout, StreamSource::Stdout, tx.clone());
        spawn_line_reader(stderr, StreamSource::Stderr, tx);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            sink.emit(line.clone());
            lines.push(line);
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("failed to wait for `{program}`"))?;
        let exit_code = status.code().unwrap_or(-1);
        debug!(program, exit_code, "process finished");

        Ok(ProcessResult { exit_code, lines })
    }

    async fn run_elevated(&self, program: &str, args: &[&str], ctx: &ExecContext) -> Result<i32> {
        let status = self
            .command(program, args, ctx)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to spawn `{program}`"))?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn spawn_detached(&self, program: &str, args: &[&str], ctx: &ExecContext) -> Result<()> {
        self.command(program, args, ctx)
            .spawn()
            .with_context(|| format!("failed to launch `{program}`"))?;
        Ok(())
    }
}

fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    source: StreamSource,
    tx: mpsc::Sender<LogLine>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream).lines();
        while let Ok(Some(text)) = reader.next_line().await {
            if tx.send(LogLine { source, text }).await.is_err() {
                break;
            }
        }
    });
}
