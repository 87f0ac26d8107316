// SPDX-License-Identifier: MIT
//! Launch step — settle on a working command candidate and hand the
//! terminal session over to the tool.
//!
//! Candidates are tried in declared order and the first one whose version
//! probe answers wins. On Windows the session opens in a new console
//! window (`cmd /c start ... /k`); elsewhere the tool is spawned directly
//! in the working directory and inherits the launcher's terminal.

use tracing::info;

use crate::config::ToolSpec;
use crate::context::ExecContext;
use crate::logsink::LogSink;
use crate::process::ProcessHost;

/// Fully assembled invocation for the interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// First candidate (declared order) whose probe exits 0, or None.
pub async fn select_command(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    tool: &ToolSpec,
    sink: &dyn LogSink,
) -> Option<String> {
    for candidate in &tool.candidates {
        sink.info(&format!("Testing command: {candidate}"));
        if host.probe(candidate, &[tool.probe_arg.as_str()], ctx).await {
            sink.info(&format!("Found working command: {candidate}"));
            info!(candidate = %candidate, "selected launch command");
            return Some(candidate.clone());
        }
    }
    None
}

/// Assemble the new-session invocation for `command`, appending the tool's
/// bypass flag iff the context enables it.
pub fn session_command(command: &str, tool: &ToolSpec, ctx: &ExecContext) -> SessionCommand {
    let mut tool_invocation = command.to_string();
    if ctx.bypass {
        if let Some(flag) = &tool.bypass_flag {
            tool_invocation.push(' ');
            tool_invocation.push_str(flag);
        }
    }

    if cfg!(windows) {
        // `start` detaches a fresh console; `/k` keeps it open when the
        // tool exits so the user can read the last output.
        SessionCommand {
            program: "cmd.exe".to_string(),
            args: vec![
                "/c".to_string(),
                "start".to_string(),
                "cmd.exe".to_string(),
                "/k".to_string(),
                format!("cd /d \"{}\" && {tool_invocation}", ctx.work_dir.display()),
            ],
        }
    } else {
        let mut args = Vec::new();
        if ctx.bypass {
            if let Some(flag) = &tool.bypass_flag {
                args.push(flag.clone());
            }
        }
        SessionCommand {
            program: command.to_string(),
            args,
        }
    }
}

/// Spawn the session and return; the launcher exits shortly after.
pub async fn launch_session(
    host: &dyn ProcessHost,
    ctx: &ExecContext,
    tool: &ToolSpec,
    command: &str,
    sink: &dyn LogSink,
) -> anyhow::Result<()> {
    let session = session_command(command, tool, ctx);
    let arg_refs: Vec<&str> = session.args.iter().map(String::as_str).collect();
    host.spawn_detached(&session.program, &arg_refs, ctx).await?;
    sink.info(&format!(
        "{} started successfully. Closing launcher...",
        tool.name
    ));
    Ok(())
}
