// SPDX-License-Identifier: MIT
//! launchpad — dependency bootstrapper & launcher for Node-based AI CLIs.
//!
//! Given a working directory, make sure Node.js and the selected tool's
//! npm package exist (installing them when missing), then start the tool
//! in a new interactive terminal session. If anything was installed, the
//! launcher restarts itself first so the freshly-written PATH entries are
//! visible, resuming via `--auto-start --work-dir <dir>`.
//!
//! The binary in `main.rs` owns process lifecycle (restart, exit codes);
//! everything in this library is a decision engine over the
//! [`process::ProcessHost`] and [`logsink::LogSink`] seams and can run
//! against fakes.

pub mod config;
pub mod context;
pub mod doctor;
pub mod envrefresh;
pub mod installer;
pub mod launcher;
pub mod logsink;
pub mod pipeline;
pub mod process;
pub mod restart;
pub mod uninstall;

pub use config::{LauncherConfig, RuntimeSpec, ToolSpec};
pub use context::ExecContext;
pub use logsink::{ChannelSink, ConsoleSink, LogLine, LogSink, MemorySink, StreamSource};
pub use pipeline::{LaunchError, Pipeline, PipelineOutcome};
pub use process::{ProcessHost, ProcessResult, SystemProcessHost};
