//! Child-process containment: a time budget, bounded output capture and,
//! on Linux, resource limits set before exec.

pub mod limits;
mod process;

pub use process::run;

use crate::config::LimitsConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to write script file: {0}")]
    TempFile(#[source] std::io::Error),
    #[error("failed to wait for child process: {0}")]
    Wait(#[source] std::io::Error),
}

/// How the child's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit status, or minus the signal number when the child was killed by one.
    Exited(i32),
    TimedOut,
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Parameters for a single [`run`].
#[derive(Debug, Clone)]
pub struct RunSpec<'a> {
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL once the timeout fires.
    pub kill_grace: Duration,
    /// Bytes kept per stream; anything past this is read and dropped.
    pub output_cap: usize,
    pub stdin: Option<&'a str>,
    pub limits: LimitsConfig,
}
