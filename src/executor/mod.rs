//! Entry points that turn a script plus a workspace into a [`ScriptResult`].
//!
//! Every path through here ends in a `ScriptResult`: rejections, spawn
//! failures and timeouts are reported in the result, never raised.

pub mod python;
pub mod result;
pub mod shell;

pub use result::{cap_output, ScriptResult};

use crate::config::{Config, ExecutorConfig, LimitsConfig};
use crate::sandbox::{Outcome, ProcessOutput, RunSpec, SandboxError};
use crate::security::{path::resolve_path, CodeValidator, DenyListValidator};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct ScriptExecutor {
    config: ExecutorConfig,
    limits: LimitsConfig,
    validator: Box<dyn CodeValidator>,
}

impl ScriptExecutor {
    pub fn new(config: ExecutorConfig, limits: LimitsConfig) -> Self {
        Self {
            config,
            limits,
            validator: Box::new(DenyListValidator),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.executor.clone(), config.limits)
    }

    /// Replace the Python validator used before every run.
    pub fn with_validator(mut self, validator: impl CodeValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the configured validator alone.
    pub fn validate(&self, source: &str) -> (bool, Option<String>) {
        match self.validator.validate(source) {
            Ok(()) => (true, None),
            Err(violation) => (false, Some(violation.to_string())),
        }
    }

    fn run_spec<'a>(&self, timeout: Duration, stdin: Option<&'a str>) -> RunSpec<'a> {
        RunSpec {
            timeout,
            kill_grace: self.config.kill_grace(),
            output_cap: self.config.output_cap_bytes,
            stdin,
            limits: self.limits,
        }
    }

    /// Resolve the workspace root the child will run in.
    fn prepare_workspace(&self, workspace: &Path) -> Result<PathBuf, ScriptResult> {
        match resolve_path(workspace) {
            Ok(root) if root.is_dir() => Ok(root),
            Ok(_) => Err(ScriptResult::rejected(format!(
                "Workspace is not a directory: {}",
                workspace.display()
            ))),
            Err(e) => Err(ScriptResult::rejected(format!(
                "Invalid workspace {}: {}",
                workspace.display(),
                e
            ))),
        }
    }

    /// Convert the sandbox's answer into the caller-facing result.
    fn finish(
        &self,
        run: Result<ProcessOutput, SandboxError>,
        timeout: Duration,
        subject: &str,
    ) -> ScriptResult {
        let cap = self.config.output_cap_bytes;
        match run {
            Ok(out) => {
                let secs = out.elapsed.as_secs_f64();
                let stdout = cap_output(out.stdout, cap);
                match out.outcome {
                    Outcome::TimedOut => ScriptResult::timed_out(
                        format!("{} timed out after {}s", subject, timeout.as_secs()),
                        stdout,
                        secs,
                    ),
                    Outcome::Exited(code) => {
                        tracing::debug!(code, secs, "{} finished", subject.to_lowercase());
                        ScriptResult::completed(code, stdout, cap_output(out.stderr, cap), secs)
                    }
                }
            }
            Err(e @ SandboxError::Spawn { .. }) => {
                tracing::warn!("{}", e);
                ScriptResult::failed(e.to_string(), 0.0)
            }
            Err(e) => {
                tracing::warn!("execution error: {}", e);
                ScriptResult::failed(format!("Execution error: {}", e), 0.0)
            }
        }
    }
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default(), LimitsConfig::default())
    }
}

/// Validate and run a Python snippet with default settings.
pub fn run_python_script(
    source: &str,
    workspace: &Path,
    timeout_secs: u64,
    stdin: Option<&str>,
) -> ScriptResult {
    ScriptExecutor::default().run_python(source, workspace, timeout_secs, stdin)
}

/// Blocklist-check and run a shell command with default settings.
pub fn run_bash_script(
    command: &str,
    workspace: &Path,
    timeout_secs: u64,
    stdin: Option<&str>,
) -> ScriptResult {
    ScriptExecutor::default().run_bash(command, workspace, timeout_secs, stdin)
}
