use super::{ScriptExecutor, ScriptResult};
use crate::sandbox::{self, SandboxError};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

/// Prepended to every script. Pins the working directory to the workspace
/// and routes `open` (builtin and `io.open`) through a check that the
/// resolved path stays under it. Raw descriptors (`os.open`) are not covered.
const PREAMBLE: &str = r#"def _script_runner_guard():
    import builtins, io, os

    root = os.path.realpath(os.environ.get("WORKSPACE", "/workspace"))
    real_open = builtins.open

    def guarded_open(file, *args, **kwargs):
        if not isinstance(file, int):
            target = os.fsdecode(os.path.realpath(os.fspath(file)))
            if os.path.commonpath([root, target]) != root:
                raise PermissionError(f"Access denied: {file} is outside workspace")
        return real_open(file, *args, **kwargs)

    builtins.open = guarded_open
    io.open = guarded_open
    os.chdir(root)


_script_runner_guard()
del _script_runner_guard
"#;

const FUTURE_IMPORT: &str = "from __future__ import";

impl ScriptExecutor {
    /// Validate `source`, then run it with the configured interpreter inside
    /// `workspace`.
    pub fn run_python(
        &self,
        source: &str,
        workspace: &Path,
        timeout_secs: u64,
        stdin: Option<&str>,
    ) -> ScriptResult {
        if let Err(violation) = self.validator.validate(source) {
            tracing::info!(%violation, "python script rejected");
            return ScriptResult::rejected(format!("Code validation failed: {}", violation));
        }

        let root = match self.prepare_workspace(workspace) {
            Ok(root) => root,
            Err(rejected) => return rejected,
        };
        let timeout = self.config.clamp_timeout(timeout_secs);

        // removed when `script` drops, on every return path
        let script = match write_script(source) {
            Ok(script) => script,
            Err(e) => return self.finish(Err(e), timeout, "Script"),
        };

        let mut cmd = Command::new(&self.config.python_interpreter);
        cmd.arg(script.path())
            .current_dir(&root)
            .env("WORKSPACE", &root)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONUNBUFFERED", "1");

        let run = sandbox::run(cmd, &self.run_spec(timeout, stdin));
        self.finish(run, timeout, "Script")
    }
}

fn write_script(source: &str) -> Result<NamedTempFile, SandboxError> {
    let mut file = tempfile::Builder::new()
        .prefix("script_")
        .suffix(".py")
        .tempfile()
        .map_err(SandboxError::TempFile)?;
    file.write_all(wrap_source(source).as_bytes())
        .and_then(|_| file.flush())
        .map_err(SandboxError::TempFile)?;
    Ok(file)
}

/// Put the preamble in front of `source`. Leading `from __future__` imports
/// must stay first in the file, so they are moved above it.
fn wrap_source(source: &str) -> String {
    let mut future = Vec::new();
    let mut body = Vec::new();
    let mut in_header = true;

    for line in source.lines() {
        let trimmed = line.trim();
        if in_header && line.starts_with(FUTURE_IMPORT) {
            future.push(line);
            body.push("");
            continue;
        }
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            in_header = false;
        }
        body.push(line);
    }

    if future.is_empty() {
        return format!("{}\n{}\n", PREAMBLE, source);
    }
    format!("{}\n{}\n{}\n", future.join("\n"), PREAMBLE, body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutorConfig, LimitsConfig};
    use tempfile::TempDir;

    #[test]
    fn test_wrap_source_prepends_preamble() {
        let wrapped = wrap_source("print('hi')");
        assert!(wrapped.starts_with("def _script_runner_guard():"));
        assert!(wrapped.trim_end().ends_with("print('hi')"));
    }

    #[test]
    fn test_wrap_source_hoists_future_imports() {
        let source = "# header\nfrom __future__ import annotations\nimport json\nprint(1)";
        let wrapped = wrap_source(source);
        assert!(wrapped.starts_with("from __future__ import annotations\n"));
        assert_eq!(wrapped.matches(FUTURE_IMPORT).count(), 1);
        let preamble_at = wrapped.find("_script_runner_guard()").unwrap();
        let user_at = wrapped.find("import json").unwrap();
        assert!(preamble_at < user_at);
    }

    #[test]
    fn test_wrap_source_leaves_late_future_import() {
        // not hoisted, Python reports it as the user's syntax error
        let wrapped = wrap_source("x = 1\nfrom __future__ import annotations");
        assert!(wrapped.starts_with("def _script_runner_guard():"));
    }

    #[test]
    fn test_write_script_creates_py_file() {
        let script = write_script("print(1)").unwrap();
        let name = script.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("script_"));
        assert!(name.ends_with(".py"));
        let contents = std::fs::read_to_string(script.path()).unwrap();
        assert!(contents.contains("print(1)"));
    }

    #[test]
    fn test_script_file_removed_on_drop() {
        let script = write_script("print(1)").unwrap();
        let path = script.path().to_path_buf();
        drop(script);
        assert!(!path.exists());
    }

    #[test]
    fn test_blocked_import_never_spawns() {
        let dir = TempDir::new().unwrap();
        let exec = ScriptExecutor::default();
        let r = exec.run_python("import socket\nopen('marker', 'w')", dir.path(), 5, None);
        assert!(!r.success);
        assert_eq!(
            r.error.as_deref(),
            Some("Code validation failed: Blocked import: socket")
        );
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn test_syntax_error_rejected() {
        let dir = TempDir::new().unwrap();
        let r = ScriptExecutor::default().run_python("def broken(", dir.path(), 5, None);
        assert!(!r.success);
        assert!(r.error.unwrap().contains("Syntax error"));
    }

    #[test]
    fn test_missing_interpreter_reports_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let cfg = ExecutorConfig {
            python_interpreter: "/nonexistent/python3".to_string(),
            ..ExecutorConfig::default()
        };
        let exec = ScriptExecutor::new(cfg, LimitsConfig::default());
        let r = exec.run_python("print(1)", dir.path(), 5, None);
        assert!(!r.success);
        assert!(!r.timed_out);
        assert!(r
            .error
            .unwrap()
            .starts_with("Failed to start /nonexistent/python3"));
    }
}
