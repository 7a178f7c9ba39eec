use super::{ScriptExecutor, ScriptResult};
use crate::sandbox;
use crate::security::check_command;
use std::path::Path;
use std::process::Command;

impl ScriptExecutor {
    /// Check `command` against the blocklist, then run it with
    /// `<shell> -c` inside `workspace`.
    pub fn run_bash(
        &self,
        command: &str,
        workspace: &Path,
        timeout_secs: u64,
        stdin: Option<&str>,
    ) -> ScriptResult {
        if let Err(blocked) = check_command(command) {
            tracing::info!(pattern = %blocked.pattern, "shell command rejected");
            return ScriptResult::rejected(blocked.to_string());
        }

        let root = match self.prepare_workspace(workspace) {
            Ok(root) => root,
            Err(rejected) => return rejected,
        };
        let timeout = self.config.clamp_timeout(timeout_secs);

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(&root)
            .env("WORKSPACE", &root);

        let run = sandbox::run(cmd, &self.run_spec(timeout, stdin));
        self.finish(run, timeout, "Script")
    }
}
