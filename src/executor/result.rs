use serde::{Deserialize, Serialize};

/// Outcome of a single script execution.
///
/// Every execution path (blocked, timed out, spawn failure, normal exit)
/// produces one of these; the executor never returns an error to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub return_code: i32,
    pub timed_out: bool,
    pub execution_time: f64,
}

impl ScriptResult {
    /// A request rejected before any process was spawned.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            return_code: 0,
            timed_out: false,
            execution_time: 0.0,
        }
    }

    /// A failure in the orchestration layer itself (temp file, spawn, wait).
    pub fn failed(message: impl Into<String>, execution_time: f64) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            return_code: -1,
            timed_out: false,
            execution_time,
        }
    }

    pub fn timed_out(message: impl Into<String>, output: String, execution_time: f64) -> Self {
        Self {
            success: false,
            output,
            error: Some(message.into()),
            return_code: -1,
            timed_out: true,
            execution_time,
        }
    }

    /// Classify a process that ran to exit.
    pub fn completed(return_code: i32, stdout: String, stderr: String, execution_time: f64) -> Self {
        let success = return_code == 0;
        let error = if !stderr.is_empty() {
            Some(stderr)
        } else if success {
            None
        } else {
            Some(format!("Process exited with code {}", return_code))
        };

        Self {
            success,
            output: stdout,
            error,
            return_code,
            timed_out: false,
            execution_time,
        }
    }
}

/// Truncate `text` to at most `cap` bytes, cutting on a char boundary.
pub fn cap_output(mut text: String, cap: usize) -> String {
    if text.len() <= cap {
        return text;
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    tracing::warn!(
        original_len = text.len(),
        cap,
        "output exceeded cap, truncating"
    );
    text.truncate(end);
    text
}
