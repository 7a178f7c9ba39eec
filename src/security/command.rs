//! Dangerous-command blocklist for the shell runner.
//!
//! Commands are lower-cased and checked for known-dangerous substrings. The
//! same list is applied to a whitespace-collapsed copy of the command, to each
//! `&&`/`||`/`;` segment and to each `$(...)` or backtick subshell, and a
//! structural check catches `curl ... | sh`.
//!
//! This only raises the bar against naive misuse. Variable expansion,
//! encodings, or an alternate spelling of the same operation get through; it
//! is not a security boundary. Being substring based, it also over-matches
//! (`rm -rf /tmp/x` contains `rm -rf /`, `pseudo` contains `sudo`).

use thiserror::Error;

/// Lower-case substrings that cause a command to be refused.
pub const BLOCKED_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "rm -fr /",
    "dd if=",
    "mkfs",
    ":(){ :|:& };:",
    ":(){ :|:&};:",
    ":(){:|:&};:",
    "chmod -r 777 /",
    "sudo",
    "su ",
    "curl | bash",
    "wget | bash",
    "curl | sh",
    "wget | sh",
    "> /dev/sd",
];

const DOWNLOADERS: &[&str] = &["curl", "wget"];
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Blocked dangerous command pattern: {pattern}")]
pub struct BlockedCommand {
    pub pattern: String,
}

impl BlockedCommand {
    fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

/// Check a shell command against the blocklist.
pub fn check_command(command: &str) -> Result<(), BlockedCommand> {
    let lowered = command.to_lowercase();
    check_lowered(&lowered)
}

fn check_lowered(command: &str) -> Result<(), BlockedCommand> {
    let collapsed = collapse_whitespace(command);
    for candidate in [command, collapsed.as_str()] {
        if let Some(pattern) = BLOCKED_PATTERNS.iter().find(|p| candidate.contains(**p)) {
            return Err(BlockedCommand::new(*pattern));
        }
    }

    for part in split_shell_commands(command) {
        let part = collapse_whitespace(part);
        if part.is_empty() {
            continue;
        }
        if let Some(pattern) = BLOCKED_PATTERNS.iter().find(|p| part.contains(**p)) {
            return Err(BlockedCommand::new(*pattern));
        }
        check_pipe_to_shell(&part)?;
    }

    for inner in extract_subshell_commands(command) {
        check_lowered(&inner)?;
    }
    Ok(())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn base_name(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

/// A download command piped straight into a shell, whatever its arguments.
fn check_pipe_to_shell(command: &str) -> Result<(), BlockedCommand> {
    if !command.contains('|') {
        return Ok(());
    }
    let segments: Vec<&str> = command.split('|').collect();
    for pair in segments.windows(2) {
        let source = pair[0].split_whitespace().next().map(base_name).unwrap_or("");
        let sink = pair[1].split_whitespace().next().map(base_name).unwrap_or("");
        if DOWNLOADERS.contains(&source) && SHELLS.contains(&sink) {
            return Err(BlockedCommand::new(format!("{} | {}", source, sink)));
        }
    }
    Ok(())
}

/// Split a command string on shell chain operators (`&&`, `||`, `;`).
/// Single `|` (pipe) is not a split point. Operators inside quotes are ignored.
fn split_shell_commands(command: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = command.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    while i < len {
        if bytes[i] == b'\'' && !in_double_quote {
            in_single_quote = !in_single_quote;
            i += 1;
            continue;
        }
        if bytes[i] == b'"' && !in_single_quote {
            in_double_quote = !in_double_quote;
            i += 1;
            continue;
        }
        // e.g. `\;` in find -exec
        if bytes[i] == b'\\' && !in_single_quote && i + 1 < len {
            i += 2;
            continue;
        }

        if !in_single_quote && !in_double_quote {
            if bytes[i] == b';' || bytes[i] == b'\n' {
                parts.push(&command[start..i]);
                start = i + 1;
                i += 1;
                continue;
            }
            if i + 1 < len
                && ((bytes[i] == b'&' && bytes[i + 1] == b'&')
                    || (bytes[i] == b'|' && bytes[i + 1] == b'|'))
            {
                parts.push(&command[start..i]);
                start = i + 2;
                i += 2;
                continue;
            }
        }
        i += 1;
    }
    if start <= len {
        parts.push(&command[start..]);
    }
    parts
}

/// Extract commands from `$(...)` subshells and backtick expressions.
fn extract_subshell_commands(command: &str) -> Vec<String> {
    let mut results = Vec::new();
    let bytes = command.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if i + 1 < len && bytes[i] == b'$' && bytes[i + 1] == b'(' {
            let start = i + 2;
            let mut depth = 1i32;
            let mut j = start;
            while j < len && depth > 0 {
                if j + 1 < len && bytes[j] == b'$' && bytes[j + 1] == b'(' {
                    depth += 1;
                    j += 2;
                    continue;
                }
                if bytes[j] == b')' {
                    depth -= 1;
                }
                if depth > 0 {
                    j += 1;
                }
            }
            if depth == 0 && start < j {
                results.push(command[start..j].to_string());
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }

    let mut in_backtick = false;
    let mut bt_start = 0;
    for (idx, &b) in bytes.iter().enumerate() {
        if b == b'`' {
            if in_backtick {
                if bt_start < idx {
                    results.push(command[bt_start..idx].to_string());
                }
                in_backtick = false;
            } else {
                in_backtick = true;
                bt_start = idx + 1;
            }
        }
    }

    results
}
