//! Sandboxed execution of Python and shell snippets for agent skills.
//!
//! Python source is statically vetted against a deny-list before it runs;
//! shell commands are checked against a blocklist of dangerous patterns.
//! Either way the child runs in the caller's workspace under a clamped
//! timeout, with captured output capped in size, and the outcome comes back
//! as a [`ScriptResult`].
//!
//! None of this is a hard security boundary. The static checks are
//! heuristics and the workspace guard for Python lives inside the child's
//! own interpreter.

pub mod config;
pub mod executor;
pub mod sandbox;
pub mod security;

pub use config::{Config, ExecutorConfig, LimitsConfig};
pub use executor::{run_bash_script, run_python_script, ScriptExecutor, ScriptResult};
pub use security::{validate_python_code, validate_workspace_path, CodeValidator};
