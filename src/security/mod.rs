pub mod command;
pub mod lexer;
pub mod path;
pub mod python;

pub use command::{check_command, BlockedCommand};
pub use path::{resolve_path, validate_workspace_path};
pub use python::{validate_python_code, CodeValidator, DenyListValidator, Violation};
