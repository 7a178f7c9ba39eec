use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use script_runner::{validate_workspace_path, Config, ScriptExecutor, ScriptResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "script-runner")]
#[command(version)]
#[command(about = "Run Python and shell snippets inside a workspace, vetted and time-boxed.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Script text; omit or pass `-` to read it from stdin
    source: Option<String>,
    /// Read the script from a file instead
    #[arg(short, long, conflicts_with = "source")]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: SourceArgs,
    /// Workspace root the script runs in
    #[arg(short, long, env = "WORKSPACE", default_value = "/workspace")]
    workspace: PathBuf,
    /// Time budget in seconds, clamped to the configured maximum
    #[arg(short, long)]
    timeout: Option<u64>,
    /// Text fed to the script on stdin
    #[arg(long)]
    stdin: Option<String>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and run a Python script
    Python(RunArgs),
    /// Run a shell command after the blocklist check
    Bash(RunArgs),
    /// Only run the Python validator
    Check(SourceArgs),
    /// Check whether a path resolves inside the workspace
    CheckPath {
        path: PathBuf,
        #[arg(short, long, env = "WORKSPACE", default_value = "/workspace")]
        workspace: PathBuf,
    },
    /// Show configuration
    Config,
}

#[derive(Clone, Copy)]
enum Language {
    Python,
    Bash,
}

fn read_source(input: &SourceArgs) -> Result<String, String> {
    if let Some(ref path) = input.file {
        return std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e));
    }
    match input.source.as_deref() {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read script from stdin: {}", e))?;
            Ok(buf)
        }
        Some(source) => Ok(source.to_string()),
    }
}

fn usage_error(message: &str) -> ExitCode {
    eprintln!("{} {}", "Error:".red().bold(), message);
    ExitCode::from(2)
}

fn report(result: &ScriptResult, json: bool) -> ExitCode {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(s) => println!("{}", s),
            Err(e) => return usage_error(&format!("Failed to serialize result: {}", e)),
        }
    } else {
        print!("{}", result.output);
        if let Some(ref error) = result.error {
            eprint!("{}", error);
            if !error.ends_with('\n') {
                eprintln!();
            }
        }
        let status = if result.timed_out {
            "timed out".yellow().bold()
        } else if result.success {
            "ok".green().bold()
        } else {
            format!("failed (exit {})", result.return_code).red().bold()
        };
        eprintln!(
            "{} {}",
            status,
            format!("({:.2}s)", result.execution_time).dimmed()
        );
    }

    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_script(language: Language, args: RunArgs) -> ExitCode {
    let source = match read_source(&args.input) {
        Ok(source) => source,
        Err(e) => return usage_error(&e),
    };
    let cfg = Config::load();
    let executor = ScriptExecutor::from_config(&cfg);
    let timeout = args.timeout.unwrap_or(cfg.executor.default_timeout_secs);
    let stdin = args.stdin.as_deref();

    let result = match language {
        Language::Python => executor.run_python(&source, &args.workspace, timeout, stdin),
        Language::Bash => executor.run_bash(&source, &args.workspace, timeout, stdin),
    };
    report(&result, args.json)
}

fn check(input: SourceArgs) -> ExitCode {
    let source = match read_source(&input) {
        Ok(source) => source,
        Err(e) => return usage_error(&e),
    };
    match ScriptExecutor::from_config(&Config::load()).validate(&source) {
        (true, _) => {
            println!("{}", "ok".green().bold());
            ExitCode::SUCCESS
        }
        (false, message) => {
            eprintln!("{}", message.unwrap_or_default().red());
            ExitCode::FAILURE
        }
    }
}

fn check_path(path: &Path, workspace: &Path) -> ExitCode {
    if validate_workspace_path(path, workspace) {
        println!("{} {}", "inside".green().bold(), path.display());
        ExitCode::SUCCESS
    } else {
        println!("{} {}", "outside".red().bold(), path.display());
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("script_runner=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Python(args) => run_script(Language::Python, args),
        Commands::Bash(args) => run_script(Language::Bash, args),
        Commands::Check(input) => check(input),
        Commands::CheckPath { path, workspace } => check_path(&path, &workspace),
        Commands::Config => {
            let config = Config::load();
            println!("{}", "Current configuration:".bold());
            println!();
            match config.to_toml() {
                Ok(s) => {
                    println!("{}", s);
                    ExitCode::SUCCESS
                }
                Err(e) => usage_error(&format!("Error serializing config: {}", e)),
            }
        }
    }
}
