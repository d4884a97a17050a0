// crates/users-conformance-cli/src/main.rs
// ============================================================================
// Module: Users Conformance CLI Entry Point
// Description: Command dispatcher for conformance runs and config utilities.
// Purpose: Run the suite against a configured API and map the report to an
//          exit code.
// Dependencies: clap, tokio, tracing-subscriber, users-conformance-core,
//               users-conformance-config
// ============================================================================

//! ## Overview
//! `users-conformance run` loads configuration, authenticates, runs every
//! selected check group, and prints the report on stdout. Logs go to stderr
//! so the report stays machine-readable. The exit code is zero only when no
//! check failed; a rejected admin login aborts the run before any check.
//!
//! Security posture: the admin password and bearer token are never printed.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use users_conformance_config::ConformanceConfig;
use users_conformance_config::config_toml_example;
use users_conformance_core::CheckGroup;
use users_conformance_core::ConformanceSuite;
use users_conformance_core::HttpTransport;
use users_conformance_core::SuiteReport;
use users_conformance_core::SuiteSelection;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "users-conformance", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the conformance suite against the configured API.
    Run(RunCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Config file path (defaults to `users-conformance.toml` when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Check group to skip; repeatable.
    #[arg(long = "skip", value_enum, value_name = "GROUP")]
    skip: Vec<GroupArg>,
    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, value_enum, value_name = "LEVEL", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print a commented example config file.
    Example,
    /// Load and validate configuration, including environment overrides.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `users-conformance.toml` when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Report output formats.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// Canonical JSON (RFC 8785).
    Json,
}

/// Check groups selectable on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
enum GroupArg {
    /// Create, list, read, update, delete scenario.
    Lifecycle,
    /// Missing-field rejection cases.
    Validation,
    /// Requests without a valid credential.
    AuthEnforcement,
    /// Concurrent burst probe.
    RateLimit,
}

impl From<GroupArg> for CheckGroup {
    fn from(value: GroupArg) -> Self {
        match value {
            GroupArg::Lifecycle => Self::Lifecycle,
            GroupArg::Validation => Self::Validation,
            GroupArg::AuthEnforcement => Self::AuthEnforcement,
            GroupArg::RateLimit => Self::RateLimit,
        }
    }
}

/// Log levels accepted by `--log-level`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Scenario progress.
    Info,
    /// Request-level detail.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// Returns the directive label.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("users-conformance {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Run(command) => command_run(command).await,
        Commands::Config {
            command,
        } => command_config(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
async fn command_run(command: RunCommand) -> CliResult<ExitCode> {
    init_logging(command.log_level)?;
    let config = ConformanceConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let options = config
        .suite_options(selection_from(&command.skip), run_suffix()?)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let transport = HttpTransport::new(&config.transport_config())
        .map_err(|err| CliError::new(format!("failed to build http client: {err}")))?;
    info!(base_url = %options.target, "starting conformance run");

    let suite = ConformanceSuite::new(Arc::new(transport), options);
    let report = suite.run().await.map_err(|err| CliError::new(err.to_string()))?;
    write_report(&report, command.format)?;
    Ok(if report.passed() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Builds the group selection from `--skip` flags.
fn selection_from(skip: &[GroupArg]) -> SuiteSelection {
    skip.iter().fold(SuiteSelection::all(), |selection, group| selection.without((*group).into()))
}

/// Returns the millisecond timestamp used to make created users unique.
fn run_suffix() -> CliResult<u128> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .map_err(|err| CliError::new(format!("system clock is before the unix epoch: {err}")))
}

/// Writes the report to stdout in the requested format.
fn write_report(report: &SuiteReport, format: OutputFormat) -> CliResult<()> {
    let mut bytes = match format {
        OutputFormat::Text => report.render_text().into_bytes(),
        OutputFormat::Json => report
            .to_canonical_json()
            .map_err(|err| CliError::new(format!("failed to serialize report: {err}")))?,
    };
    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Example => command_config_example(),
        ConfigCommand::Validate(command) => command_config_validate(&command),
    }
}

/// Prints the example configuration.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_bytes(config_toml_example().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let config = ConformanceConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line(&format!("config ok: target {}", config.api.base_url.trim()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Returns the filter directive used when `RUST_LOG` is unset.
fn default_directive(level: LogLevel) -> String {
    let level = level.as_str();
    format!("warn,users_conformance_core={level},users_conformance={level}")
}

/// Installs the stderr `fmt` subscriber; `RUST_LOG` overrides `level`.
fn init_logging(level: LogLevel) -> CliResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive(level))
            .map_err(|err| CliError::new(format!("invalid log filter: {err}")))?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to initialize logging: {err}")))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
