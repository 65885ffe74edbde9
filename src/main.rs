//! childsieve - supervise child processes that speak line-delimited JSON.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use childsieve::adapter;
use childsieve::child::{ChildEvent, ExitGuard, SendError, SpawnError, SupervisedChild};
use childsieve::config::{ConfigError, ConfigLoader, GracefulSignal, SupervisorConfig};
use childsieve::display;
use childsieve::sieve::{Encoding, FrameError, SieveEvent};

#[derive(Parser)]
#[command(
    name = "childsieve",
    about = "Supervise child processes that speak line-delimited JSON",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command, relaying JSON from stdin and printing its events.
    Run {
        /// Command line to run.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
        /// Relay output unchanged instead of tagging each event.
        #[arg(long)]
        raw: bool,
        /// Milliseconds to wait before killing the process group on close.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Split the command on whitespace instead of running it via /bin/sh.
        #[arg(long)]
        no_shell: bool,
        /// Working directory for the child.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Graceful signal sent on close (SIGTERM, SIGINT, SIGHUP).
        #[arg(long)]
        signal: Option<GracefulSignal>,
        /// Encoding of the child's output (utf-8, latin1).
        #[arg(long)]
        encoding: Option<Encoding>,
        /// Close the child once stdin reaches end of file.
        #[arg(long)]
        close_on_eof: bool,
    },
    /// Echo JSON objects and arrays read from stdin back to stdout.
    Echo,
}

/// Options for the `run` subcommand.
struct RunOptions {
    command: Vec<String>,
    raw: bool,
    close_on_eof: bool,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<SupervisorConfig, ConfigError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load()
}

async fn run_child(options: RunOptions, config: SupervisorConfig) -> Result<i32, CliError> {
    let command_line = options.command.join(" ");
    tracing::info!(
        command = %command_line,
        shell = config.shell,
        timeout_ms = config.cleanup_timeout_ms,
        "Starting child"
    );

    let mut child = SupervisedChild::spawn(&command_line, config)?;
    let Some(mut events) = child.take_events() else {
        return Ok(1);
    };
    let mut input = adapter::from_stdin(adapter::DEFAULT_CHANNEL_BUFFER);
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ChildEvent::Exit(info)) => {
                    display::print_event(&ChildEvent::Exit(info), options.raw);
                    return Ok(info.exit_code());
                }
                Some(event) => display::print_event(&event, options.raw),
                None => break,
            },
            line = input.recv(), if input_open => match line {
                Some(SieveEvent::RawLine(line)) => {
                    tracing::debug!(line = %line, "Ignoring non-JSON input line");
                }
                Some(event) => {
                    if let Some(value) = event.into_value() {
                        match child.send(&value).await {
                            Ok(()) => {}
                            Err(SendError::NotRunning { pid }) => {
                                tracing::debug!(pid, "Child not running, dropping input");
                            }
                            Err(e) => tracing::warn!(error = %e, "Failed to send input to child"),
                        }
                    }
                }
                None => {
                    input_open = false;
                    if options.close_on_eof {
                        tracing::debug!(pid = child.pid(), "Input ended, closing child");
                        child.close_with(|info| tracing::debug!(?info, "Child closed"));
                    }
                }
            },
        }
    }

    Ok(child.exit_info().map_or(1, |info| info.exit_code()))
}

async fn echo() -> Result<i32, CliError> {
    let mut input = adapter::from_stdin(adapter::DEFAULT_CHANNEL_BUFFER);
    while let Some(event) = input.recv().await {
        match event {
            SieveEvent::RawLine(line) => eprintln!("{line}"),
            SieveEvent::JsonObject(map) => adapter::send_stdout(&map).await?,
            SieveEvent::JsonArray(items) => adapter::send_stdout(&items).await?,
        }
    }
    Ok(0)
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Commands::Run {
            command,
            raw,
            timeout_ms,
            no_shell,
            cwd,
            signal,
            encoding,
            close_on_eof,
        } => {
            let mut config = load_config(cli.config)?;
            if let Some(ms) = timeout_ms {
                config = config.with_cleanup_timeout(Duration::from_millis(ms));
            }
            if no_shell {
                config = config.with_shell(false);
            }
            if let Some(dir) = cwd {
                config = config.with_cwd(dir);
            }
            if let Some(signal) = signal {
                config = config.with_graceful_signal(signal);
            }
            if let Some(encoding) = encoding {
                config = config.with_encoding(encoding);
            }
            let options = RunOptions {
                command,
                raw,
                close_on_eof,
            };
            run_child(options, config).await
        }
        Commands::Echo => echo().await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let guard = ExitGuard::new();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            display::print_error(&e.to_string());
            1
        }
    };
    // process::exit skips destructors.
    drop(guard);
    std::process::exit(code);
}
