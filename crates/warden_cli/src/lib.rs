mod cmd;
mod ctx;
mod error;

use std::{
    fmt,
    io::{IsTerminal as _, Write as _, stderr, stdout},
    process::ExitCode,
};

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use cmd::{Commands, Success};
use ctx::Ctx;
use error::{Error, Result};
use serde_json::{Map, Value, json};
use tracing::trace;
use warden_config::Config;
use warden_conversation::ThreadId;

/// A conversational agent that asks before it changes anything.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten, next_help_heading = "Global Options")]
    globals: Globals,

    #[command(subcommand, next_help_heading = "Options")]
    command: Commands,
}

#[derive(Debug, clap::Args)]
pub struct Globals {
    /// The conversation thread to use.
    #[arg(short, long, global = true, default_value = "default")]
    thread: ThreadId,

    /// Read the configuration from this file, instead of searching the
    /// working directory for `warden.toml` or `warden.json`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Override a configuration value for the duration of the command.
    #[arg(long, value_name = "KEY=VALUE", global = true, action = ArgAction::Append)]
    cfg: Vec<String>,

    /// Increase verbosity of logging.
    ///
    /// Can be specified multiple times to increase verbosity.
    ///
    /// Defaults to printing "error" messages. For each increase in verbosity,
    /// the log level is set to "warn", "info", "debug", and "trace"
    /// respectively.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress all output, including errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

impl fmt::Display for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entry(&"thread", &self.globals.thread)
            .entry(&"config", &self.globals.config)
            .entry(&"cfg", &self.globals.cfg)
            .entry(&"verbose", &self.globals.verbose)
            .entry(&"quiet", &self.globals.quiet)
            .finish()
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let is_tty = stdout().is_terminal();
    let quiet = cli.globals.quiet;

    configure_logging(cli.globals.verbose, quiet);
    trace!(command = cli.command.name(), arguments = %cli, "Starting CLI run.");

    let (code, output) = match run_inner(cli).await {
        Ok(output) if is_tty => (0, output_to_string(output)),
        Ok(output) => (0, parse_json_output(output)),
        Err(error) => parse_error(error, is_tty),
    };

    if !quiet && !output.is_empty() {
        // Nowhere left to report a failed write to.
        let _result = if code == 0 {
            writeln!(stdout().lock(), "{output}")
        } else {
            writeln!(stderr().lock(), "{output}")
        };
    }

    ExitCode::from(code)
}

async fn run_inner(cli: Cli) -> Result<Success> {
    let Cli { globals, command } = cli;

    let config = load_config(&globals)?;
    let ctx = Ctx::new(globals, config)?;

    command.run(&ctx).await.map_err(Into::into)
}

fn output_to_string(output: Success) -> String {
    match output {
        Success::Ok => String::new(),
        Success::Message(msg) => msg,
        Success::Json(value) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
    }
}

fn parse_json_output(output: Success) -> String {
    let value = match output {
        Success::Ok => json!({}),
        Success::Message(msg) => json!({ "message": msg }),
        Success::Json(value) => value,
    };

    serde_json::to_string(&value).unwrap_or_else(|_| value.to_string())
}

fn parse_error(error: Error, is_tty: bool) -> (u8, String) {
    let error = cmd::Error::from(error);
    let code = u8::try_from(error.code.get()).unwrap_or(1);
    let message = error
        .message
        .unwrap_or_else(|| "Application error".to_owned());

    if is_tty {
        let mut lines = vec![message];
        for (key, value) in error.metadata {
            match value {
                Value::String(value) => lines.push(format!("  {key}: {value}")),
                Value::Array(causes) => lines.extend(
                    causes
                        .iter()
                        .map(|cause| format!("  caused by: {}", cause.as_str().unwrap_or_default())),
                ),
                value => lines.push(format!("  {key}: {value}")),
            }
        }

        return (code, lines.join("\n"));
    }

    let error = json!({
        "message": message,
        "metadata": error.metadata.into_iter().collect::<Map<_, _>>(),
        "code": code,
    });

    (code, error.to_string())
}

/// Resolve the configuration: file, then environment, then `--cfg`.
fn load_config(globals: &Globals) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|error| Error::NonUtf8Path(error.into_path_buf()))?;
    trace!(%cwd, config = ?globals.config, "Loading configuration.");

    let mut config = Config::load(globals.config.as_deref(), &cwd)?;
    config.apply_env(|name| std::env::var(name).ok())?;

    trace!(overrides = ?globals.cfg, "Applying CLI config overrides.");
    config.apply_assignments(globals.cfg.iter().map(String::as_str))?;

    Ok(config)
}

fn configure_logging(verbose: u8, quiet: bool) {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::fmt;

    let mut level = match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    if quiet {
        level = LevelFilter::OFF;
    }

    let mut filter = vec!["off".to_owned()];
    for krate in [
        "agent",
        "cli",
        "config",
        "conversation",
        "llm",
        "sql",
        "storage",
        "tool",
    ] {
        filter.push(format!("warden_{krate}={level}"));
    }

    let format = fmt::format().with_target(false).compact();

    if level < LevelFilter::DEBUG {
        tracing_subscriber::fmt()
            .event_format(format)
            .without_time()
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_env_filter(filter.join(","))
            .init();
    } else {
        tracing_subscriber::fmt()
            .event_format(format)
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_env_filter(filter.join(","))
            .init();
    }
}
