//! `Taskdeck`: task list shell over an in-process store.
//!
//! Reads one command per line from stdin and prints the result. Logs go to
//! a file so they never mix with the shell output. Configuration via CLI
//! flags, environment variables, or config file
//! (`~/.config/taskdeck/config.toml`).
//!
//! ```bash
//! cargo run --bin taskdeck
//!
//! # Restore a session and simulate a slow store
//! cargo run --bin taskdeck -- --user u-alice --email alice@example.com --latency-ms 200
//! ```

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use taskdeck::app::{App, parse_command};
use taskdeck::auth::LocalAuth;
use taskdeck::config::{CliArgs, ClientConfig};
use taskdeck::remote::memory::InMemoryRemote;
use taskdeck::session::Session;
use taskdeck::tasks::ErrorCallback;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("taskdeck starting");
    let result = run_shell(config).await;
    tracing::info!("taskdeck exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, which carries the shell).
/// Defaults to `$TMPDIR/taskdeck.log`. Returns a guard that must be held
/// until the program exits to flush buffered log output.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskdeck.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Runs the command loop until `quit` or end of input.
async fn run_shell(config: ClientConfig) -> io::Result<()> {
    let remote = InMemoryRemote::default()
        .with_latency(config.latency)
        .with_subscription_buffer(config.subscription_buffer);
    let on_error: ErrorCallback = Arc::new(|err| eprintln!("sync error: {err}"));
    let session = Session::new(Arc::new(remote)).with_error_callback(on_error);
    let mut app = App::new(session, LocalAuth::new(), config);

    print_lines(&app.start().await)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !app.should_quit {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Ok(Some(command)) => print_lines(&app.execute(command).await)?,
            Ok(None) => {}
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}

fn prompt() -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "> ")?;
    stdout.flush()
}

fn print_lines(lines: &[String]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}
