//! organics - operator console for connected TikTok accounts.
//!
//! Provides commands for:
//! - Signing in and out of the organics backend
//! - Listing and deleting connected TikTok accounts
//! - Watching the account list as it changes
//! - Printing the TikTok authorization link for connecting a new account

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use organics_core::{Config, SyncError};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod output;

use commands::{
    accounts::{ConnectUrlCommand, DeleteCommand},
    auth::LoginCommand,
    watch::WatchCommand,
    Context,
};
use output::{get_formatter, OutputFormatter};

/// Log file name in the data directory
const LOG_FILE: &str = "organics.log";

#[derive(Debug, Parser)]
#[command(name = "organics", version, about = "Manage TikTok accounts connected to organics")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to stderr instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,

    /// Backend base URL (overrides config and ORGANICS_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in to the organics backend
    Login(LoginCommand),
    /// Sign out and forget the stored credential
    Logout,
    /// Show whether a session is active
    Status,
    /// List connected TikTok accounts
    Accounts,
    /// Delete a connected TikTok account
    Delete(DeleteCommand),
    /// Keep the account list on screen, refreshing in the background
    Watch(WatchCommand),
    /// Print the TikTok authorization link for connecting an account
    ConnectUrl(ConnectUrlCommand),
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file in the data directory so they do not interleave with
/// command output. The returned guard flushes the file writer on drop.
fn init_tracing(verbose: u8, to_stderr: bool) -> Option<WorkerGuard> {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_dir = if to_stderr { None } else { Config::data_dir().ok() };
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr).with_target(false))
                .with(filter)
                .init();
            None
        }
    }
}

async fn run(cli: Cli, fmt: &dyn OutputFormatter) -> Result<()> {
    let mut ctx = Context::load(cli.api_url.as_deref())?;

    match cli.command {
        Commands::Login(cmd) => cmd.execute(&mut ctx, fmt).await,
        Commands::Logout => commands::auth::logout(&ctx, fmt),
        Commands::Status => commands::auth::status(&ctx, fmt),
        Commands::Accounts => commands::accounts::list(&ctx, fmt).await,
        Commands::Delete(cmd) => cmd.execute(&ctx, fmt).await,
        Commands::Watch(cmd) => cmd.execute(&mut ctx, fmt).await,
        Commands::ConnectUrl(cmd) => cmd.execute(&ctx, fmt),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing(cli.verbose, cli.log_stderr);
    info!(command = ?cli.command, "organics starting");

    let fmt = get_formatter(cli.json);
    if let Err(e) = run(cli, &*fmt).await {
        fmt.error(&format!("{:#}", e));
        let session_ended = e.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<SyncError>(),
                Some(SyncError::AuthRejected)
            )
        });
        if session_ended {
            fmt.info("Run `organics login` to sign in again.");
        }
        // exit() skips destructors; flush the log file first
        drop(log_guard);
        std::process::exit(1);
    }
}
