//! PinPort Host
//!
//! Shares one local directory tree through the relay.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use host::controller::{HostController, HostEvent};
use host::HostConfig;
use relay_client::SessionStore;

/// PinPort host - share a directory through the relay.
#[derive(Parser, Debug)]
#[command(name = "pinport-host")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to a daily file under the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Share a directory and print the session PIN
    Share {
        /// The directory to share
        root: PathBuf,
    },

    /// Re-share the previously stored root with a fresh PIN
    Resume,

    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = HostConfig::load_or_default(cli.config.as_deref())?;
    config.validate().context("invalid configuration")?;

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    // Keep the appender guard alive for the process lifetime.
    let _log_guard = if cli.log_file {
        let appender =
            tracing_appender::rolling::daily(config.general.data_dir.join("logs"), "host.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    };

    let store = SessionStore::new(config.session_path());
    let controller = HostController::new(config.endpoints(), store);

    match cli.command {
        Commands::Share { root } => run_session(&controller, Some(root)).await,
        Commands::Resume => run_session(&controller, None).await,
        Commands::Logout => {
            SessionStore::new(config.session_path())
                .clear()
                .context("failed to clear stored session")?;
            println!("Stored session cleared.");
            Ok(())
        }
    }
}

/// Runs one sharing session until the channel closes or Ctrl-C.
async fn run_session(controller: &HostController, root: Option<PathBuf>) -> anyhow::Result<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                HostEvent::SessionReady { pin, root } => {
                    println!("Sharing {}", root.display());
                    println!("Session PIN: {pin}");
                }
                HostEvent::Error { message } => eprintln!("Error: {message}"),
                HostEvent::Closed { reason } => println!("Disconnected: {reason}"),
                HostEvent::PhaseChanged(_) => {}
            }
        }
    });

    let shutdown = controller.shutdown_token();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    match root {
        Some(root) => controller.share(&root).await?,
        None => controller.resume().await?,
    }
    Ok(())
}
