//! PinPort Viewer
//!
//! Browses a host's shared directory through the relay.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use protocol::Pin;
use relay_client::SessionStore;
use viewer::controller::{ViewerController, ViewerEvent};
use viewer::state::ViewerPhase;
use viewer::ViewerConfig;

/// PinPort viewer - browse a shared directory through the relay.
#[derive(Parser, Debug)]
#[command(name = "pinport-viewer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// With no subcommand, a stored non-expired session is resumed.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect with a 6-digit PIN and browse interactively
    Connect {
        /// The session PIN shown by the host
        pin: String,
    },

    /// Reconnect with the previously stored PIN
    Resume,

    /// Forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ViewerConfig::load_or_default(cli.config.as_deref())?;
    config.validate().context("invalid configuration")?;

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = SessionStore::new(config.session_path());
    let controller = ViewerController::new(
        config.endpoints(),
        store,
        config.general.download_dir.clone(),
    );

    match cli.command {
        Some(Commands::Connect { pin }) => {
            let pin = Pin::parse(&pin).context("PIN must be six digits")?;
            controller.connect(pin).await?;
            browse(&controller).await
        }
        Some(Commands::Resume) | None => {
            match controller.auto_resume().await {
                Ok(()) => browse(&controller).await,
                Err(viewer::ViewerError::NothingToResume) => {
                    println!("No stored session. Use `pinport-viewer connect <PIN>`.");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Some(Commands::Logout) => {
            controller.logout().await?;
            println!("Stored session cleared.");
            Ok(())
        }
    }
}

/// Line-oriented browse loop: ls, cd, get, put, rm, quit.
async fn browse(controller: &ViewerController) -> anyhow::Result<()> {
    let mut events = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Connected. Commands: ls, cd <dir>, get <path>, put <local>, rm <path>, quit");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(ViewerEvent::ListingUpdated { path }) => {
                        let state = controller.state();
                        let shown = if path.is_empty() { "/" } else { path.as_str() };
                        println!("{shown}:");
                        let mut entries = state.entries;
                        entries.sort_by(|a, b| {
                            b.is_directory
                                .cmp(&a.is_directory)
                                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                        });
                        for entry in entries {
                            let marker = if entry.is_directory { "/" } else { "" };
                            match entry.size {
                                Some(size) => println!("  {}{marker}  {size} B", entry.name),
                                None => println!("  {}{marker}", entry.name),
                            }
                        }
                    }
                    Ok(ViewerEvent::DownloadSaved { path, saved_to }) => {
                        println!("Downloaded {path} -> {}", saved_to.display());
                    }
                    Ok(ViewerEvent::UploadFinished { path }) => {
                        println!("Uploaded {path}");
                    }
                    Ok(ViewerEvent::OperationFailed { message }) => {
                        eprintln!("Error: {message}");
                    }
                    Ok(ViewerEvent::Closed { reason }) => {
                        println!("Disconnected: {reason}");
                        return Ok(());
                    }
                    Ok(ViewerEvent::PhaseChanged(_)) => {}
                    Err(_) => return Ok(()),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Err(e) = run_command(controller, line.trim()).await {
                    eprintln!("Error: {e}");
                }
                if controller.state().phase != ViewerPhase::Active {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn run_command(controller: &ViewerController, line: &str) -> anyhow::Result<()> {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "ls" => controller.list(&controller.state().current_path).await?,
        "cd" => {
            let target = resolve_cd(&controller.state().current_path, argument);
            controller.list(&target).await?;
        }
        "get" => controller.download(argument).await?,
        "put" => controller.upload(PathBuf::from(argument).as_path()).await?,
        "rm" => controller.delete(argument).await?,
        "quit" | "exit" => controller.disconnect().await,
        other => eprintln!("Unknown command: {other}"),
    }
    Ok(())
}

/// Applies a `cd` argument to the current remote directory.
fn resolve_cd(current: &str, argument: &str) -> String {
    match argument {
        "" | "/" => String::new(),
        ".." => match current.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        },
        path if current.is_empty() => path.to_string(),
        path => format!("{current}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_cd() {
        assert_eq!(resolve_cd("", "docs"), "docs");
        assert_eq!(resolve_cd("docs", "reports"), "docs/reports");
        assert_eq!(resolve_cd("docs/reports", ".."), "docs");
        assert_eq!(resolve_cd("docs", ".."), "");
        assert_eq!(resolve_cd("docs", "/"), "");
        assert_eq!(resolve_cd("anything", ""), "");
    }
}
