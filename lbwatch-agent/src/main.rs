//! lbwatch - watch load-balancer pools from the terminal
//!
//! Subcommands:
//! - `watch` (default): live pool table with audio alerts on origin transitions
//! - `once`: fetch and print the pool table a single time
//! - `login` / `logout`: manage the stored API credentials
//! - `test-sound`: play a cue to check the audio setup

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lbwatch_agent::api::{PoolFetcher, PoolSource};
use lbwatch_agent::cancel::CancelSource;
use lbwatch_agent::config::AppConfig;
use lbwatch_agent::credentials::{store_from_config, CredentialStore};
use lbwatch_agent::notifier::{player_from_config, Cue};
use lbwatch_agent::poller::PollLoop;
use lbwatch_agent::render::{render_error_panel, render_pools_table, spawn_terminal_view};
use lbwatch_agent::supervisor::Supervisor;
use lbwatch_agent::wizard::CredentialForm;

#[derive(Debug, Parser)]
#[command(name = "lbwatch", version, about = "Watch load-balancer pool health")]
struct Cli {
    /// Config file (defaults to the OS config directory, or $LBWATCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll continuously and alert on origin transitions
    Watch {
        /// Start with alert sounds disabled
        #[arg(long)]
        mute: bool,
    },
    /// Fetch and print the pool table once
    Once,
    /// Enter and store API credentials
    Login,
    /// Remove stored API credentials
    Logout,
    /// Play an alert cue
    TestSound {
        #[arg(value_enum, default_value_t = SoundArg::Offline)]
        cue: SoundArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SoundArg {
    Online,
    Offline,
}

impl From<SoundArg> for Cue {
    fn from(arg: SoundArg) -> Self {
        match arg {
            SoundArg::Online => Cue::Online,
            SoundArg::Offline => Cue::Offline,
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lbwatch=info,lbwatch_agent=info"));

    // stdout belongs to the table view
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    let store = store_from_config(&config.storage).context("Failed to open credential store")?;

    match cli.command.unwrap_or(Command::Watch { mute: false }) {
        Command::Watch { mute } => watch(&config, store.as_ref(), mute || config.alerts.muted).await,
        Command::Once => once(&config, store.as_ref()).await,
        Command::Login => login(&config, cli.config, store.as_ref()).await,
        Command::Logout => {
            store.clear().context("Failed to clear credentials")?;
            println!("👋 Logged out.");
            Ok(())
        }
        Command::TestSound { cue } => test_sound(&config, cue.into()).await,
    }
}

async fn watch(config: &AppConfig, store: &dyn CredentialStore, muted: bool) -> Result<()> {
    let credentials = match store.get().context("Failed to read credentials")? {
        Some(credentials) => credentials,
        None => match CredentialForm::stdio().run(store)? {
            Some(credentials) => credentials,
            None => return Ok(()),
        },
    };

    let fetcher = PoolFetcher::new(&config.api).context("Failed to build HTTP client")?;
    let player = player_from_config(&config.alerts);
    let poller = PollLoop::new(Arc::new(fetcher), player, config.poll.interval());
    let view = spawn_terminal_view(poller.subscribe());

    let mut supervisor = Supervisor::new(poller, muted);
    supervisor.set_credentials(Some(credentials)).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "m" => {
                        supervisor.toggle_mute().await;
                    }
                    "l" => {
                        store.clear().context("Failed to clear credentials")?;
                        supervisor.set_credentials(None).await;
                        println!("👋 Logged out.");
                        break;
                    }
                    "q" => break,
                    "" => {}
                    other => debug!("Unknown command: {}", other),
                },
                Ok(None) => {
                    debug!("stdin closed, Ctrl-C to stop");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    supervisor.shutdown().await;
    view.abort();
    Ok(())
}

async fn once(config: &AppConfig, store: &dyn CredentialStore) -> Result<()> {
    let credentials = store
        .get()
        .context("Failed to read credentials")?
        .ok_or_else(|| anyhow!("Not logged in. Run `lbwatch login` first."))?;

    let fetcher = PoolFetcher::new(&config.api).context("Failed to build HTTP client")?;
    let cancel = CancelSource::new();

    match fetcher.fetch_all_pools(&credentials, &cancel.signal()).await {
        Ok(pools) => {
            println!("{}", render_pools_table(&pools));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", render_error_panel(&e.to_string()));
            Err(anyhow::Error::new(e).context("Failed to load pools"))
        }
    }
}

async fn login(config: &AppConfig, config_path: Option<PathBuf>, store: &dyn CredentialStore) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => AppConfig::config_file_path()?,
    };
    if !path.exists() {
        config
            .save(Some(&path))
            .await
            .context("Failed to save configuration")?;
        info!("Default configuration written to {}", path.display());
    }

    CredentialForm::stdio().run(store)?;
    Ok(())
}

async fn test_sound(config: &AppConfig, cue: Cue) -> Result<()> {
    let player = player_from_config(&config.alerts);
    if let Err(e) = player.resume().await {
        warn!("Audio output could not be resumed: {:#}", e);
    }
    player.play(cue).await.context("Failed to play cue")?;
    Ok(())
}
