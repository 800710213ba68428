use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrobble_relay_core::{AppConfig, TransportState};
use scrobble_relay_engine::{Engine, PollerConfig};
use scrobble_relay_lastfm::{HttpScrobbleClient, ScrobbleService};
use scrobble_relay_players::build_players;
use scrobble_relay_store::{create_pool, run_migrations, SqliteTrackStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod sink;
use sink::BroadcastSink;

#[derive(Parser, Debug)]
#[command(
    name = "scrobble-relay",
    about = "Local players -> play statistics -> scrobble service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run,
    Doctor,
    Status,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run);
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cmd {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Doctor => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            doctor(&cfg).await
        }
        Commands::Status => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            status(&cfg).await
        }
        Commands::Run => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            run(cfg).await
        }
    }
}

async fn run(cfg: AppConfig) -> Result<()> {
    let db_path = database_path(&cfg);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    let pool = create_pool(&db_path)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    run_migrations(&pool).await.context("failed to run migrations")?;
    let store = Arc::new(SqliteTrackStore::new(pool));

    let scrobbler = Arc::new(HttpScrobbleClient::new(
        cfg.scrobbler.endpoint.clone(),
        cfg.scrobbler.api_key.clone(),
        cfg.scrobbler.session_key.clone(),
    )?);

    let players = build_players(&cfg.players);
    if players.is_empty() {
        warn!("no configured players are available on this platform; nothing to poll");
    }

    let sink = Arc::new(BroadcastSink::new(64));
    let engine = Engine::new(
        PollerConfig::from_intervals(&cfg.intervals),
        players,
        store,
        scrobbler,
        sink,
    );

    info!(db = %db_path.display(), "scrobble-relay started");
    let handle = engine.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("received ctrl-c; shutting down");
    handle.shutdown();
    handle.wait().await;

    Ok(())
}

async fn doctor(cfg: &AppConfig) -> Result<()> {
    println!("== scrobble-relay doctor ==");

    let db_path = database_path(cfg);
    match create_pool(&db_path).await {
        Ok(pool) => match run_migrations(&pool).await {
            Ok(()) => println!("database {}: ok", db_path.display()),
            Err(err) => println!("database {}: migration failed: {err}", db_path.display()),
        },
        Err(err) => println!("database {}: {err}", db_path.display()),
    }

    let scrobbler = HttpScrobbleClient::new(
        cfg.scrobbler.endpoint.clone(),
        cfg.scrobbler.api_key.clone(),
        cfg.scrobbler.session_key.clone(),
    )?;
    match scrobbler.query_favorite("Pink Floyd", "Time").await {
        Ok(_) => println!("scrobble service {}: reachable", cfg.scrobbler.endpoint),
        Err(err) => println!("scrobble service {}: {err}", cfg.scrobbler.endpoint),
    }

    let players = build_players(&cfg.players);
    if players.is_empty() {
        println!("players: none available on this platform");
    }
    for player in &players {
        println!("{}: running={}", player.source(), player.is_running().await);
    }

    #[cfg(target_os = "macos")]
    {
        println!(
            "macOS automation: verify System Settings > Privacy & Security > Automation allows your terminal to control Music"
        );
    }

    Ok(())
}

async fn status(cfg: &AppConfig) -> Result<()> {
    let players = build_players(&cfg.players);
    if players.is_empty() {
        println!("no configured players are available on this platform");
    }

    for player in players {
        let source = player.source();
        if !player.is_running().await {
            println!("{source}: not running");
            continue;
        }
        match player.transport_state().await {
            Ok(TransportState::Playing) => match player.now_playing().await {
                Ok(Some(sample)) => println!(
                    "{source}: playing {} - {} ({:.0}/{}s)",
                    sample.artist, sample.title, sample.position_seconds, sample.duration_seconds
                ),
                Ok(None) => println!("{source}: playing (no track details)"),
                Err(err) => println!("{source}: {err}"),
            },
            Ok(state) => println!("{source}: {state:?}"),
            Err(err) => println!("{source}: {err}"),
        }
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("scrobble-relay").join("config.toml")
}

fn database_path(cfg: &AppConfig) -> PathBuf {
    if let Some(path) = &cfg.database.path {
        return path.clone();
    }
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("scrobble-relay").join("relay.db")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("SCROBBLE_RELAY_ENDPOINT") {
        if !v.trim().is_empty() {
            cfg.scrobbler.endpoint = v;
        }
    }
    if let Ok(v) = std::env::var("SCROBBLE_RELAY_API_KEY") {
        if !v.trim().is_empty() {
            cfg.scrobbler.api_key = v;
        }
    }
    if let Ok(v) = std::env::var("SCROBBLE_RELAY_SESSION_KEY") {
        if !v.trim().is_empty() {
            cfg.scrobbler.session_key = v;
        }
    }
    if let Ok(v) = std::env::var("SCROBBLE_RELAY_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
