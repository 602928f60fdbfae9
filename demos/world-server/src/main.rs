//! A runnable Realmforge world server.
//!
//! Reads its settings from a TOML file and `REALMFORGE_*` environment
//! variables (nested keys use `__`, e.g. `REALMFORGE_SESSION__IDLE_TIMEOUT_SECS`),
//! loads game data and characters from JSON and keeps characters in memory.
//!
//! ```text
//! cargo run -p world-server -- --config demos/world-server/config.toml
//! ```
//!
//! Any numeric token authenticates as the account with that id, so
//! `auth 1 1` followed by `select 1` enters the world as character 1.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use realmforge::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "world-server", version, about = "Runs a Realmforge world server")]
struct Cli {
    /// Server settings. A missing file means defaults.
    #[arg(short, long, env = "REALMFORGE_CONFIG_FILE", default_value = "demos/world-server/config.toml")]
    config: PathBuf,

    /// Maps, spawns, portals and class tables.
    #[arg(long, default_value = "demos/world-server/data/game_data.json")]
    game_data: PathBuf,

    /// Characters to seed the in-memory store with.
    #[arg(long, default_value = "demos/world-server/data/characters.json")]
    characters: PathBuf,

    /// Overrides the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Serve WebSocket instead of raw TCP lines.
    #[arg(long)]
    websocket: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Development authenticator: the token is the account id.
struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Account, SessionError> {
        let id: i64 = token
            .parse()
            .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
        Ok(Account {
            id: AccountId(id),
            name: format!("account{id}"),
            region: RegionType::En,
        })
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config: ServerConfig = config::Config::builder()
        .add_source(config::File::from(cli.config.as_path()).required(false))
        .add_source(
            config::Environment::with_prefix("REALMFORGE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("reading configuration")?
        .try_deserialize()
        .context("invalid configuration")?;
    if let Some(bind) = &cli.bind {
        config.bind = bind.clone();
    }
    if cli.websocket {
        config.transport = TransportKind::WebSocket;
    }
    Ok(config)
}

fn load_characters(path: &Path) -> anyhow::Result<Vec<CharacterRecord>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    let data = GameData::load(&cli.game_data)
        .with_context(|| format!("loading {}", cli.game_data.display()))?;
    let characters = load_characters(&cli.characters)?;
    tracing::info!(
        maps = data.maps.len(),
        characters = characters.len(),
        transport = ?config.transport,
        "starting world server"
    );

    let transport = config.transport;
    let builder = RealmServerBuilder::new(data)
        .config(config)
        .store(Arc::new(InMemoryCharacterStore::with_records(characters)));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("ctrl-c received");
    };

    match transport {
        TransportKind::Line => {
            let server = builder.build_line(DevAuthenticator).await?;
            tracing::info!(addr = %server.local_addr()?, "listening for line clients");
            server.run_until(shutdown).await?;
        }
        TransportKind::WebSocket => {
            let server = builder.build_websocket(DevAuthenticator).await?;
            tracing::info!(addr = %server.local_addr()?, "listening for WebSocket clients");
            server.run_until(shutdown).await?;
        }
    }
    Ok(())
}
