use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use squad_stats::api::state::AppState;
use squad_stats::api::{build_router, cors_layer};
use squad_stats::config::AppConfig;
use squad_stats::dispatch::{Dispatcher, StatsCard};
use squad_stats::links::{IdentityLinkStore, LinkError};
use squad_stats::models::{ExternalId, SteamId};
use squad_stats::stats::StatsAggregator;
use squad_stats::storage::{EventLog, JsonlEventLog, StorageConfig};

#[derive(Parser)]
#[command(name = "squad-stats")]
#[command(about = "Player statistics and account linking for game-server combat logs")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,
    },

    /// Link a chat account to a Steam account
    Link {
        external_id: String,
        steam_id: String,
    },

    /// Remove a chat account's link
    Unlink { external_id: String },

    /// Show the Steam account linked to a chat account
    Resolve { external_id: String },

    /// Print a player's statistics
    Stats {
        steam_id: String,

        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },
}

struct Services {
    links: Arc<IdentityLinkStore>,
    stats: Arc<StatsAggregator>,
}

fn open_services(config: &AppConfig) -> Result<Services> {
    let storage = StorageConfig::new(config.data_dir.clone());
    let event_log: Arc<dyn EventLog> = Arc::new(JsonlEventLog::new(storage.event_log_dir()));

    let links = IdentityLinkStore::open(storage.links_path(), event_log.clone())
        .with_context(|| format!("loading links from {:?}", storage.links_path()))?;
    let stats = StatsAggregator::new(event_log).with_timeout(config.stats.query_timeout());

    Ok(Services {
        links: Arc::new(links),
        stats: Arc::new(stats),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading config {:?}", cli.config))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting squad-stats v{}", env!("CARGO_PKG_VERSION"));

    let services = open_services(&config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let dispatcher = Dispatcher::new(
                config.chat.clone(),
                services.links.clone(),
                services.stats.clone(),
            );
            let state = AppState {
                links: services.links,
                stats: services.stats,
                dispatcher: Arc::new(dispatcher),
            };
            let app = build_router(state).layer(cors_layer(&config.server.cors_origin));

            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Link {
            external_id,
            steam_id,
        } => {
            let result = services
                .links
                .link(ExternalId::from(external_id), SteamId::from(steam_id))
                .await;
            match result {
                Ok(link) => println!("Linked {} -> {}", link.external_id, link.steam_id),
                Err(e @ LinkError::StoreUnavailable(_)) => return Err(e.into()),
                Err(e) => eprintln!("{}", e),
            }
        }
        Commands::Unlink { external_id } => {
            match services.links.unlink(&ExternalId::from(external_id)) {
                Ok(link) => println!("Unlinked {} from {}", link.external_id, link.steam_id),
                Err(e @ LinkError::StoreUnavailable(_)) => return Err(e.into()),
                Err(e) => eprintln!("{}", e),
            }
        }
        Commands::Resolve { external_id } => {
            let external_id = ExternalId::from(external_id);
            match services.links.resolve(&external_id) {
                Some(steam_id) => {
                    let name = services
                        .links
                        .resolve_account(&steam_id)
                        .await?
                        .map(|a| a.last_name)
                        .unwrap_or_else(|| "<unknown account>".to_string());
                    println!("{} -> {} ({})", external_id, steam_id, name);
                }
                None => println!("{} is not linked", external_id),
            }
        }
        Commands::Stats { steam_id, json } => {
            let report = services
                .stats
                .compute_stats(&SteamId::from(steam_id))
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let card = StatsCard::from_report(&report);
                println!("\n=== {} ===", card.title);
                println!("{}", card.url);
                for field in &card.fields {
                    println!("{:<14}{}", format!("{}:", field.name), field.value);
                }
            }
        }
    }

    Ok(())
}
