use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use playlist_watch::catalog::YouTubeCatalog;
use playlist_watch::config::Config;
use playlist_watch::engine::{Engine, PassOutcome};
use playlist_watch::notify::Badge;
use playlist_watch::rpc::{self, Service};
use playlist_watch::scheduler;
use playlist_watch::storage::{LocalStorage, MemoryStorage, SubscriptionStore};

const USAGE: &str = "\
Usage: playlist-watch <command> [--config <path>]

Commands:
  serve [--ephemeral]  poll on a timer and answer JSON-lines requests on stdin
  check                run one update pass and print the result
  example-config       print a default config.toml";

struct Args {
    command: String,
    config_path: Option<PathBuf>,
    ephemeral: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut command = None;
    let mut config_path = None;
    let mut ephemeral = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--ephemeral" => ephemeral = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if command.is_none() && !other.starts_with('-') => {
                command = Some(other.to_string());
            }
            other => bail!("unexpected argument: {}\n\n{}", other, USAGE),
        }
    }

    Ok(Args {
        command: command.with_context(|| USAGE.to_string())?,
        config_path,
        ephemeral,
    })
}

/// Logs go to stderr; stdout is the response channel.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("playlist_watch={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<Config> {
    match &args.config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn build_engine(config: &Config, ephemeral: bool, badge: &Badge) -> Result<Engine> {
    let store: Arc<dyn SubscriptionStore> = if ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        let path = config.db_path()?;
        Arc::new(LocalStorage::open(&path)?)
    };
    tracing::info!("Using {} storage", store.backend_name());

    let catalog = YouTubeCatalog::new(&config.api.base_url, &config.api.api_key)
        .context("Failed to build HTTP client")?;

    Ok(Engine::new(store, Arc::new(catalog), Arc::new(badge.clone())))
}

async fn serve(config: Config, ephemeral: bool) -> Result<()> {
    let badge = Badge::new();
    let engine = Arc::new(build_engine(&config, ephemeral, &badge)?);

    if let Err(e) = engine.restore_badge().await {
        tracing::warn!("Could not restore badge: {:#}", e);
    }

    let schedule = tokio::spawn(scheduler::run(engine.clone(), config.poll.clone()));

    let service = Service::new(engine, badge);
    let result = rpc::serve(&service, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;

    tracing::info!("Input closed, shutting down");
    schedule.abort();
    result
}

async fn check(config: Config) -> Result<()> {
    let badge = Badge::new();
    let engine = build_engine(&config, false, &badge)?;

    match engine.reconcile_all().await? {
        PassOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            for row in engine.list().await? {
                if row.unread > 0 {
                    println!("{:>5} new  {}  {}", row.unread, row.title, row.url);
                }
            }
            Ok(())
        }
        PassOutcome::Skipped => Ok(()),
        PassOutcome::Failed(error) => bail!("{} ({})", error.displayable_message, error.message),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;

    if args.command == "example-config" {
        print!("{}", Config::example_config());
        return Ok(());
    }

    let config = load_config(&args)?;
    init_logging(&config.logging.level);
    config.validate()?;

    match args.command.as_str() {
        "serve" => serve(config, args.ephemeral).await,
        "check" => check(config).await,
        other => bail!("unknown command: {}\n\n{}", other, USAGE),
    }
}
