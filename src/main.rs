use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;
use url::Url;

use nawiri_offline::cache::{CacheStorage, SqliteStorage};
use nawiri_offline::clients::{LoggingHub, LoggingNotifications};
use nawiri_offline::config::Config;
use nawiri_offline::http::FetchRequest;
use nawiri_offline::net::HttpFetcher;
use nawiri_offline::router::RouteOutcome;
use nawiri_offline::worker::OfflineWorker;

#[derive(Parser, Debug)]
#[command(name = "nawiri-offline")]
#[command(about = "Offline request router and cache tool for the Nawiri POS client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/nawiri-offline/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the application shell and offline fallbacks
  Install,
  /// Sweep old-version stores and announce the current version
  Activate,
  /// Route a single URL through the worker and print the outcome
  Fetch {
    url: String,
    /// Treat the request as a page navigation
    #[arg(long)]
    navigate: bool,
  },
  /// Replay queued pending orders
  Sync,
  /// List cache stores and their entry counts
  Status,
}

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  init_tracing();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let storage = SqliteStorage::open()?;
  let worker = OfflineWorker::new(
    config.clone(),
    storage,
    Arc::new(HttpFetcher::new()?),
    Arc::new(LoggingHub),
    Arc::new(LoggingNotifications),
  )?;

  match args.command {
    Command::Install => {
      worker.lifecycle().install().await?;
      println!("Installed {}", config.version);
    }
    Command::Activate => {
      worker.lifecycle().activate().await?;
      println!("Activated {}", config.version);
    }
    Command::Fetch { url, navigate } => {
      let url = resolve_url(&config, &url)?;
      let request = if navigate {
        FetchRequest::navigation(url)
      } else {
        FetchRequest::get(url)
      };

      let handle = worker.handle();
      tokio::spawn(worker.run_dispatcher());

      match handle.fetch(request).await? {
        RouteOutcome::Response(response) => {
          println!("HTTP {}", response.status);
          for (name, value) in &response.headers {
            println!("{}: {}", name, value);
          }
          println!();
          println!("{}", String::from_utf8_lossy(&response.body));
        }
        RouteOutcome::PassThrough => {
          println!("Not handled by the worker (pass-through)");
        }
      }
    }
    Command::Sync => {
      worker.sync_manager().flush_pending().await?;
      println!("Pending orders flushed");
    }
    Command::Status => {
      let storage = worker.storage();
      for store in storage.store_names()? {
        let count = storage.keys(&store)?.len();
        println!("{}  ({} entries)", store, count);
      }
    }
  }

  Ok(())
}

/// Resolve a possibly-relative URL against the configured origin.
fn resolve_url(config: &Config, url: &str) -> Result<Url> {
  match Url::parse(url) {
    Ok(absolute) => Ok(absolute),
    Err(_) => Ok(config.origin_url()?.join(url)?),
  }
}
