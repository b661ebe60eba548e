mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod mutation;
mod query;
mod ui;

use app::{App, Services, StartView};
use chrono::{Local, NaiveDate};
use clap::Parser;
use color_eyre::Result;
use event::EventHandler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "daybook")]
#[command(about = "A terminal UI for daily goals and todos")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/daybook/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Day to open the goal list on, as YYYY-MM-DD (default: today)
  #[arg(short, long)]
  date: Option<NaiveDate>,

  /// List to open with
  #[arg(long, value_enum, default_value_t = StartView::Goals)]
  view: StartView,

  /// Keep the query cache in SQLite so it survives restarts
  #[arg(long)]
  offline_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if args.offline_cache {
    config.cache.backend = config::CacheBackend::Sqlite;
  }

  let _log_guard = logging::init(&config)?;
  info!(version = env!("CARGO_PKG_VERSION"), "starting daybook");

  let events = EventHandler::new(Duration::from_millis(250));
  let services = Services::new(&config, Arc::new(events.notifier()))?;
  let date = args.date.unwrap_or_else(|| Local::now().date_naive());

  // Initialize and run the app
  let mut app = App::new(config, services, date, args.view);
  app.run(events).await?;

  info!("exiting");
  Ok(())
}
