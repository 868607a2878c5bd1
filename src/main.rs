mod app;
mod cache;
mod commands;
mod config;
mod error;
mod event;
mod export;
mod logging;
mod remote;
mod sync;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "adminsync")]
#[command(about = "A terminal admin console that keeps working when the backend doesn't")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/adminsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Screen to open first
  #[arg(short, long, value_enum)]
  screen: Option<config::ScreenKind>,

  /// Don't read or write the fallback cache
  #[arg(long)]
  no_cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // The terminal belongs to the UI, so logs go to a file
  let _log_guard = logging::init(&logging::default_log_dir()?)?;

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  tracing::info!(backend = %config.backend.url, "Starting adminsync");

  // Initialize and run the app
  let mut app = app::App::new(&config, args.no_cache, args.screen)?;
  app.run().await?;

  Ok(())
}
