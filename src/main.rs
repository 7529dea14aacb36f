mod app;
mod cache;
mod codeforces;
mod commands;
mod config;
mod contests;
mod event;
mod export;
mod logging;
mod query;
mod stats;
mod store;
mod students;
mod sync;
mod tracker;
mod ui;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;

use crate::commands::Command;

#[derive(Parser, Debug)]
#[command(name = "cftrack")]
#[command(about = "Track students' Codeforces progress from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./cftrack.yaml, then $XDG_CONFIG_HOME/cftrack/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// What to do; opens the dashboard when omitted
  #[command(subcommand)]
  command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  match args.command.unwrap_or(Command::Dashboard) {
    Command::Dashboard => {
      // The dashboard owns the terminal, so logs go to a file
      let _guard = logging::init_file()?;
      let tracker = tracker::open(&config)?;
      info!("Starting dashboard");

      let mut app = app::App::new(tracker);
      app.run().await?;
    }
    command => {
      logging::init_stderr()?;
      let tracker = tracker::open(&config)?;
      commands::run(&tracker, command).await?;
    }
  }

  Ok(())
}
