use clap::Parser;
use color_eyre::Result;
use flx::{app::App, cli::Args, config::Config, logging};

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override base URL if specified on command line
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  let _guard = logging::init(&config.log)?;
  tracing::debug!(
    base_url = %config.api.base_url,
    backend = ?config.storage.backend,
    "configuration loaded"
  );

  let app = App::new(&config)?;
  app.run(args.command).await?;

  Ok(())
}
