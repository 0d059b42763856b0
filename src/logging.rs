//! Tracing subscriber setup.

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::store::default_data_dir;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log.level`. With `log.file` set, events go to a daily
/// rolling file under the data directory instead of stderr; keep the returned
/// guard alive until exit so buffered lines are flushed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

  if config.file {
    let dir = default_data_dir()
      .ok_or_else(|| eyre!("Could not determine a data directory for log files"))?
      .join("logs");
    std::fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::daily(dir, "flx.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
      .with(filter)
      .with(
        tracing_subscriber::fmt::layer()
          .with_writer(writer)
          .with_ansi(false),
      )
      .try_init()?;
    Ok(Some(guard))
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
      .try_init()?;
    Ok(None)
  }
}
