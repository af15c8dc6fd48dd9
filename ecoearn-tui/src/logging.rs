//! File logging; the terminal itself belongs to the UI.

use std::path::Path;

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a daily-rotated `ecoearn.log` writer under `dir`.
pub(crate) fn init(level: &str, dir: &Path) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("ecoearn")
        .filename_suffix("log")
        .build(dir)?;

    let filter = EnvFilter::try_new(level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_level(true)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}
