use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const LOG_LEVEL_VAR: &str = "CM_LOG_LEVEL";

/// Installs the global subscriber. Logs go to stderr; stdout carries the rendered documents.
pub fn init_logging() -> Result<()> {
    let level = parse_level(std::env::var(LOG_LEVEL_VAR).ok().as_deref())?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Unset or empty means `INFO`; anything else must name a level.
fn parse_level(raw: Option<&str>) -> Result<Level> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Level::from_str(raw)
            .with_context(|| format!("{LOG_LEVEL_VAR}=`{raw}` is not a log level")),
        None => Ok(Level::INFO),
    }
}
