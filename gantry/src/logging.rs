//! # Logger Bootstrap
//!
//! Installs the global `tracing` subscriber with a level filter derived
//! from `LOG_LEVEL`. Only the three levels the gateway documents are
//! accepted; anything else is a startup error.
use tracing_subscriber::EnvFilter;

/// Initializes the global subscriber. Call once, from `main`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let directive = level_directive(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .init();
    Ok(())
}

fn level_directive(level: &str) -> anyhow::Result<&'static str> {
    match level.to_uppercase().as_str() {
        "DEBUG" => Ok("debug"),
        "INFO" => Ok("info"),
        "ERROR" => Ok("error"),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}
