use std::io::IsTerminal as _;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "LBOOK_LOG";

/// Logs go to stderr; stdout carries labels, chapter text and session replies.
pub fn init() -> anyhow::Result<()> {
    let filter = log_filter().context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

fn log_filter() -> anyhow::Result<EnvFilter> {
    for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
        if let Ok(directives) = std::env::var(var) {
            return EnvFilter::try_new(&directives).with_context(|| format!("parse {var}"));
        }
    }
    Ok(EnvFilter::new("info"))
}
