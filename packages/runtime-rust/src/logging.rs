//! Tracing setup for the `holobot` binary.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

/// The name of this crate, used as a filter target.
const THIS_CRATE: &str = env!("CARGO_CRATE_NAME");

/// Console output style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Builds the event filter.
///
/// An explicit `directive` wins. Otherwise `RUST_LOG` is used, falling back
/// to `info` (plus `debug` for the holobot crates when `verbose`).
///
/// # Errors
///
/// Fails when a directive cannot be parsed.
pub fn env_filter(directive: Option<&str>, verbose: bool) -> anyhow::Result<EnvFilter> {
    if let Some(directive) = directive {
        return Ok(EnvFilter::try_new(directive)?);
    }
    let fallback = if verbose {
        format!("info,{THIS_CRATE}=debug,holobot_core=debug")
    } else {
        String::from("info")
    };
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?)
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn install_tracing(format: LogFormat, filter: EnvFilter) -> anyhow::Result<()> {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .pretty()
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_target(true)
            .compact()
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
