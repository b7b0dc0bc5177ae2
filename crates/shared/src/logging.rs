//! Tracing setup shared by every binary in the workspace.
//!
//! Console output is human-readable. File output rotates daily under the
//! configured directory and can be JSON lines. `RUST_LOG` replaces the
//! default filter entirely when set.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: String,
    /// Names the log files and the default filter target
    pub component: String,
    pub default_level: Level,
    pub console: bool,
    pub file: bool,
    /// JSON lines in the log files
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "data/logs".to_string(),
            component: "anime-api".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

/// Parse a level name from the config file, falling back to INFO.
pub fn parse_level(name: &str) -> Level {
    name.parse().unwrap_or(Level::INFO)
}

/// Default filter directives for a component at the given level.
///
/// Our own crates follow `level`; HTTP and browser plumbing stays at warn.
fn default_directives(component: &str, level: Level) -> String {
    let ours = [
        component.replace('-', "_"),
        "shared".into(),
        "stream_scraper".into(),
        "tower_http".into(),
    ];
    let noisy = ["hyper", "reqwest", "h2", "chromiumoxide"];

    ours.iter()
        .map(|target| format!("{target}={level}"))
        .chain(noisy.iter().map(|target| format!("{target}=warn")))
        .collect::<Vec<_>>()
        .join(",")
}

fn console_layer<S>() -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stdout)
        .boxed()
}

fn file_layer<S>(log_dir: &Path, component: &str, json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = tracing_appender::rolling::daily(log_dir, format!("{component}.log"));

    if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(appender)
            .boxed()
    } else {
        fmt::layer()
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(appender)
            .boxed()
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed or the log directory cannot
/// be created.
pub fn init(config: LogConfig) -> Result<()> {
    let log_dir = Path::new(&config.log_dir);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.component, config.default_level)));

    let mut layers = Vec::new();
    if config.console {
        layers.push(console_layer());
    }
    if config.file {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        layers.push(file_layer(log_dir, &config.component, config.json_format));
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        component = %config.component,
        log_dir = %log_dir.display(),
        file = config.file,
        "Logging initialized"
    );

    Ok(())
}
