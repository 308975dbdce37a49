//! Structured logging initialization.
//!
//! Installs a `tracing` subscriber with:
//! - an `EnvFilter` (honours `RUST_LOG`, else `VND_API_LOG_LEVEL`)
//! - a [`SamplingLayer`] that can thin out routine events
//! - a JSON or pretty `fmt` layer, optionally non-blocking
//!
//! | Variable | Default |
//! |---|---|
//! | `VND_API_LOG_LEVEL` | `info` |
//! | `VND_API_LOG_FORMAT` (`json`, `pretty`) | `json` |
//! | `VND_API_LOG_SAMPLING_MODE` (`all`, `error-only`, `sampled`) | `all` |
//! | `VND_API_LOG_SAMPLING_RATE` | `1.0` |
//! | `VND_API_LOG_ASYNC` | `false` |
//! | `VND_API_LOG_TARGET_FILTER` | unset |
//! | `VND_API_LOG_INCLUDE_LOCATION` | `false` |

use std::env;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tracing::{Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// JSON for production, pretty-print for development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Which events to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// Only WARN and ERROR.
    ErrorOnly,
    /// Every WARN and ERROR, a fraction of everything else.
    Sampled,
}

impl SamplingMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    /// 0.0-1.0, used by [`SamplingMode::Sampled`].
    pub sampling_rate: f64,
    /// Write through a `tracing_appender` worker thread.
    pub async_logging: bool,
    /// Extra comma-separated filter directives.
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: false,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str| {
            var(key).is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        };
        Self {
            log_level: var("VND_API_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: var("VND_API_LOG_FORMAT").map_or(defaults.format, |v| LogFormat::parse(&v)),
            sampling_mode: var("VND_API_LOG_SAMPLING_MODE")
                .map_or(defaults.sampling_mode, |v| SamplingMode::parse(&v)),
            sampling_rate: var("VND_API_LOG_SAMPLING_RATE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sampling_rate),
            async_logging: flag("VND_API_LOG_ASYNC"),
            target_filter: var("VND_API_LOG_TARGET_FILTER"),
            include_location: flag("VND_API_LOG_INCLUDE_LOCATION"),
        }
    }

    /// Pretty, debug level, with source locations.
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            ..Self::default()
        }
    }

    /// JSON, info level, sampled and non-blocking.
    pub fn default_prod() -> Self {
        Self {
            sampling_mode: SamplingMode::Sampled,
            sampling_rate: 0.1,
            async_logging: true,
            ..Self::default()
        }
    }
}

/// Decides per event whether it is emitted.
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let important = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => important,
            SamplingMode::Sampled => {
                if important {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let interval = (1.0 / self.sampling_rate).round() as u64;
                interval > 0 && count % interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

/// Install the global subscriber.
///
/// With async logging enabled the returned guard flushes buffered events on
/// drop; keep it alive for the lifetime of the process.
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    if let Some(target_filter) = &config.target_filter {
        for directive in target_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            let parsed = directive
                .parse()
                .with_context(|| format!("invalid log filter directive '{directive}'"))?;
            env_filter = env_filter.add_directive(parsed);
        }
    }

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate));

    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}
