//! # Logging
//!
//! Installs the process-wide `tracing` subscriber: an `EnvFilter`, one
//! formatted output layer, and an optional forwarder that hands every
//! surviving event to the host's [`LoggerSink`].
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;
//! tracing::info!(containers = 4, "Manifest loaded");
//! ```
//!
//! Forwarded entries pass through [`redact_if_sensitive`] unless redaction is
//! switched off. Console output is not redacted; call sites that log file
//! locations use [`strip_path`].

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

const REDACTED: &str = "[REDACTED]";

/// Field names whose values never leave the process.
const SECRET_KEYS: [&str; 6] = [
    "token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "bearer",
];

/// Crates that log at the configured level by default. Everything else,
/// including the HTTP and SQLite stacks, stays at `warn`.
const WORKSPACE_TARGETS: [&str; 5] = [
    "core_runtime",
    "core_content",
    "core_service",
    "provider_github",
    "bridge_desktop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored. Default for debug builds.
    Pretty,
    /// One JSON object per event. Default for release builds.
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Full `EnvFilter` directive string; replaces the level-based default.
    pub filter: Option<String>,
    pub sink: Option<Arc<dyn LoggerSink>>,
    /// Redact secrets and emails in entries handed to `sink`.
    pub redact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            sink: None,
            redact: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_sink", &self.sink.is_some())
            .field("redact", &self.redact)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact = enabled;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let directives = match &self.filter {
            Some(custom) => custom.clone(),
            None => default_directives(self.level),
        };
        EnvFilter::try_new(directives)
            .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
    }
}

/// Installs the global subscriber. Only the first call in a process succeeds.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = config.env_filter()?;

    tracing_subscriber::registry()
        .with(output_layer(config.format))
        .with(filter)
        .with(HostForwarder {
            sink: config.sink,
            redact: config.redact,
        })
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    match format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

fn default_directives(level: LogLevel) -> String {
    let level = to_tracing_level(level).as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}

fn to_tracing_level(level: LogLevel) -> tracing::Level {
    match level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    }
}

fn from_tracing_level(level: &tracing::Level) -> LogLevel {
    match *level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

/// Mirrors events into the host sink.
struct HostForwarder {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl HostForwarder {
    fn entry<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(from_tracing_level(metadata.level()), metadata.target(), message);
        for (key, value) in fields.pairs {
            let value = if self.redact {
                redact_if_sensitive(&key, &value)
            } else {
                value
            };
            entry.fields.insert(key, value);
        }
        entry.span = ctx.lookup_current().map(|span| span.name().to_string());
        entry
    }
}

impl<S> Layer<S> for HostForwarder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };
        if from_tracing_level(event.metadata().level()) < sink.min_level() {
            return;
        }

        let entry = self.entry(event, &ctx);
        let sink = Arc::clone(sink);
        // Inside a runtime the sink runs as a task; elsewhere it runs inline.
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = sink.log(entry).await {
                        eprintln!("log sink failed: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                    eprintln!("log sink failed: {}", e);
                }
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    pairs: Vec<(String, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.pairs.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}

/// Value to log for `key`: fully hidden for secret-looking keys, the
/// domain hidden for email addresses, unchanged otherwise.
///
/// ```ignore
/// info!(token = %redact_if_sensitive("token", &token), "Authenticated");
/// ```
pub fn redact_if_sensitive(key: &str, value: &str) -> String {
    let key = key.to_ascii_lowercase();
    if SECRET_KEYS.iter().any(|secret| key.contains(secret)) {
        return REDACTED.to_string();
    }

    match value.split_once('@') {
        Some((local, domain)) if domain.contains('.') => {
            let initial: String = local.chars().take(1).collect();
            format!("{}***@{}", initial, REDACTED)
        }
        _ => value.to_string(),
    }
}

/// Last component of a Unix or Windows path, so logs never carry the
/// user's home directory.
pub fn strip_path(path: &str) -> &str {
    path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path)
}
