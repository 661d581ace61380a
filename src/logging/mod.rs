//! # Logging Module
//!
//! Declarative logging configuration installed as a `tracing-subscriber`
//! registry.
//!
//! ## Model
//!
//! The configuration names **formatters** (how a record looks), **handlers**
//! (where records go) and **loggers** (which `tracing` targets feed which
//! handlers, at what level), plus a **root** logger for every other target.
//! Logger names use `::` or `.` separators; `starling.plugins` and
//! `starling::plugins` name the same target.
//!
//! A `queue` handler puts a background worker in front of the handlers it
//! lists, so logging calls never wait on I/O. The default configuration routes
//! everything through one:
//!
//! ```text
//! root (INFO) ──┐
//!               ├─> queue_listener ──(worker)──> console (stderr, DEBUG, "standard")
//! starling (INFO)┘
//! ```
//!
//! ## Installation
//!
//! [`LoggingConfig::configure`] validates every cross reference, builds one
//! formatted layer per written handler with its own `EnvFilter` and installs
//! the registry as the global default. That can happen once per process; a
//! second call fails. Keep the returned [`LoggingGuard`] alive for as long as
//! queued records should be flushed.
//!
//! ## Environment Variables
//!
//! `STARLING_LOG_LEVEL` replaces the root level (`debug`, `INFO`, `warning`, ...).

mod handlers;

pub use handlers::{
    FilterConfig, FormatterConfig, HandlerConfig, LogFormat, LogLevel, LoggerConfig,
    StreamTarget,
};

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::io;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable overriding the root level.
pub const LOG_LEVEL_ENV: &str = "STARLING_LOG_LEVEL";

/// Lines a queue handler buffers when no limit is configured.
pub const DEFAULT_QUEUE_LINES: usize = 128_000;

fn version_one() -> u8 {
    1
}

fn yes() -> bool {
    true
}

fn literal_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let version = u8::deserialize(deserializer)?;
    if version == 1 {
        Ok(version)
    } else {
        Err(serde::de::Error::custom(format!(
            "unsupported logging config version {version}, expected 1"
        )))
    }
}

fn default_formatters() -> IndexMap<String, FormatterConfig> {
    IndexMap::from([("standard".to_string(), FormatterConfig::default())])
}

fn default_handlers() -> IndexMap<String, HandlerConfig> {
    IndexMap::from([
        (
            "console".to_string(),
            HandlerConfig::Stream {
                stream: StreamTarget::Stderr,
                level: Some(LogLevel::Debug),
                formatter: Some("standard".to_string()),
                filters: Vec::new(),
            },
        ),
        (
            "queue_listener".to_string(),
            HandlerConfig::Queue {
                handlers: vec!["console".to_string()],
                buffered_lines_limit: None,
            },
        ),
    ])
}

fn default_loggers() -> IndexMap<String, LoggerConfig> {
    IndexMap::from([(
        "starling".to_string(),
        LoggerConfig {
            level: Some(LogLevel::Info),
            handlers: vec!["queue_listener".to_string()],
            propagate: None,
        },
    )])
}

fn default_root() -> LoggerConfig {
    LoggerConfig {
        level: Some(LogLevel::Info),
        handlers: vec!["queue_listener".to_string()],
        propagate: None,
    }
}

/// Process-wide logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Always 1
    #[serde(default = "version_one", deserialize_with = "literal_version")]
    pub version: u8,
    /// Updating an installed configuration is not supported; must be false
    #[serde(default)]
    pub incremental: bool,
    /// Accepted for compatibility with dict-style configs. Targets without a
    /// logger entry always fall back to the root logger.
    #[serde(default)]
    pub disable_existing_loggers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<IndexMap<String, FilterConfig>>,
    /// Default for loggers that do not set `propagate`
    #[serde(default = "yes")]
    pub propagate: bool,
    #[serde(default = "default_formatters")]
    pub formatters: IndexMap<String, FormatterConfig>,
    #[serde(default = "default_handlers")]
    pub handlers: IndexMap<String, HandlerConfig>,
    #[serde(default = "default_loggers")]
    pub loggers: IndexMap<String, LoggerConfig>,
    #[serde(default = "default_root")]
    pub root: LoggerConfig,
    /// Whether `STARLING_LOG_LEVEL` may replace the root level
    #[serde(skip, default = "yes")]
    pub env_override: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            version: 1,
            incremental: false,
            disable_existing_loggers: false,
            filters: None,
            propagate: true,
            formatters: default_formatters(),
            handlers: default_handlers(),
            loggers: default_loggers(),
            root: default_root(),
            env_override: true,
        }
    }
}

/// One formatted output: records routed through `via` written by `sink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Route {
    pub via: String,
    pub sink: String,
    /// Lines buffered by the queue in front of the sink, if any
    pub queue: Option<usize>,
    pub directives: Vec<String>,
}

/// Keeps queue workers running; dropping it flushes and stops them.
#[must_use = "dropping the guard stops queued logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _workers: Vec<WorkerGuard>,
}

impl LoggingConfig {
    /// Load from a YAML, TOML or JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        crate::config::load_file(path.as_ref())
    }

    /// Check every name the configuration refers to.
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!("unsupported logging config version {}, expected 1", self.version);
        }
        if self.incremental {
            bail!("incremental logging configuration is not supported; logging is installed once");
        }
        let loggers = self
            .loggers
            .iter()
            .map(|(name, logger)| (format!("logger '{name}'"), logger))
            .chain(std::iter::once(("root logger".to_string(), &self.root)));
        for (owner, logger) in loggers {
            for handler in &logger.handlers {
                if !self.handlers.contains_key(handler) {
                    bail!("{owner} refers to unknown handler '{handler}'");
                }
            }
        }
        for (name, handler) in &self.handlers {
            if let Some(formatter) = handler.formatter() {
                if !self.formatters.contains_key(formatter) {
                    bail!("handler '{name}' refers to unknown formatter '{formatter}'");
                }
            }
            for filter in handler.filters() {
                if !self.filters.as_ref().is_some_and(|f| f.contains_key(filter)) {
                    bail!("handler '{name}' refers to unknown filter '{filter}'");
                }
            }
            if let HandlerConfig::Queue { handlers, .. } = handler {
                if handlers.is_empty() {
                    bail!("queue handler '{name}' lists no handlers");
                }
                for target in handlers {
                    match self.handlers.get(target) {
                        None => bail!("queue handler '{name}' refers to unknown handler '{target}'"),
                        Some(HandlerConfig::Queue { .. }) => {
                            bail!("queue handler '{name}' cannot feed queue handler '{target}'")
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Root level after applying `override_level` (the `STARLING_LOG_LEVEL`
    /// value) when overrides are enabled.
    pub fn effective_root_level(&self, override_level: Option<&str>) -> Result<LogLevel> {
        match override_level.filter(|_| self.env_override) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("{LOG_LEVEL_ENV}: {e}")),
            None => Ok(self.root.level.unwrap_or(LogLevel::Warning)),
        }
    }

    /// `EnvFilter` directives for records routed through handler `via` and
    /// written by a sink with its own minimum level.
    fn directives(&self, via: &str, root_level: LogLevel, sink_level: Option<LogLevel>) -> Vec<String> {
        // stricter of the logger and handler levels
        let cap = |level: LogLevel| sink_level.map_or(level, |s| level.max(s)).directive();
        let in_root = self.root.handlers.iter().any(|h| h == via);
        let mut directives = vec![if in_root { cap(root_level) } else { "off" }.to_string()];
        for (name, logger) in &self.loggers {
            let direct = logger.handlers.iter().any(|h| h == via);
            let propagated = in_root && logger.propagate.unwrap_or(self.propagate);
            let level = if direct || propagated {
                cap(logger.level.unwrap_or(root_level))
            } else {
                "off"
            };
            directives.push(format!("{}={level}", name.replace('.', "::")));
        }
        if let Some(filters) = &self.filters {
            for filter in self.handlers.get(via).map(HandlerConfig::filters).unwrap_or_default() {
                if let Some(config) = filters.get(filter) {
                    directives.extend(config.directives.iter().cloned());
                }
            }
        }
        directives
    }

    /// Every formatted output the configuration produces, queue handlers
    /// expanded into their targets. Handlers no logger uses produce nothing.
    pub(crate) fn routes(&self, root_level: LogLevel) -> Vec<Route> {
        let mut used: Vec<&str> = Vec::new();
        for name in self
            .root
            .handlers
            .iter()
            .chain(self.loggers.values().flat_map(|l| &l.handlers))
        {
            if !used.contains(&name.as_str()) {
                used.push(name);
            }
        }

        let mut routes = Vec::new();
        for via in used {
            match self.handlers.get(via) {
                Some(HandlerConfig::Queue {
                    handlers,
                    buffered_lines_limit,
                }) => {
                    for sink in handlers {
                        let sink_level = self.handlers.get(sink).and_then(HandlerConfig::level);
                        let mut directives = self.directives(via, root_level, sink_level);
                        if let (Some(filters), Some(handler)) = (&self.filters, self.handlers.get(sink)) {
                            for filter in handler.filters() {
                                if let Some(config) = filters.get(filter) {
                                    directives.extend(config.directives.iter().cloned());
                                }
                            }
                        }
                        routes.push(Route {
                            via: via.to_string(),
                            sink: sink.clone(),
                            queue: Some(buffered_lines_limit.unwrap_or(DEFAULT_QUEUE_LINES)),
                            directives,
                        });
                    }
                }
                Some(handler) => routes.push(Route {
                    via: via.to_string(),
                    sink: via.to_string(),
                    queue: None,
                    directives: self.directives(via, root_level, handler.level()),
                }),
                None => {}
            }
        }
        routes
    }

    /// Validate and install as the global subscriber.
    ///
    /// # Errors
    ///
    /// Invalid references, unparsable levels or filter directives, unwritable
    /// log files, or a subscriber already being installed.
    pub fn configure(&self) -> Result<LoggingGuard> {
        self.validate()?;
        let env_level = std::env::var(LOG_LEVEL_ENV).ok();
        let root_level = self.effective_root_level(env_level.as_deref())?;

        let mut workers = Vec::new();
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        let routes = self.routes(root_level);
        for route in &routes {
            let handler = self
                .handlers
                .get(&route.sink)
                .with_context(|| format!("unknown handler '{}'", route.sink))?;
            let formatter = handler
                .formatter()
                .and_then(|name| self.formatters.get(name))
                .cloned()
                .unwrap_or_default();
            let (writer, worker) = make_writer(handler, route.queue)
                .with_context(|| format!("Failed to open handler '{}'", route.sink))?;
            workers.extend(worker);
            let filter = EnvFilter::builder()
                .parse(route.directives.join(","))
                .with_context(|| format!("Invalid filter for handler '{}'", route.via))?;
            let ansi = formatter.with_ansi && matches!(handler, HandlerConfig::Stream { .. });
            layers.push(fmt_layer(&formatter, ansi, writer).with_filter(filter).boxed());
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("Failed to install logging configuration")?;

        info!(
            root_level = %root_level,
            outputs = routes.len(),
            queue_workers = workers.len(),
            "Logging configured"
        );
        Ok(LoggingGuard { _workers: workers })
    }
}

fn make_writer(
    handler: &HandlerConfig,
    queue: Option<usize>,
) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
    fn queued<W: io::Write + Send + 'static>(
        writer: W,
        lines: usize,
    ) -> (BoxMakeWriter, Option<WorkerGuard>) {
        let (non_blocking, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(lines)
            .finish(writer);
        (BoxMakeWriter::new(non_blocking), Some(guard))
    }

    Ok(match (handler, queue) {
        (HandlerConfig::Stream { stream: StreamTarget::Stderr, .. }, None) => {
            (BoxMakeWriter::new(io::stderr), None)
        }
        (HandlerConfig::Stream { stream: StreamTarget::Stdout, .. }, None) => {
            (BoxMakeWriter::new(io::stdout), None)
        }
        (HandlerConfig::Stream { stream: StreamTarget::Stderr, .. }, Some(lines)) => {
            queued(io::stderr(), lines)
        }
        (HandlerConfig::Stream { stream: StreamTarget::Stdout, .. }, Some(lines)) => {
            queued(io::stdout(), lines)
        }
        (HandlerConfig::File { path, .. }, queue) => {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("log file path {} has no file name", path.display()))?;
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(directory)?;
            match queue {
                Some(lines) => queued(appender, lines),
                None => (BoxMakeWriter::new(appender), None),
            }
        }
        (HandlerConfig::Queue { .. }, _) => bail!("queue handlers do not write records themselves"),
    })
}

fn fmt_layer(
    formatter: &FormatterConfig,
    ansi: bool,
    writer: BoxMakeWriter,
) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer::<Registry>()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(formatter.with_target)
        .with_thread_ids(formatter.with_thread_ids)
        .with_file(formatter.with_location)
        .with_line_number(formatter.with_location);
    match formatter.format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
    }
}
