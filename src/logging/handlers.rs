use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Log level names as they appear in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Level as written in an `EnvFilter` directive. `tracing` has no level
    /// above error, so critical maps onto it.
    #[must_use]
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "NOTSET" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" | "FATAL" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Output layout of a formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Level, timestamp, target and message on one line
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

fn yes() -> bool {
    true
}

/// How records are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "yes")]
    pub with_target: bool,
    #[serde(default)]
    pub with_thread_ids: bool,
    /// Include file and line of the call site
    #[serde(default)]
    pub with_location: bool,
    #[serde(default = "yes")]
    pub with_ansi: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        FormatterConfig {
            format: LogFormat::Full,
            with_target: true,
            with_thread_ids: false,
            with_location: false,
            with_ansi: true,
        }
    }
}

/// Extra `EnvFilter` directives a handler can opt into, e.g. `hyper=warn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTarget {
    Stdout,
    #[default]
    Stderr,
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum HandlerConfig {
    Stream {
        #[serde(default)]
        stream: StreamTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<LogLevel>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formatter: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filters: Vec<String>,
    },
    /// Appends to a single file, never rotated
    File {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        level: Option<LogLevel>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formatter: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        filters: Vec<String>,
    },
    /// Hands records to a background worker that writes them to the listed
    /// handlers, so logging never blocks the caller
    Queue {
        handlers: Vec<String>,
        /// Lines buffered before records are dropped
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffered_lines_limit: Option<usize>,
    },
}

impl HandlerConfig {
    #[must_use]
    pub fn level(&self) -> Option<LogLevel> {
        match self {
            HandlerConfig::Stream { level, .. } | HandlerConfig::File { level, .. } => *level,
            HandlerConfig::Queue { .. } => None,
        }
    }

    #[must_use]
    pub fn formatter(&self) -> Option<&str> {
        match self {
            HandlerConfig::Stream { formatter, .. } | HandlerConfig::File { formatter, .. } => {
                formatter.as_deref()
            }
            HandlerConfig::Queue { .. } => None,
        }
    }

    #[must_use]
    pub fn filters(&self) -> &[String] {
        match self {
            HandlerConfig::Stream { filters, .. } | HandlerConfig::File { filters, .. } => filters,
            HandlerConfig::Queue { .. } => &[],
        }
    }
}

/// A named logger (a `tracing` target prefix) or the root logger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub handlers: Vec<String>,
    /// Also pass records to the root handlers; defaults to the config's
    /// `propagate`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagate: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("critical".parse::<LogLevel>(), Ok(LogLevel::Critical));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Critical.directive(), "error");
    }

    #[test]
    fn test_handler_class_tag() {
        let handler: HandlerConfig =
            serde_json::from_str(r#"{"class": "stream", "level": "DEBUG", "formatter": "standard"}"#)
                .unwrap();
        assert_eq!(handler.level(), Some(LogLevel::Debug));
        assert_eq!(handler.formatter(), Some("standard"));

        let queue: HandlerConfig =
            serde_json::from_str(r#"{"class": "queue", "handlers": ["console"]}"#).unwrap();
        assert!(matches!(queue, HandlerConfig::Queue { ref handlers, .. } if handlers == &["console"]));
    }
}
