//! Configuration schema.
//!
//! ```toml
//! [function]
//! name = "greeter"
//! auto_unmarshal = true
//! warmup = true
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! filters = { ferrule_framework = "trace" }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FerruleConfig {
    #[serde(default)]
    pub function: FunctionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the runtime prepares the registered function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Name attached to startup logs.
    #[serde(default = "default_function_name")]
    pub name: String,

    /// Keep automatic payload decoding on. Setting this to `false` disables
    /// it even if the function enabled it in code; `true` never re-enables
    /// a function that opted out.
    #[serde(default = "default_true")]
    pub auto_unmarshal: bool,

    /// Answer keep-warm pings before the payload is decoded.
    #[serde(default)]
    pub warmup: bool,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            name: default_function_name(),
            auto_unmarshal: true,
            warmup: false,
        }
    }
}

fn default_function_name() -> String {
    "ferrule".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Required when `output` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `ferrule_framework = "trace"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number.
    #[serde(default)]
    pub file_location: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Falls back to `full` unless the `json-log` feature is enabled.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events get their own log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}
