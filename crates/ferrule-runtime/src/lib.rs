//! # Ferrule Runtime
//!
//! Bootstrap for hosts embedding a Ferrule function:
//!
//! - Layered configuration (`ferrule.toml` / `ferrule.yaml`, `FERRULE_*`
//!   variables, overrides in code)
//! - `tracing` subscriber setup driven by that configuration
//! - [`FerruleRuntime`], which applies the configuration to a
//!   [`Function`](ferrule_framework::Function)
//!
//! ## Feature flags
//!
//! - `toml-config`: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: the `json` log format
//!
//! ```rust,ignore
//! use ferrule_runtime::FerruleRuntime;
//!
//! let runtime = FerruleRuntime::new()?;
//! let handler = runtime.prepare(Function::new(greet));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, FerruleConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{FerruleRuntime, RuntimeBuilder};

pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler and middleware code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
