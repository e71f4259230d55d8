//! Configuration for the Ferrule runtime.
//!
//! - [`schema`]: the configuration structure and its defaults
//! - [`loader`]: layered loading from files and `FERRULE_*` variables
//! - [`validation`]: checks applied after loading

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    FerruleConfig, FunctionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
