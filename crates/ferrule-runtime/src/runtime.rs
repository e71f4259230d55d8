//! Runtime bootstrap.
//!
//! [`FerruleRuntime`] loads and validates configuration, installs the log
//! subscriber and turns a [`Function`] into the [`InvocationHandler`] a host
//! drives.
//!
//! ```rust,ignore
//! let runtime = FerruleRuntime::new()?;
//! let handler = runtime.prepare(Function::new(greet));
//!
//! // for every event the host receives
//! let response = handler.invoke(Context::new(), payload).await?;
//! ```

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ConfigLoader, FerruleConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use ferrule_framework::middleware::warmup;
use ferrule_framework::{Function, InvocationHandler};

#[derive(Debug, Clone)]
pub struct FerruleRuntime {
    config: FerruleConfig,
}

impl FerruleRuntime {
    /// Loads configuration from the default locations and initializes
    /// logging.
    pub fn new() -> RuntimeResult<Self> {
        Self::builder().build()
    }

    /// ```rust,ignore
    /// let runtime = FerruleRuntime::builder()
    ///     .config_file("config/ferrule.toml")
    ///     .profile("production")
    ///     .build()?;
    /// ```
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config` and initializes logging from it.
    ///
    /// A subscriber installed earlier by the host is left in place.
    pub fn from_config(config: FerruleConfig) -> RuntimeResult<Self> {
        Self::assemble(config, true)
    }

    fn assemble(config: FerruleConfig, init_logging: bool) -> RuntimeResult<Self> {
        validate_config(&config)?;
        if init_logging {
            logging::init_from_config(&config.logging);
        }
        info!(
            function = %config.function.name,
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            "Runtime initialized"
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &FerruleConfig {
        &self.config
    }

    /// Installs the configured subscriber, failing if one already exists.
    ///
    /// For runtimes built with [`RuntimeBuilder::without_logging`].
    pub fn try_init_logging(&self) -> RuntimeResult<()> {
        logging::try_init_from_config(&self.config.logging)?;
        Ok(())
    }

    /// Applies the `function` settings and snapshots the handler.
    pub fn prepare(&self, function: Function) -> InvocationHandler {
        let settings = &self.config.function;
        let function = self.configure(function);

        if let Some(error) = function.signature_error() {
            warn!(function = %settings.name, %error, "Preparing a rejected handler");
        }

        info!(
            function = %settings.name,
            auto_unmarshal = function.is_auto_unmarshal(),
            warmup = settings.warmup,
            middleware = function.chain().len(),
            "Function prepared"
        );
        function.handler()
    }

    /// `auto_unmarshal = false` disables decoding; `warmup = true` adds the
    /// warmup middleware ahead of decoding unless the function already has it.
    fn configure(&self, mut function: Function) -> Function {
        let settings = &self.config.function;

        if !settings.auto_unmarshal {
            function.disable_auto_unmarshal();
        }
        if settings.warmup && !function.has_before_decode(warmup::NAME) {
            function = function.before_decode(warmup());
        }
        function
    }
}

/// Collects configuration sources for a [`FerruleRuntime`].
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    skip_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Overrides a dotted configuration key.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.loader = self.loader.set(key, value);
        self
    }

    /// Leaves subscriber setup to the host.
    pub fn without_logging(mut self) -> Self {
        self.skip_logging = true;
        self
    }

    pub fn build(self) -> RuntimeResult<FerruleRuntime> {
        let config = self.loader.load()?;
        FerruleRuntime::assemble(config, !self.skip_logging)
    }
}
