//! Layered configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. Profile file (`ferrule.{profile}.toml` / `ferrule.{profile}.yaml`)
//! 3. Main file (`ferrule.toml` / `ferrule.yaml`)
//! 4. `FERRULE_*` environment variables, `__` separating nested keys
//! 5. Values set on the loader
//!
//! `FERRULE_FUNCTION__WARMUP=true` sets `function.warmup`, and
//! `FERRULE_LOGGING__FILTERS__FERRULE_CORE=trace` adds a log filter.
//!
//! TOML files need the `toml-config` feature, YAML files `yaml-config`.
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .set("function.warmup", true)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::providers::{Env, Serialized};
use figment::{Figment, Provider};
use serde::Serialize;
use tracing::{debug, info, trace};

#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;

use super::error::{ConfigError, ConfigResult};
use super::schema::FerruleConfig;

const ENV_PREFIX: &str = "FERRULE_";
const PROFILE_VAR: &str = "FERRULE_PROFILE";
const FILE_STEM: &str = "ferrule";

/// Selects the optional profile file merged beneath the main file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Accepts the short forms `dev` and `prod`; anything else is a custom
    /// profile.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            "production" | "prod" => Self::Production,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `FERRULE_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder over the configuration sources.
#[derive(Debug)]
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    use_env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            use_env: true,
            overrides: Figment::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    ///
    /// Without any, the current directory and the user's `ferrule` config
    /// directory are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. A missing file is an
    /// error.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Overrides a single dotted key, e.g. `set("logging.level", "debug")`.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Merges an arbitrary figment provider above every other source.
    pub fn merge(mut self, provider: impl Provider) -> Self {
        self.overrides = self.overrides.merge(provider);
        self
    }

    pub fn load(self) -> ConfigResult<FerruleConfig> {
        let figment = self.figment()?;
        let config: FerruleConfig = figment.extract()?;
        debug!(
            profile = %self.profile,
            function = %config.function.name,
            level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(FerruleConfig::default()));

        match &self.file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            None => figment = self.merge_discovered(figment)?,
        }

        if self.use_env {
            trace!(prefix = ENV_PREFIX, "Merging environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides.clone()))
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(FILE_STEM)))
            .collect()
    }

    /// Merges the profile and main file of the first directory holding a
    /// main file, for each enabled format.
    fn merge_discovered(&self, mut figment: Figment) -> ConfigResult<Figment> {
        let candidates = self.search_dirs();
        let mut found = false;

        for ext in enabled_extensions() {
            let Some(dir) = candidates
                .iter()
                .find(|dir| dir.join(format!("{FILE_STEM}.{ext}")).is_file())
            else {
                continue;
            };

            let profile_file = dir.join(format!("{FILE_STEM}.{}.{ext}", self.profile));
            if profile_file.is_file() {
                debug!(path = %profile_file.display(), "Loading profile configuration");
                figment = merge_file(figment, &profile_file)?;
            }

            let main_file = dir.join(format!("{FILE_STEM}.{ext}"));
            info!(path = %main_file.display(), "Loading configuration file");
            figment = merge_file(figment, &main_file)?;
            found = true;
        }

        if !found {
            debug!("No configuration file found, using defaults");
        }
        Ok(figment)
    }
}

#[allow(unused_mut)]
fn enabled_extensions() -> Vec<&'static str> {
    let mut extensions = Vec::new();
    #[cfg(feature = "toml-config")]
    extensions.push("toml");
    #[cfg(feature = "yaml-config")]
    extensions.extend(["yaml", "yml"]);
    extensions
}

#[allow(unused_variables)]
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<FerruleConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file plus the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<FerruleConfig> {
    ConfigLoader::new().file(path).load()
}
