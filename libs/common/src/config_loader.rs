//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables with the service prefix (`__` separates nesting)
//! 2. The YAML config file
//! 3. The type's `Default` values

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result};

/// Where a service looks for its configuration
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Explicit file (e.g. from `--config`); must exist when set
    pub explicit: Option<PathBuf>,
    /// Fallback file, skipped silently when missing
    pub default_path: PathBuf,
    /// Environment prefix, e.g. `AUTOMATION_`
    pub env_prefix: String,
}

impl ConfigSource {
    pub fn new(default_path: impl Into<PathBuf>, env_prefix: impl Into<String>) -> Self {
        Self {
            explicit: None,
            default_path: default_path.into(),
            env_prefix: env_prefix.into(),
        }
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// The file that will be read, if any
    pub fn file(&self) -> Option<&Path> {
        match &self.explicit {
            Some(path) => Some(path.as_path()),
            None if self.default_path.exists() => Some(self.default_path.as_path()),
            None => None,
        }
    }

    fn figment<T: Serialize + Default>(&self) -> Result<Figment> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut figment = Figment::from(Serialized::defaults(T::default()));
        match self.file() {
            Some(path) => {
                info!("Loading config from {}", path.display());
                figment = figment.merge(Yaml::file(path));
            },
            None => debug!(
                "No config file at {}, using defaults",
                self.default_path.display()
            ),
        }
        Ok(figment.merge(Env::prefixed(&self.env_prefix).split("__")))
    }
}

/// Load `T` from defaults, the YAML file and prefixed environment variables
pub fn load_layered<T>(source: &ConfigSource) -> Result<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    Ok(source.figment::<T>()?.extract()?)
}
