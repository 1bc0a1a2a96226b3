//! Configuration for the storage directory.
//!
//! Configuration is loaded from the following sources, highest precedence first:
//!
//! 1. Environment variables (prefixed with `FS__`)
//! 2. YAML configuration file
//! 3. Defaults
//!
//! For example, `FS__STORAGE_DIR=/data` is equivalent to this YAML file:
//!
//! ```yaml
//! storage_dir: /data
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::storage_dir::StorageDir;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "FS__";

/// Storage configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Directory path for storing files.
    ///
    /// The directory will be created if it doesn't exist. Relative paths are resolved from the
    /// working directory.
    ///
    /// # Default
    ///
    /// `"storage"`
    ///
    /// # Environment Variable
    ///
    /// `FS__STORAGE_DIR`
    pub storage_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage"),
        }
    }
}

impl Config {
    /// Loads configuration, merging defaults, the optional YAML file at `path`, and the
    /// environment, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Creates the configured storage directory.
    pub fn open(&self) -> Result<StorageDir> {
        StorageDir::create(&self.storage_dir).with_context(|| {
            format!(
                "failed to create storage directory `{}`",
                self.storage_dir.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_storage() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();
            assert_eq!(config.storage_dir, Path::new("storage"));
            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FS__STORAGE_DIR", "/srv/files");

            let config = Config::load(None).unwrap();
            assert_eq!(config.storage_dir, Path::new("/srv/files"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yml", "storage_dir: from-yaml")?;

            let config = Config::load(Some(Path::new("config.yml"))).unwrap();
            assert_eq!(config.storage_dir, Path::new("from-yaml"));

            jail.set_env("FS__STORAGE_DIR", "from-env");
            let config = Config::load(Some(Path::new("config.yml"))).unwrap();
            assert_eq!(config.storage_dir, Path::new("from-env"));
            Ok(())
        });
    }

    #[test]
    fn open_creates_directory() {
        let tempdir = tempfile::tempdir().unwrap();
        let config = Config {
            storage_dir: tempdir.path().join("files"),
        };

        let dir = config.open().unwrap();
        assert!(dir.path().is_dir());
    }
}
