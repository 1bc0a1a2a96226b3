//! Configuration for the load test.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags
//! 2. Environment variables (prefixed with `LOADTEST__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! Environment variables use double underscores (`__`) to denote nested configuration structures.
//! For example, `LOADTEST__TASKS__UPLOAD=5` sets the weight of the upload task.
//!
//! A complete YAML file with all defaults looks like this:
//!
//! ```yaml
//! remote: http://localhost:8000
//! users: 10
//! duration: 1m
//! ramp_up: 0s
//!
//! wait_time:
//!   min: 300ms
//!   max: 1200ms
//!
//! payload_sizes:
//!   min: 512
//!   max: 2048
//!
//! tasks:
//!   upload: 3
//!   download: 2
//!   list: 2
//!   health: 1
//!   metrics: 1
//!   root: 1
//!
//! logging:
//!   level: info
//!   format: auto
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::workload::{TaskWeights, Workload};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LOADTEST__";

/// Range of think-times between two tasks of a user.
#[derive(Debug, Deserialize, Serialize)]
pub struct WaitTime {
    /// Shortest think-time.
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Longest think-time.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for WaitTime {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(300),
            max: Duration::from_millis(1200),
        }
    }
}

/// Range of sizes of uploaded files.
#[derive(Debug, Deserialize, Serialize)]
pub struct PayloadSizes {
    /// Smallest payload.
    pub min: ByteSize,
    /// Largest payload.
    pub max: ByteSize,
}

impl Default for PayloadSizes {
    fn default() -> Self {
        Self {
            min: ByteSize::b(512),
            max: ByteSize::b(2048),
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they do not interleave with the report on stdout.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence if set.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `LOADTEST__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Load test configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the file storage service.
    ///
    /// # Default
    ///
    /// `http://localhost:8000`
    pub remote: String,

    /// Number of concurrent simulated users.
    ///
    /// # Default
    ///
    /// `10`
    pub users: usize,

    /// How long to run the load test.
    ///
    /// # Default
    ///
    /// `1m`
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Period over which user starts are spread evenly.
    ///
    /// # Default
    ///
    /// `0s` (all users start at once)
    #[serde(with = "humantime_serde")]
    pub ramp_up: Duration,

    /// Seed for task choices and payloads. Random if not set.
    pub seed: Option<u64>,

    /// Think-time between two tasks of a user.
    pub wait_time: WaitTime,

    /// Sizes of uploaded files.
    pub payload_sizes: PayloadSizes,

    /// Relative frequencies of the tasks.
    pub tasks: TaskWeights,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: "http://localhost:8000".into(),
            users: 10,
            duration: Duration::from_secs(60),
            ramp_up: Duration::ZERO,
            seed: None,
            wait_time: WaitTime::default(),
            payload_sizes: PayloadSizes::default(),
            tasks: TaskWeights::default(),
            logging: Logging::default(),
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

    /// Builds the [`Workload`] described by this configuration.
    pub fn workload(&self) -> Result<Workload> {
        let mut builder = Workload::builder()
            .users(self.users)
            .ramp_up(self.ramp_up)
            .wait_time(self.wait_time.min, self.wait_time.max)
            .payload_sizes(self.payload_sizes.min.as_u64(), self.payload_sizes.max.as_u64())
            .task_weights(self.tasks);
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.remote, "http://localhost:8000");
            assert_eq!(config.users, 10);
            assert_eq!(config.duration, Duration::from_secs(60));
            assert_eq!(config.wait_time.min, Duration::from_millis(300));
            assert_eq!(config.wait_time.max, Duration::from_millis(1200));
            assert_eq!(config.payload_sizes.min, ByteSize::b(512));
            assert_eq!(config.payload_sizes.max, ByteSize::b(2048));
            assert_eq!(config.tasks, TaskWeights::default());
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert!(config.seed.is_none());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LOADTEST__REMOTE", "http://files.internal:9000");
            jail.set_env("LOADTEST__USERS", "50");
            jail.set_env("LOADTEST__DURATION", "5m");
            jail.set_env("LOADTEST__TASKS__UPLOAD", "7");
            jail.set_env("LOADTEST__LOGGING__LEVEL", "debug");

            let config = Config::load(None).unwrap();

            assert_eq!(config.remote, "http://files.internal:9000");
            assert_eq!(config.users, 50);
            assert_eq!(config.duration, Duration::from_secs(300));
            assert_eq!(config.tasks.upload, 7);
            assert_eq!(config.tasks.download, 2);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "loadtest.yml",
                r#"
                remote: http://localhost:1234
                users: 3
                seed: 7
                wait_time:
                    min: 10ms
                    max: 20ms
                tasks:
                    list: 0
                logging:
                    format: json
                "#,
            )?;
            jail.set_env("LOADTEST__USERS", "4");

            let config = Config::load(Some(Path::new("loadtest.yml"))).unwrap();

            assert_eq!(config.remote, "http://localhost:1234");
            assert_eq!(config.users, 4);
            assert_eq!(config.seed, Some(7));
            assert_eq!(config.wait_time.min, Duration::from_millis(10));
            assert_eq!(config.wait_time.max, Duration::from_millis(20));
            assert_eq!(config.tasks.list, 0);
            assert_eq!(config.tasks.upload, 3);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn builds_workload() {
        let config = Config {
            users: 5,
            seed: Some(1),
            ..Default::default()
        };
        let workload = config.workload().unwrap();
        assert_eq!(workload.users(), 5);

        let config = Config {
            payload_sizes: PayloadSizes {
                min: ByteSize::kib(4),
                max: ByteSize::kib(1),
            },
            ..Default::default()
        };
        assert!(config.workload().is_err());
    }
}
