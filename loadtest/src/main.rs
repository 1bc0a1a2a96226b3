//! This is a load test binary which runs simulated users against a file storage service.
//!
//! See the [`loadtest::config`] module for all configuration options.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use argh::FromArgs;

use loadtest::config::Config;
use loadtest::http::HttpRemote;
use loadtest::observability::init_tracing;

/// Load tester for the file storage API
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// base URL of the file storage service
    #[argh(option)]
    pub remote: Option<String>,

    /// number of concurrent simulated users
    #[argh(option, short = 'u')]
    pub users: Option<usize>,

    /// how long to run, for example `30s` or `5m`
    #[argh(option, short = 'd', from_str_fn(parse_duration))]
    pub duration: Option<Duration>,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(remote) = args.remote {
        config.remote = remote;
    }
    if let Some(users) = args.users {
        config.users = users;
    }
    if let Some(duration) = args.duration {
        config.duration = duration;
    }

    init_tracing(&config.logging);
    tracing::debug!(?config);

    let remote = HttpRemote::new(&config.remote).context("invalid remote")?;
    let workload = config.workload().context("invalid workload")?;

    let report = loadtest::run(remote, workload, config.duration).await?;
    report.print();

    let failures = report.total().failures();
    if failures > 0 {
        anyhow::bail!("{failures} requests failed");
    }

    Ok(())
}
