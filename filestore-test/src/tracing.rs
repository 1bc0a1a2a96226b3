//! Log capture for load test runs inside `cargo test`.

use tracing_subscriber::EnvFilter;

/// Crates whose logs are shown by default: the load test runner and the in-process server.
const WORKSPACE_CRATES: &[&str] = &["loadtest", "filestore_config", "filestore_test"];

/// Initializes logging for tests. Calling it again is a no-op.
///
/// Output goes through the test runner's capture, so it only shows up for failing tests or with
/// `--nocapture`. `RUST_LOG` replaces the default filter, which logs everything from the workspace
/// crates and only errors from dependencies such as `hyper` or `reqwest`.
///
/// # Example
///
/// ```
/// filestore_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

fn default_filter() -> EnvFilter {
    WORKSPACE_CRATES
        .iter()
        .fold(EnvFilter::new("error"), |filter, name| {
            filter.add_directive(format!("{name}=trace").parse().unwrap())
        })
}
