use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber. Defaults to `info`; `--debug` raises
/// this crate (not the AWS SDK) to `debug`. RUST_LOG directives refine both.
pub fn init(debug: bool) -> Result<()> {
    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    if debug {
        filter = filter.add_directive("easy_sqs=debug".parse()?);
    }
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}
