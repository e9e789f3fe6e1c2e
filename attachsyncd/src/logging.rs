use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "attachsyncd=info,attachsync_core=info";
const VERBOSE_LOG_FILTER: &str = "attachsyncd=debug,attachsync_core=debug";

/// Installs the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}
