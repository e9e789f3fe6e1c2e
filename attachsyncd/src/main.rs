use std::path::PathBuf;

use anyhow::Context;
use attachsyncd::bootstrap;
use attachsyncd::config::SyncConfig;
use attachsyncd::logging::init_logging;
use attachsyncd::mirror::engine::SyncEngine;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliMode {
    Run {
        config: Option<PathBuf>,
        verbose: bool,
    },
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut verbose = false;
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a file path")?;
                config = Some(PathBuf::from(path));
            }
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => return Ok(CliMode::Help),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(CliMode::Run { config, verbose })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config_path, verbose) = match parse_cli_mode(std::env::args())? {
        CliMode::Help => {
            println!("Usage: attachsyncd [--config <file>] [--verbose]");
            println!("  --config   Read settings from this env file instead of ./.env");
            println!("  --verbose  Log debug output");
            return Ok(());
        }
        CliMode::Run { config, verbose } => (config, verbose),
    };
    init_logging(verbose)?;

    let config = SyncConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    info!(
        organization = %config.organization,
        root = %config.destination_root,
        main_folder = %config.main_folder,
        upload_budget = config.upload_budget,
        "starting attachment mirror"
    );

    let clients = bootstrap::connect(&config).await?;
    let engine = SyncEngine::new(clients.source, clients.destination, config.mirror_settings());
    let summary = engine.run().await.context("mirror run aborted")?;

    info!(
        spaces = summary.spaces,
        files = summary.files_seen,
        uploaded = summary.uploaded,
        already_present = summary.already_present,
        unsupported = summary.unsupported,
        failed = summary.failed,
        uploads_remaining = summary.uploads_remaining,
        "run finished"
    );
    Ok(())
}
