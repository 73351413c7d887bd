#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context as _;
use std::io::Write as _;
use tracing_subscriber::prelude::*;

mod chains;
mod cli_output;
mod config;
mod errors;
mod fsutil;
mod indexer;
mod ledger;
mod paths;
mod redeem;
mod relay;
mod retry;
mod store;
mod terra;
mod vaa;
mod workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliOutput {
    /// Update data/rebases.json in place.
    Ledger,
    /// Write results to data/redeemed.json and leave the ledger untouched.
    Redeemed,
}

impl From<CliOutput> for workflow::CheckOutput {
    fn from(v: CliOutput) -> Self {
        match v {
            CliOutput::Ledger => Self::Ledger,
            CliOutput::Redeemed => Self::Redeemed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rebase-tracker", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the account's transactions and append new rebases to the ledger.
    Fetch,

    /// Check whether each rebase's Wormhole transfer has been redeemed on Solana.
    Check {
        /// Re-check every record, including ones already marked redeemed.
        #[arg(long, default_value_t = false)]
        all: bool,

        /// Where to write the results.
        #[arg(long, value_enum, default_value_t = CliOutput::Ledger)]
        output: CliOutput,
    },

    /// `fetch` followed by `check`.
    Sync {
        /// Re-check every record, including ones already marked redeemed.
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Print ledger counts as JSON.
    Summary,

    /// Print the effective configuration as TOML.
    Config {
        /// Write the default configuration to the config path instead.
        #[arg(long, default_value_t = false)]
        init: bool,

        /// With `--init`, overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

const fn check_mode(all: bool) -> ledger::CheckMode {
    if all {
        ledger::CheckMode::All
    } else {
        ledger::CheckMode::OnlyUnredeemed
    }
}

fn init_logging(paths: &paths::TrackerPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("rebase-tracker.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::TrackerPaths::discover();
    fsutil::ensure_dir(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);

    let store = store::ConfigStore::new(&paths);

    match cli.cmd {
        Command::Fetch => {
            let cfg = store.load()?;
            workflow::fetch(&paths, &cfg).await.context("fetch failed")?;
            Ok(())
        }
        Command::Check { all, output } => {
            let cfg = store.load()?;
            workflow::check(&paths, &cfg, check_mode(all), output.into())
                .await
                .context("check failed")?;
            Ok(())
        }
        Command::Sync { all } => {
            let cfg = store.load()?;
            workflow::fetch(&paths, &cfg).await.context("fetch failed")?;
            workflow::check(
                &paths,
                &cfg,
                check_mode(all),
                workflow::CheckOutput::Ledger,
            )
            .await
            .context("check failed")?;
            Ok(())
        }
        Command::Summary => {
            let summary = workflow::summary(&paths)?;
            let s = serde_json::to_string_pretty(&summary).context("serialize summary")?;
            writeln!(std::io::stdout().lock(), "{s}").context("write summary")?;
            Ok(())
        }
        Command::Config { init, force } => {
            if init {
                if store.path().exists() && !force {
                    eyre::bail!(
                        "{} already exists; pass --force to overwrite",
                        store.path().display()
                    );
                }
                store.save(&config::TrackerConfig::default())?;
                cli_output::print_config_written(store.path());
                return Ok(());
            }
            let cfg = store.load()?;
            let s = toml::to_string_pretty(&cfg).context("serialize config")?;
            write!(std::io::stdout().lock(), "{s}").context("write config")?;
            Ok(())
        }
    }
}
