//! The three jobs the tool runs: discover new rebases, check redemptions, report.

use eyre::Context as _;
use std::{path::Path, time::Duration};

use crate::{
    chains::solana::SolanaChain,
    cli_output,
    config::TrackerConfig,
    indexer::IndexerClient,
    ledger::{CheckMode, Ledger, LedgerSummary},
    paths::TrackerPaths,
    redeem::{BridgeRoute, Redeemer},
    relay::GuardianRelay,
    retry::Failover,
    terra::{self, TerraLcd},
};

/// Where `check` writes its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckOutput {
    /// Update `rebases.json` in place.
    #[default]
    Ledger,
    /// Leave `rebases.json` alone and write the checked ledger to `redeemed.json`.
    Redeemed,
}

/// Pull the account's transactions and append unseen hashes to the ledger.
pub async fn fetch(paths: &TrackerPaths, cfg: &TrackerConfig) -> eyre::Result<usize> {
    let indexer = IndexerClient::new(
        &cfg.indexer.base_url,
        Duration::from_millis(cfg.indexer.timeout_ms),
    )?;
    let hashes = indexer
        .account_tx_hashes(&cfg.indexer.account)
        .await
        .with_context(|| format!("fetch txs for {}", cfg.indexer.account))?;

    let added = record_discovered(&paths.ledger_file, &hashes)?;
    cli_output::print_discovered(added);
    Ok(added)
}

/// Append the unseen entries of `hashes` (newest first) to the ledger at `ledger_file`.
fn record_discovered(ledger_file: &Path, hashes: &[String]) -> eyre::Result<usize> {
    let mut ledger = Ledger::load(ledger_file)?;
    let added = ledger.append_discovered(hashes.iter().map(String::as_str));
    // Nothing new means nothing to write; the file stays byte-for-byte identical.
    if added > 0 {
        ledger.save(ledger_file)?;
    }
    tracing::info!(
        fetched = hashes.len(),
        added,
        total = ledger.len(),
        "fetch complete"
    );
    Ok(added)
}

pub fn build_redeemer(
    cfg: &TrackerConfig,
) -> eyre::Result<Redeemer<TerraLcd, GuardianRelay, SolanaChain>> {
    let emitter_hex = terra::emitter_address(&cfg.terra.token_bridge)?;
    let claim_program = SolanaChain::parse_pubkey(&cfg.solana.token_bridge_program)
        .context("solana.token_bridge_program")?;

    let lcd = TerraLcd::new(
        &cfg.terra.lcd_url,
        Duration::from_millis(cfg.terra.timeout_ms),
    )?;
    let relay = GuardianRelay::new(
        Failover::new(cfg.relay.hosts.clone())?,
        cfg.relay.retry_policy(),
        Duration::from_millis(cfg.relay.timeout_ms),
    )?;
    let solana = SolanaChain::new(
        &cfg.solana.rpc_url,
        Duration::from_millis(cfg.solana.timeout_ms),
    );

    Ok(Redeemer::new(
        lcd,
        relay,
        solana,
        BridgeRoute {
            origin_chain_id: cfg.terra.wormhole_chain_id,
            emitter_hex,
            claim_program,
        },
    ))
}

/// Re-check redemption status and persist after every chunk.
pub async fn check(
    paths: &TrackerPaths,
    cfg: &TrackerConfig,
    mode: CheckMode,
    output: CheckOutput,
) -> eyre::Result<LedgerSummary> {
    let redeemer = build_redeemer(cfg)?;
    let out_path: &Path = match output {
        CheckOutput::Ledger => &paths.ledger_file,
        CheckOutput::Redeemed => &paths.redeemed_file,
    };

    let mut ledger = Ledger::load(&paths.ledger_file)?;
    if ledger.is_empty() {
        tracing::warn!(path = %paths.ledger_file.display(), "ledger is empty; run fetch first");
    }
    let pending = ledger.needs_check(mode);
    tracing::info!(
        terra_chain = %cfg.terra.chain_id,
        pending = pending.len(),
        total = ledger.len(),
        chunk_size = cfg.check.chunk_size,
        ?mode,
        "checking redemptions"
    );

    let results = redeemer
        .check_batch(&pending, cfg.check.chunk_size, |chunk| {
            let changed = ledger.apply(chunk.iter().cloned());
            tracing::debug!(changed, "persisting chunk");
            ledger.save(out_path)
        })
        .await?;

    if pending.is_empty() && output == CheckOutput::Redeemed {
        ledger.save(out_path)?;
    }

    let checked = LedgerSummary::tally(results.iter().map(|(_, s)| *s));
    cli_output::print_checked(&checked);
    Ok(checked)
}

pub fn summary(paths: &TrackerPaths) -> eyre::Result<LedgerSummary> {
    Ok(Ledger::load(&paths.ledger_file)?.summary())
}
