//! Decide whether a rebase's Wormhole transfer has been claimed on Solana.
//!
//! Terra tx -> `message.sequence` from its log -> signed VAA from the guardians -> claim PDA
//! under the Solana token bridge -> does that account exist.

use eyre::Context as _;
use futures::stream::{FuturesOrdered, TryStreamExt as _};
use solana_sdk::pubkey::Pubkey;

use crate::{
    chains::solana::SolanaChain,
    errors::TrackerError,
    ledger::{RebaseRecord, RedemptionStatus},
    relay::GuardianRelay,
    terra::{self, TerraLcd},
    vaa::Vaa,
};

pub trait OriginChain {
    /// Raw log of `hash`, `None` if the node has no such transaction.
    async fn raw_log(&self, hash: &str) -> eyre::Result<Option<String>>;
}

pub trait AttestationSource {
    async fn fetch_signed_vaa(
        &self,
        chain_id: u16,
        emitter_hex: &str,
        sequence: &str,
    ) -> eyre::Result<Vec<u8>>;
}

pub trait ClaimRegistry {
    async fn claim_exists(&self, claim: &Pubkey) -> eyre::Result<bool>;
}

impl OriginChain for TerraLcd {
    async fn raw_log(&self, hash: &str) -> eyre::Result<Option<String>> {
        self.tx_raw_log(hash).await
    }
}

impl AttestationSource for GuardianRelay {
    async fn fetch_signed_vaa(
        &self,
        chain_id: u16,
        emitter_hex: &str,
        sequence: &str,
    ) -> eyre::Result<Vec<u8>> {
        self.signed_vaa(chain_id, emitter_hex, sequence).await
    }
}

impl ClaimRegistry for SolanaChain {
    async fn claim_exists(&self, claim: &Pubkey) -> eyre::Result<bool> {
        self.account_exists(claim).await
    }
}

/// Where the transfers come from and which Solana program claims them.
#[derive(Debug, Clone)]
pub struct BridgeRoute {
    pub origin_chain_id: u16,
    pub emitter_hex: String,
    pub claim_program: Pubkey,
}

pub type CheckResult = (String, RedemptionStatus);

#[derive(Debug)]
pub struct Redeemer<O, A, C> {
    origin: O,
    attestations: A,
    claims: C,
    route: BridgeRoute,
}

impl<O, A, C> Redeemer<O, A, C>
where
    O: OriginChain,
    A: AttestationSource,
    C: ClaimRegistry,
{
    pub const fn new(origin: O, attestations: A, claims: C, route: BridgeRoute) -> Self {
        Self {
            origin,
            attestations,
            claims,
            route,
        }
    }

    pub async fn check(&self, terra_tx: &str) -> eyre::Result<RedemptionStatus> {
        let Some(raw_log) = self.origin.raw_log(terra_tx).await? else {
            tracing::debug!(terra_tx, "tx not found on origin chain");
            return Ok(RedemptionStatus::Unknown);
        };
        let Some(sequence) = terra::parse_sequence_from_log(&raw_log) else {
            tracing::debug!(terra_tx, "no wormhole sequence in tx log");
            return Ok(RedemptionStatus::Unknown);
        };

        let signed = self
            .attestations
            .fetch_signed_vaa(
                self.route.origin_chain_id,
                &self.route.emitter_hex,
                &sequence,
            )
            .await?;
        let vaa = Vaa::parse(&signed)?;
        self.ensure_matches_route(&vaa, &sequence)?;
        tracing::debug!(
            terra_tx,
            guardian_set = vaa.guardian_set_index,
            signatures = vaa.signature_count,
            timestamp = vaa.timestamp,
            "signed vaa"
        );
        let claim = vaa.claim_address(&self.route.claim_program);
        let redeemed = self.claims.claim_exists(&claim).await?;
        tracing::debug!(terra_tx, sequence = %sequence, %claim, redeemed, "checked redemption");

        Ok(if redeemed {
            RedemptionStatus::Redeemed
        } else {
            RedemptionStatus::Unredeemed
        })
    }

    // Guardians answer by (chain, emitter, sequence); a VAA for anything else is a relay bug.
    fn ensure_matches_route(&self, vaa: &Vaa, sequence: &str) -> Result<(), TrackerError> {
        let emitter = hex::encode(vaa.emitter_address);
        if vaa.emitter_chain != self.route.origin_chain_id
            || !emitter.eq_ignore_ascii_case(&self.route.emitter_hex)
            || vaa.sequence.to_string() != sequence.trim()
        {
            return Err(TrackerError::InvalidVaa(format!(
                "asked for {}/{}/{sequence}, got {}/{emitter}/{}",
                self.route.origin_chain_id, self.route.emitter_hex, vaa.emitter_chain, vaa.sequence
            )));
        }
        Ok(())
    }

    /// Check `records` in chunks of `chunk_size`. Chunks run one after another; records inside
    /// a chunk run concurrently, and any failure aborts the whole batch.
    ///
    /// `on_chunk` sees each finished chunk before the next starts, so callers can persist
    /// progress.
    pub async fn check_batch(
        &self,
        records: &[RebaseRecord],
        chunk_size: usize,
        mut on_chunk: impl FnMut(&[CheckResult]) -> eyre::Result<()>,
    ) -> eyre::Result<Vec<CheckResult>> {
        let mut out = Vec::with_capacity(records.len());
        for (i, chunk) in records.chunks(chunk_size.max(1)).enumerate() {
            let futs: FuturesOrdered<_> = chunk
                .iter()
                .map(|r| async move {
                    let status = self
                        .check(&r.terra_tx)
                        .await
                        .with_context(|| format!("check {}", r.terra_tx))?;
                    Ok::<_, eyre::Report>((r.terra_tx.clone(), status))
                })
                .collect();
            let results: Vec<CheckResult> = futs.try_collect().await?;
            tracing::info!(chunk = i, checked = results.len(), "chunk done");
            on_chunk(&results)?;
            out.extend(results);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::{HashMap, HashSet},
        str::FromStr as _,
        sync::Mutex,
    };

    const TOKEN_BRIDGE: &str = "wormDTUJ6AWPNvk59vGQbDvGJmqbDTdgWgAqcLBCgUb";
    const EMITTER: &str = "0000000000000000000000007cf7b764e38a0a5e967972c1df77d432510564e2";

    fn log_with_sequence(seq: &str) -> String {
        format!(
            r#"[{{"events":[{{"type":"wasm","attributes":[{{"key":"message.sequence","value":"{seq}"}}]}}]}}]"#
        )
    }

    fn emitter_bytes() -> eyre::Result<[u8; 32]> {
        let v = hex::decode(EMITTER)?;
        <[u8; 32]>::try_from(v.as_slice()).map_err(|e| eyre::eyre!("{e}"))
    }

    fn signed_vaa(sequence: u64) -> eyre::Result<Vec<u8>> {
        let mut v = vec![1_u8];
        v.extend_from_slice(&0_u32.to_be_bytes());
        v.push(0);
        v.extend_from_slice(&0_u32.to_be_bytes());
        v.extend_from_slice(&0_u32.to_be_bytes());
        v.extend_from_slice(&3_u16.to_be_bytes());
        v.extend_from_slice(&emitter_bytes()?);
        v.extend_from_slice(&sequence.to_be_bytes());
        v.push(0);
        Ok(v)
    }

    fn claim_for(sequence: u64) -> eyre::Result<Pubkey> {
        Ok(Vaa::parse(&signed_vaa(sequence)?)?.claim_address(&Pubkey::from_str(TOKEN_BRIDGE)?))
    }

    struct FakeTerra(HashMap<String, String>);

    impl OriginChain for FakeTerra {
        async fn raw_log(&self, hash: &str) -> eyre::Result<Option<String>> {
            Ok(self.0.get(hash).cloned())
        }
    }

    #[derive(Default)]
    struct FakeGuardians {
        calls: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl AttestationSource for FakeGuardians {
        async fn fetch_signed_vaa(
            &self,
            chain_id: u16,
            emitter_hex: &str,
            sequence: &str,
        ) -> eyre::Result<Vec<u8>> {
            assert_eq!(chain_id, 3);
            assert_eq!(emitter_hex, EMITTER);
            self.calls
                .lock()
                .map_err(|e| eyre::eyre!("mutex poisoned: {e}"))?
                .push(sequence.to_owned());
            if self.failing.contains(sequence) {
                eyre::bail!("guardians unavailable");
            }
            signed_vaa(sequence.parse()?)
        }
    }

    struct FakeSolana(HashSet<Pubkey>);

    impl ClaimRegistry for FakeSolana {
        async fn claim_exists(&self, claim: &Pubkey) -> eyre::Result<bool> {
            Ok(self.0.contains(claim))
        }
    }

    fn redeemer(
        logs: &[(&str, String)],
        guardians: FakeGuardians,
        claimed: &[u64],
    ) -> eyre::Result<Redeemer<FakeTerra, FakeGuardians, FakeSolana>> {
        let logs = logs
            .iter()
            .map(|(h, l)| ((*h).to_owned(), l.clone()))
            .collect();
        let claims = claimed
            .iter()
            .map(|&s| claim_for(s))
            .collect::<eyre::Result<HashSet<_>>>()?;
        Ok(Redeemer::new(
            FakeTerra(logs),
            guardians,
            FakeSolana(claims),
            BridgeRoute {
                origin_chain_id: 3,
                emitter_hex: EMITTER.to_owned(),
                claim_program: Pubkey::from_str(TOKEN_BRIDGE)?,
            },
        ))
    }

    fn calls(r: &Redeemer<FakeTerra, FakeGuardians, FakeSolana>) -> eyre::Result<Vec<String>> {
        Ok(r.attestations
            .calls
            .lock()
            .map_err(|e| eyre::eyre!("mutex poisoned: {e}"))?
            .clone())
    }

    #[tokio::test]
    async fn existing_claim_account_means_redeemed() -> eyre::Result<()> {
        let r = redeemer(
            &[("A", log_with_sequence("61915")), ("B", log_with_sequence("61916"))],
            FakeGuardians::default(),
            &[61_915],
        )?;
        assert_eq!(r.check("A").await?, RedemptionStatus::Redeemed);
        assert_eq!(r.check("B").await?, RedemptionStatus::Unredeemed);
        Ok(())
    }

    #[tokio::test]
    async fn missing_sequence_is_unknown_without_asking_guardians() -> eyre::Result<()> {
        let r = redeemer(
            &[
                ("A", "out of gas".to_owned()),
                ("B", "[]".to_owned()),
                ("C", log_with_sequence("")),
            ],
            FakeGuardians::default(),
            &[],
        )?;
        assert_eq!(r.check("A").await?, RedemptionStatus::Unknown);
        assert_eq!(r.check("B").await?, RedemptionStatus::Unknown);
        assert_eq!(r.check("C").await?, RedemptionStatus::Unknown);
        assert_eq!(r.check("not-on-chain").await?, RedemptionStatus::Unknown);
        assert!(calls(&r)?.is_empty());
        Ok(())
    }

    struct WrongSequence;

    impl AttestationSource for WrongSequence {
        async fn fetch_signed_vaa(&self, _: u16, _: &str, _: &str) -> eyre::Result<Vec<u8>> {
            signed_vaa(7)
        }
    }

    #[tokio::test]
    async fn vaa_for_another_message_is_rejected() -> eyre::Result<()> {
        let r = Redeemer::new(
            FakeTerra([("A".to_owned(), log_with_sequence("8"))].into_iter().collect()),
            WrongSequence,
            FakeSolana(HashSet::new()),
            BridgeRoute {
                origin_chain_id: 3,
                emitter_hex: EMITTER.to_owned(),
                claim_program: Pubkey::from_str(TOKEN_BRIDGE)?,
            },
        );
        let err = r.check("A").await.err().ok_or_else(|| eyre::eyre!("expected failure"))?;
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::InvalidVaa(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn batch_runs_in_chunks_and_keeps_order() -> eyre::Result<()> {
        let logs: Vec<(&str, String)> = vec![
            ("A", log_with_sequence("1")),
            ("B", log_with_sequence("2")),
            ("C", "garbage".to_owned()),
            ("D", log_with_sequence("4")),
            ("E", log_with_sequence("5")),
        ];
        let r = redeemer(&logs, FakeGuardians::default(), &[2, 5])?;
        let records: Vec<RebaseRecord> = ["A", "B", "C", "D", "E"]
            .into_iter()
            .map(RebaseRecord::new)
            .collect();

        let mut chunk_sizes = vec![];
        let got = r
            .check_batch(&records, 2, |chunk| {
                chunk_sizes.push(chunk.len());
                Ok(())
            })
            .await?;

        assert_eq!(chunk_sizes, vec![2, 2, 1]);
        assert_eq!(
            got,
            vec![
                ("A".to_owned(), RedemptionStatus::Unredeemed),
                ("B".to_owned(), RedemptionStatus::Redeemed),
                ("C".to_owned(), RedemptionStatus::Unknown),
                ("D".to_owned(), RedemptionStatus::Unredeemed),
                ("E".to_owned(), RedemptionStatus::Redeemed),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn one_failure_aborts_the_batch_after_earlier_chunks() -> eyre::Result<()> {
        let logs: Vec<(&str, String)> = vec![
            ("A", log_with_sequence("1")),
            ("B", log_with_sequence("2")),
            ("C", log_with_sequence("3")),
            ("D", log_with_sequence("4")),
        ];
        let guardians = FakeGuardians {
            failing: ["3".to_owned()].into_iter().collect(),
            ..FakeGuardians::default()
        };
        let r = redeemer(&logs, guardians, &[])?;
        let records: Vec<RebaseRecord> = ["A", "B", "C", "D"]
            .into_iter()
            .map(RebaseRecord::new)
            .collect();

        let mut persisted: Vec<String> = vec![];
        let res = r
            .check_batch(&records, 2, |chunk| {
                persisted.extend(chunk.iter().map(|(h, _)| h.clone()));
                Ok(())
            })
            .await;

        let err = res.err().ok_or_else(|| eyre::eyre!("expected failure"))?;
        assert!(format!("{err:#}").contains("check C"));
        assert_eq!(persisted, vec!["A", "B"]);
        Ok(())
    }
}
