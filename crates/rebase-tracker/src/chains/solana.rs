use eyre::Context as _;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::{str::FromStr as _, time::Duration};

pub struct SolanaChain {
    rpc: RpcClient,
}

impl std::fmt::Debug for SolanaChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaChain")
            .field("rpc_url", &self.rpc.url())
            .finish()
    }
}

impl SolanaChain {
    pub fn new(rpc_url: &str, timeout: Duration) -> Self {
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                rpc_url.trim().to_owned(),
                timeout,
                CommitmentConfig::confirmed(),
            ),
        }
    }

    pub fn parse_pubkey(s: &str) -> eyre::Result<Pubkey> {
        Pubkey::from_str(s.trim()).context("parse solana pubkey")
    }

    /// Whether `key` holds an account at `confirmed` commitment.
    pub async fn account_exists(&self, key: &Pubkey) -> eyre::Result<bool> {
        let resp = self
            .rpc
            .get_account_with_commitment(key, CommitmentConfig::confirmed())
            .await
            .with_context(|| format!("get account {key}"))?;
        Ok(resp.value.is_some())
    }
}
