use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const WORMHOLE_CHAIN_ID_TERRA: u16 = 3;

/// Public Wormhole v2 mainnet guardian REST endpoints.
pub const DEFAULT_GUARDIAN_HOSTS: [&str; 6] = [
    "https://wormhole-v2-mainnet-api.certus.one",
    "https://wormhole.inotel.ro",
    "https://wormhole-v2-mainnet-api.mcf.rocks",
    "https://wormhole-v2-mainnet-api.chainlayer.network",
    "https://wormhole-v2-mainnet-api.staking.fund",
    "https://wormhole-v2-mainnet.01node.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Base URL of the transaction indexer (`/v1/txs/by_account` is appended).
    pub base_url: String,
    /// Terra account whose transactions are the rebases.
    pub account: String,
    pub timeout_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.extraterrestrial.money".into(),
            account: "terra12dt7sfw3wkuhh2ys6cj8a5glrzpxdhdgyt6j24".into(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraConfig {
    pub lcd_url: String,
    /// Cosmos chain id of the LCD, for display only.
    pub chain_id: String,
    /// Terra token bridge contract; its address is the Wormhole emitter.
    pub token_bridge: String,
    /// Wormhole chain id of Terra.
    pub wormhole_chain_id: u16,
    pub timeout_ms: u64,
}

impl Default for TerraConfig {
    fn default() -> Self {
        Self {
            lcd_url: "https://lcd.terra.dev".into(),
            chain_id: "columbus-5".into(),
            token_bridge: "terra10nmmwe8r3g99a9newtqa7a75xfgs2e8z87r2sf".into(),
            wormhole_chain_id: WORMHOLE_CHAIN_ID_TERRA,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub hosts: Vec<String>,
    /// Retries after the first attempt. Ignored when `unbounded` is set.
    pub max_retries: Option<u32>,
    /// Ignore `max_retries` and keep rotating hosts until one answers.
    pub unbounded: bool,
    /// Fixed delay before each attempt.
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            hosts: DEFAULT_GUARDIAN_HOSTS.iter().map(|&s| s.into()).collect(),
            max_retries: policy.max_retries,
            unbounded: false,
            retry_delay_ms: u64::try_from(policy.delay.as_millis()).unwrap_or(1_000),
            timeout_ms: 10_000,
        }
    }
}

impl RelayConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: if self.unbounded {
                None
            } else {
                self.max_retries
            },
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolanaConfig {
    pub rpc_url: String,
    /// Token bridge program that owns claim accounts.
    pub token_bridge_program: String,
    pub timeout_ms: u64,
}

impl Default for SolanaConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://sencha.rpcpool.com".into(),
            token_bridge_program: "wormDTUJ6AWPNvk59vGQbDvGJmqbDTdgWgAqcLBCgUb".into(),
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Records checked concurrently per chunk; chunks run sequentially.
    pub chunk_size: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { chunk_size: 50 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub indexer: IndexerConfig,
    pub terra: TerraConfig,
    pub relay: RelayConfig,
    pub solana: SolanaConfig,
    pub check: CheckConfig,
}
