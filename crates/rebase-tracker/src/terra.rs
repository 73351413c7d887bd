use eyre::Context as _;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::TrackerError;

/// Attribute the Wormhole core contract emits with the message sequence number.
pub const SEQUENCE_ATTRIBUTE: &str = "message.sequence";

/// Pull the Wormhole sequence out of a Terra transaction's `raw_log`.
///
/// Only the first log entry is inspected; attributes of all its events are searched and entries
/// of the wrong shape are skipped. Non-JSON input, a missing attribute or a blank value yields
/// `None`.
pub fn parse_sequence_from_log(raw_log: &str) -> Option<String> {
    let logs: serde_json::Value = serde_json::from_str(raw_log).ok()?;
    let first = logs.as_array()?.first()?;
    first
        .get("events")?
        .as_array()?
        .iter()
        .filter_map(|e| e.get("attributes").and_then(serde_json::Value::as_array))
        .flatten()
        .find(|a| a.get("key").and_then(serde_json::Value::as_str) == Some(SEQUENCE_ATTRIBUTE))
        .and_then(|a| a.get("value"))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Wormhole emitter address for a Terra contract: the bech32 payload left-padded to 32 bytes,
/// hex encoded.
pub fn emitter_address(contract: &str) -> Result<String, TrackerError> {
    let invalid = |reason: String| TrackerError::InvalidEmitterAddress {
        address: contract.to_owned(),
        reason,
    };

    let (hrp, data) = bech32::decode(contract.trim()).map_err(|e| invalid(e.to_string()))?;
    if hrp.to_string() != "terra" {
        return Err(invalid(format!("unexpected prefix {hrp}")));
    }
    let mut out = [0_u8; 32];
    let start = out
        .len()
        .checked_sub(data.len())
        .ok_or_else(|| invalid(format!("payload is {} bytes", data.len())))?;
    out.get_mut(start..)
        .ok_or_else(|| invalid("payload does not fit".to_owned()))?
        .copy_from_slice(&data);
    Ok(hex::encode(out))
}

#[derive(Debug, Deserialize)]
struct GetTxResponse {
    tx_response: TxResponse,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    raw_log: String,
}

/// Minimal Terra LCD client: only transaction lookup by hash.
#[derive(Debug, Clone)]
pub struct TerraLcd {
    base_url: String,
    client: Client,
}

impl TerraLcd {
    pub fn new(base_url: &str, timeout: Duration) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build lcd http client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Raw log of a transaction, or `None` when the node does not know the hash.
    pub async fn tx_raw_log(&self, hash: &str) -> eyre::Result<Option<String>> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{hash}", self.base_url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("lcd request for tx {hash}"))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            eyre::bail!("lcd http {} for tx {hash}", resp.status());
        }
        let body: GetTxResponse = resp.json().await.context("lcd tx json")?;
        Ok(Some(body.tx_response.raw_log))
    }
}
