use eyre::Context as _;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TxsByAccount {
    data: TxsData,
}

#[derive(Debug, Deserialize)]
struct TxsData {
    #[serde(default)]
    txs: Vec<IndexedTx>,
}

#[derive(Debug, Deserialize)]
struct IndexedTx {
    txhash: String,
}

/// Client for the third-party Terra transaction indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    base_url: String,
    client: Client,
}

impl IndexerClient {
    pub fn new(base_url: &str, timeout: Duration) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build indexer http client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            client,
        })
    }

    /// Hashes of every transaction touching `account`, newest first.
    pub async fn account_tx_hashes(&self, account: &str) -> eyre::Result<Vec<String>> {
        let url = format!("{}/v1/txs/by_account", self.base_url);
        let resp = self
            .client
            .get(url)
            .query(&[("account", account)])
            .send()
            .await
            .context("indexer request")?;
        if !resp.status().is_success() {
            eyre::bail!("indexer http {}", resp.status());
        }
        let body = resp.text().await.context("indexer body")?;
        parse_tx_hashes(&body)
    }
}

fn parse_tx_hashes(body: &str) -> eyre::Result<Vec<String>> {
    let v: TxsByAccount = serde_json::from_str(body).context("indexer json")?;
    Ok(v.data.txs.into_iter().map(|t| t.txhash).collect())
}
