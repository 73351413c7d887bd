use base64::Engine as _;
use eyre::Context as _;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::retry::{Failover, RetryPolicy};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignedVaaResponse {
    vaa_bytes: String,
}

/// Fetches signed VAAs from the public guardian REST endpoints, rotating hosts on failure.
#[derive(Debug)]
pub struct GuardianRelay {
    hosts: Failover,
    policy: RetryPolicy,
    client: Client,
}

impl GuardianRelay {
    pub fn new(hosts: Failover, policy: RetryPolicy, timeout: Duration) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build guardian http client")?;
        Ok(Self {
            hosts,
            policy,
            client,
        })
    }

    pub async fn signed_vaa(
        &self,
        chain_id: u16,
        emitter_hex: &str,
        sequence: &str,
    ) -> eyre::Result<Vec<u8>> {
        let path = format!("v1/signed_vaa/{chain_id}/{emitter_hex}/{sequence}");
        self.hosts
            .run(&self.policy, "fetch signed vaa", |host| {
                let url = format!("{host}/{path}");
                let client = self.client.clone();
                async move { fetch_vaa(&client, &url).await }
            })
            .await
    }
}

async fn fetch_vaa(client: &Client, url: &str) -> eyre::Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("guardian request {url}"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        eyre::bail!("guardian http {status} from {url}: {}", body.trim());
    }
    let v: SignedVaaResponse = resp.json().await.context("guardian signed vaa json")?;
    decode_vaa_bytes(&v.vaa_bytes)
}

fn decode_vaa_bytes(b64: &str) -> eyre::Result<Vec<u8>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .context("decode vaaBytes base64")?;
    if bytes.is_empty() {
        eyre::bail!("guardian returned empty vaaBytes");
    }
    Ok(bytes)
}
