use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crate::errors::TrackerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt. `None` keeps going until an attempt succeeds.
    pub max_retries: Option<u32>,
    /// Fixed sleep taken before every attempt, the first one included.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            // Two full passes over the six public guardian hosts.
            max_retries: Some(12),
            delay: Duration::from_secs(1),
        }
    }
}

/// Round-robin selection over a fixed endpoint list.
///
/// Every call to [`Failover::next_endpoint`] advances the cursor, whether or not the previous
/// endpoint worked. There is no health tracking: a failing endpoint is picked again once the
/// rotation comes back around to it.
#[derive(Debug)]
pub struct Failover {
    endpoints: Vec<String>,
    // Number of selections made so far; the next pick is `cursor % len`.
    cursor: AtomicUsize,
}

impl Failover {
    pub fn new(endpoints: Vec<String>) -> Result<Self, TrackerError> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_owned())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(TrackerError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn next_endpoint(&self) -> &str {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.endpoints.get(i).map_or("", String::as_str)
    }

    /// Run `op` against successive endpoints until it succeeds or `policy` gives up.
    ///
    /// With `max_retries = Some(n)` the operation is attempted at most `n + 1` times and the
    /// last error is returned.
    pub async fn run<T, Fut>(
        &self,
        policy: &RetryPolicy,
        context_label: &'static str,
        mut op: impl FnMut(String) -> Fut,
    ) -> eyre::Result<T>
    where
        Fut: Future<Output = eyre::Result<T>>,
    {
        let mut failures: u32 = 0;
        loop {
            tokio::time::sleep(policy.delay).await;
            let endpoint = self.next_endpoint().to_owned();
            match op(endpoint.clone()).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if policy.max_retries.is_some_and(|max| failures > max) {
                        return Err(e
                            .wrap_err(TrackerError::RetriesExhausted { attempts: failures })
                            .wrap_err(context_label));
                    }
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempt = failures,
                        error = %e,
                        "{context_label}: attempt failed, rotating endpoint"
                    );
                }
            }
        }
    }
}
