//! TTL cache over the upstream plugin template document.
//!
//! One entry per fetch URL, tagged with its fetch time and replaced
//! wholesale on refresh. Freshness wins over availability: a failed refresh
//! propagates its error and the expired entry is never served in its place.

use crate::errors::BrokerError;
use crate::metrics_defs::{
    UPSTREAM_CACHE_HIT, UPSTREAM_CACHE_MISS, UPSTREAM_FETCH_DURATION, UPSTREAM_REFRESH_FAILURE,
};
use parking_lot::Mutex;
use serde_json::Value;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry {
    fetched_at: Instant,
    data: Value,
}

#[derive(Default)]
struct Slot {
    entry: Option<Entry>,
}

/// Process-wide cache for upstream documents, shared by all requests.
pub struct UpstreamCache {
    client: reqwest::Client,
    timeout: Duration,
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Slot>>>>,
}

impl UpstreamCache {
    pub fn new(timeout: Duration) -> Self {
        UpstreamCache {
            client: reqwest::Client::new(),
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the document at `url`, fetching it unless a cached copy is
    /// younger than `ttl`. Callers own the freshness policy; different call
    /// sites may pass different TTLs against the same cache.
    pub async fn get(&self, url: &str, ttl: Duration) -> Result<Value, BrokerError> {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(url.to_string()).or_default().clone()
        };

        // Per-URL critical section: callers that miss together wait here and
        // reuse the first fetch instead of stampeding upstream.
        let mut slot = slot.lock().await;

        if let Some(entry) = &slot.entry {
            if entry.fetched_at.elapsed() <= ttl {
                counter!(UPSTREAM_CACHE_HIT).increment(1);
                return Ok(entry.data.clone());
            }
        }
        counter!(UPSTREAM_CACHE_MISS).increment(1);

        let started = Instant::now();
        match self.fetch(url).await {
            Ok(data) => {
                histogram!(UPSTREAM_FETCH_DURATION).record(started.elapsed().as_secs_f64());
                slot.entry = Some(Entry {
                    fetched_at: Instant::now(),
                    data: data.clone(),
                });
                Ok(data)
            }
            Err(err) => {
                counter!(UPSTREAM_REFRESH_FAILURE).increment(1);
                tracing::error!(url, error = %err, "upstream template fetch failed");
                Err(err)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Value, BrokerError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_fetch_error)?;

        if !response.status().is_success() {
            return Err(BrokerError::UpstreamUnavailable(format!(
                "unexpected status {} from {url}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BrokerError::UpstreamUnavailable(e.to_string()))
    }
}

fn classify_fetch_error(err: reqwest::Error) -> BrokerError {
    if err.is_timeout() {
        BrokerError::Timeout(format!("upstream template fetch: {err}"))
    } else {
        BrokerError::UpstreamUnavailable(err.to_string())
    }
}
