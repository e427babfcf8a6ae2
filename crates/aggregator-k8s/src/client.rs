//! QPS/burst-capped Kubernetes API client. Spec.md §6 "API client defaults:
//! QPS=5, burst=10" — the same `governor` GCRA limiter used by
//! `aggregator_engine::TokenBucket`'s ingestion path, wrapping `kube::Client`
//! instead of the ingest side.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use kube::Client;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A `kube::Client` with a shared GCRA limiter gating every call the Writer
/// and `KubeStore` make. Cheap to clone — the limiter is behind an `Arc`.
#[derive(Clone)]
pub struct RateLimitedClient {
    client: Client,
    limiter: Arc<Limiter>,
}

impl RateLimitedClient {
    pub fn new(client: Client, qps: u32, burst: u32) -> Self {
        let per_sec = NonZeroU32::new(qps.max(1)).unwrap();
        let burst = NonZeroU32::new(burst.max(1)).unwrap();
        let quota = Quota::per_second(per_sec).allow_burst(burst);
        RateLimitedClient {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the limiter admits the next call. Callers are expected to
    /// `throttle().await` immediately before issuing a `kube::Api` request.
    pub async fn throttle(&self) {
        self.limiter.until_ready().await;
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Build the default in-cluster (or local kubeconfig) client, capped per
/// `EnvConfig::api_client_qps`/`api_client_burst`.
pub async fn build_client(qps: u32, burst: u32) -> anyhow::Result<RateLimitedClient> {
    let client = Client::try_default().await?;
    Ok(RateLimitedClient::new(client, qps, burst))
}
