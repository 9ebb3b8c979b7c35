//! Decorator that wraps rate-limiting, circuit-breaking, and retry around any
//! [`ProviderAdapter`] uniformly, rather than duplicating the TMDB adapter's
//! inline rate-limiter-plus-429-retry loop in every adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mediarch_common::{AssetType, Error, JobPriority, MediaType, Result};
use rand::Rng;
use tracing::warn;

use crate::circuit::CircuitBreaker;
use crate::ratelimit::RateLimiter;

use super::{AssetCandidate, Capabilities, ConnectionTestResult, FetchPriority, MetadataResponse, ProviderAdapter, SearchResult};

/// Wraps a concrete adapter `P` with the uniform call sequence every provider
/// needs: acquire a rate-limit token, check the circuit, call through with
/// retry-on-retryable-error (exponential backoff + jitter), and feed the
/// outcome back into both the limiter and the breaker.
pub struct AdapterHarness<P> {
    inner: P,
    rate_limiter: Arc<RateLimiter>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl<P: ProviderAdapter> AdapterHarness<P> {
    pub fn new(inner: P, rate_limiter: Arc<RateLimiter>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            rate_limiter,
            circuit_breaker,
        }
    }

    fn job_priority(priority: FetchPriority) -> JobPriority {
        match priority {
            FetchPriority::User => JobPriority::USER,
            FetchPriority::Background => JobPriority::BACKGROUND,
        }
    }

    async fn call<T, F, Fut>(&self, priority: FetchPriority, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let name = self.inner.name();
        self.circuit_breaker.check(name)?;

        let mut attempt = 0u32;
        loop {
            self.rate_limiter.acquire(name, Self::job_priority(priority)).await?;

            match op().await {
                Ok(value) => {
                    self.rate_limiter.record_success(name);
                    self.circuit_breaker.record_success(name);
                    return Ok(value);
                }
                Err(err) => {
                    if let Error::RateLimited { retry_after } = &err {
                        self.rate_limiter.record_rate_limited(name, *retry_after);
                    }
                    self.circuit_breaker.record_failure(name);

                    if !err.is_retryable() || attempt >= priority.max_retries() {
                        return Err(err);
                    }

                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                    let jitter_ms = rand::thread_rng().gen_range(0..100);
                    attempt += 1;
                    warn!(provider = name, attempt, error = %err, "retrying provider call");
                    tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
                }
            }
        }
    }
}

#[async_trait]
impl<P: ProviderAdapter> ProviderAdapter for AdapterHarness<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn search(
        &self,
        query: &str,
        year: Option<u16>,
        entity_kind: MediaType,
        priority: FetchPriority,
    ) -> Result<Vec<SearchResult>> {
        self.call(priority, || self.inner.search(query, year, entity_kind, priority)).await
    }

    async fn get_metadata(
        &self,
        provider_result_id: &str,
        entity_kind: MediaType,
        priority: FetchPriority,
    ) -> Result<MetadataResponse> {
        self.call(priority, || self.inner.get_metadata(provider_result_id, entity_kind, priority))
            .await
    }

    async fn get_assets(
        &self,
        provider_result_id: &str,
        entity_kind: MediaType,
        asset_types: &[AssetType],
        priority: FetchPriority,
    ) -> Result<Vec<AssetCandidate>> {
        self.call(priority, || self.inner.get_assets(provider_result_id, entity_kind, asset_types, priority))
            .await
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        self.inner.test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyAdapter {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProviderAdapter for FlakyAdapter {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                entity_kinds: vec![MediaType::Movie],
                asset_types: vec![AssetType::Poster],
                metadata_fields: vec![],
                external_id_lookup: vec![],
            }
        }

        async fn search(
            &self,
            _query: &str,
            _year: Option<u16>,
            _entity_kind: MediaType,
            _priority: FetchPriority,
        ) -> Result<Vec<SearchResult>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(Error::ProviderUnavailable {
                    provider: "flaky".into(),
                    message: "timeout".into(),
                })
            } else {
                Ok(vec![])
            }
        }

        async fn get_metadata(
            &self,
            _provider_result_id: &str,
            _entity_kind: MediaType,
            _priority: FetchPriority,
        ) -> Result<MetadataResponse> {
            unimplemented!()
        }

        async fn get_assets(
            &self,
            _provider_result_id: &str,
            _entity_kind: MediaType,
            _asset_types: &[AssetType],
            _priority: FetchPriority,
        ) -> Result<Vec<AssetCandidate>> {
            unimplemented!()
        }

        async fn test_connection(&self) -> ConnectionTestResult {
            ConnectionTestResult {
                ok: true,
                message: "ok".into(),
            }
        }
    }

    fn make_harness(failures_before_success: u32) -> AdapterHarness<FlakyAdapter> {
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs(60)));
        rate_limiter.register("flaky", crate::ratelimit::Quota2 { requests: 100, window: Duration::from_secs(1) });
        let circuit_breaker = Arc::new(CircuitBreaker::new(5, Duration::from_secs(300)));
        AdapterHarness::new(
            FlakyAdapter {
                failures_before_success,
                calls: AtomicU32::new(0),
            },
            rate_limiter,
            circuit_breaker,
        )
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let harness = make_harness(2);
        let result = harness.search("x", None, MediaType::Movie, FetchPriority::Background).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget_exhausted() {
        let harness = make_harness(100);
        let result = harness.search("x", None, MediaType::Movie, FetchPriority::User).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn open_circuit_fails_fast_without_calling_inner() {
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs(60)));
        rate_limiter.register("flaky", crate::ratelimit::Quota2 { requests: 100, window: Duration::from_secs(1) });
        let circuit_breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(300)));
        circuit_breaker.record_failure("flaky");

        let harness = AdapterHarness::new(
            FlakyAdapter {
                failures_before_success: 0,
                calls: AtomicU32::new(0),
            },
            rate_limiter,
            circuit_breaker,
        );

        let result = harness.search("x", None, MediaType::Movie, FetchPriority::User).await;
        assert!(matches!(result, Err(Error::CircuitOpen { .. })));
    }
}
