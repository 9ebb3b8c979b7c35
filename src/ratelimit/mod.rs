//! Per-provider token-bucket rate limiting (C1).
//!
//! Wraps [`governor::RateLimiter`] keyed by provider name, matching its
//! existing use in the TMDB adapter. On top of the steady-state bucket this
//! module layers reactive backoff: a provider that returns HTTP 429 has its
//! limiter suspended for `max(retry_after, base * 2^consecutive_429)` up to a
//! configured ceiling, and one successful call resets the exponent.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use governor::{Quota, RateLimiter as GovernorLimiter};
use mediarch_common::{Error, JobPriority, Result};
use tracing::{debug, warn};

type InnerLimiter =
    GovernorLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// A declared rate limit: `requests` per `window`.
#[derive(Debug, Clone, Copy)]
pub struct Quota2 {
    pub requests: u32,
    pub window: Duration,
}

struct ProviderState {
    limiter: InnerLimiter,
    /// Reduced-capacity bucket used by non-interactive (background) callers
    /// only, so they can never consume the full bucket and starve out the
    /// fraction of capacity reserved for interactive callers.
    background_limiter: InnerLimiter,
    suspended_until: Option<Instant>,
    consecutive_429s: u32,
}

/// Gate that enforces a declared per-provider rate limit plus reactive
/// backoff after 429 responses. One instance is shared across all workers
/// calling a given provider.
pub struct RateLimiter {
    base_backoff: Duration,
    ceiling: Duration,
    /// Fraction of a provider's bucket capacity held back for interactive
    /// (webhook/user-triggered) requests; background callers are capped to
    /// the remaining `1.0 - webhook_reserved` of declared capacity.
    webhook_reserved: f64,
    providers: Mutex<HashMap<String, ProviderState>>,
}

impl RateLimiter {
    pub fn new(ceiling: Duration) -> Self {
        Self::with_webhook_reserved(ceiling, 0.1)
    }

    pub fn with_webhook_reserved(ceiling: Duration, webhook_reserved: f64) -> Self {
        Self {
            base_backoff: Duration::from_secs(1),
            ceiling,
            webhook_reserved: webhook_reserved.clamp(0.0, 0.9),
            providers: Mutex::new(HashMap::new()),
        }
    }

    fn quota_to_governor(requests: u32, window: Duration) -> Quota {
        let per_window = NonZeroU32::new(requests.max(1)).unwrap();
        Quota::with_period(window / requests.max(1))
            .unwrap_or_else(|| Quota::per_second(per_window))
            .allow_burst(per_window)
    }

    /// Register a provider's declared limit. Calling this again for a
    /// provider that already has a bucket replaces it (used when provider
    /// config is reloaded). A second bucket, sized to `requests * (1.0 -
    /// webhook_reserved)`, is built alongside it for background callers so
    /// the reserved fraction is never available to them.
    pub fn register(&self, provider: &str, quota: Quota2) {
        let limiter = GovernorLimiter::direct(Self::quota_to_governor(quota.requests, quota.window));

        let background_requests = ((quota.requests as f64) * (1.0 - self.webhook_reserved)).floor().max(1.0) as u32;
        let background_limiter = GovernorLimiter::direct(Self::quota_to_governor(background_requests, quota.window));

        let mut providers = self.providers.lock().unwrap();
        providers.insert(
            provider.to_string(),
            ProviderState {
                limiter,
                background_limiter,
                suspended_until: None,
                consecutive_429s: 0,
            },
        );
    }

    /// Block until a token is available for `provider`, observing both the
    /// steady-state bucket and any active reactive-backoff suspension.
    /// Interactive priorities draw from the full bucket; background
    /// priorities draw from the reduced bucket so they can never spend the
    /// fraction of capacity reserved for interactive callers.
    pub async fn acquire(&self, provider: &str, priority: JobPriority) -> Result<()> {
        loop {
            let wait = {
                let providers = self.providers.lock().unwrap();
                let state = providers
                    .get(provider)
                    .ok_or_else(|| Error::internal(format!("provider '{provider}' not registered with rate limiter")))?;
                state.suspended_until.map(|until| until.saturating_duration_since(Instant::now()))
            };

            if let Some(wait) = wait {
                if !wait.is_zero() {
                    debug!(provider, priority = ?priority, wait_ms = wait.as_millis(), "rate limiter backoff wait");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }

            let providers = self.providers.lock().unwrap();
            let state = providers
                .get(provider)
                .ok_or_else(|| Error::internal(format!("provider '{provider}' not registered with rate limiter")))?;
            if priority.is_interactive() {
                state.limiter.until_ready().await;
            } else {
                state.background_limiter.until_ready().await;
            }
            return Ok(());
        }
    }

    /// Record an HTTP 429 response, suspending the provider's limiter.
    pub fn record_rate_limited(&self, provider: &str, retry_after: Option<Duration>) {
        let mut providers = self.providers.lock().unwrap();
        let Some(state) = providers.get_mut(provider) else {
            return;
        };

        state.consecutive_429s += 1;
        let exponential = self.base_backoff * 2u32.saturating_pow(state.consecutive_429s.min(16));
        let delay = retry_after.unwrap_or(exponential).min(self.ceiling).max(exponential.min(self.ceiling));
        let delay = delay.min(self.ceiling);

        warn!(provider, consecutive_429s = state.consecutive_429s, delay_secs = delay.as_secs(), "provider rate-limited, backing off");
        state.suspended_until = Some(Instant::now() + delay);
    }

    /// Record a successful call, resetting the 429 exponent.
    pub fn record_success(&self, provider: &str) {
        let mut providers = self.providers.lock().unwrap();
        if let Some(state) = providers.get_mut(provider) {
            state.consecutive_429s = 0;
        }
    }
}
