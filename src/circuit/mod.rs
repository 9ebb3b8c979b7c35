//! Per-provider circuit breaker (C2).
//!
//! `closed -> open -> half-open -> closed`. A provider trips to `open` after
//! `failure_threshold` consecutive failures; while open, calls fail fast with
//! [`Error::CircuitOpen`]. After `reset_timeout` elapses a single probe is let
//! through (`half-open`): success closes the circuit and resets the counter,
//! failure reopens it. Counters are process-local, matching the existing
//! in-memory rate limiter rather than a database-backed scheme.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mediarch_common::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct ProviderCircuit {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Set the instant a single caller is admitted as the half-open probe;
    /// cleared again on `record_success`/`record_failure`. Guards against
    /// every concurrent caller passing as "the probe" while one is already
    /// outstanding.
    probe_in_flight: bool,
}

impl ProviderCircuit {
    fn new() -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Tracks one circuit per provider name.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    providers: Mutex<HashMap<String, ProviderCircuit>>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a call to `provider` is currently permitted. Transitions
    /// `open -> half-open` as a side effect once `reset_timeout` has elapsed,
    /// admitting exactly one caller as the probe; every other concurrent
    /// caller fails fast until that probe's outcome is recorded.
    pub fn check(&self, provider: &str) -> Result<()> {
        let mut providers = self.providers.lock().unwrap();
        let circuit = providers.entry(provider.to_string()).or_insert_with(ProviderCircuit::new);

        match circuit.state {
            State::Closed => Ok(()),
            State::HalfOpen => {
                if circuit.probe_in_flight {
                    Err(Error::CircuitOpen {
                        provider: provider.to_string(),
                    })
                } else {
                    circuit.probe_in_flight = true;
                    Ok(())
                }
            }
            State::Open => {
                let opened_at = circuit.opened_at.expect("open circuit always has opened_at");
                if opened_at.elapsed() >= self.reset_timeout {
                    circuit.state = State::HalfOpen;
                    circuit.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(Error::CircuitOpen {
                        provider: provider.to_string(),
                    })
                }
            }
        }
    }

    /// Record a successful call: closes the circuit and clears the failure count.
    pub fn record_success(&self, provider: &str) {
        let mut providers = self.providers.lock().unwrap();
        let circuit = providers.entry(provider.to_string()).or_insert_with(ProviderCircuit::new);
        circuit.state = State::Closed;
        circuit.consecutive_failures = 0;
        circuit.opened_at = None;
        circuit.probe_in_flight = false;
    }

    /// Record a failed call. From `half-open` this reopens immediately; from
    /// `closed` it trips open once `failure_threshold` is reached.
    pub fn record_failure(&self, provider: &str) {
        let mut providers = self.providers.lock().unwrap();
        let circuit = providers.entry(provider.to_string()).or_insert_with(ProviderCircuit::new);

        match circuit.state {
            State::HalfOpen => {
                circuit.state = State::Open;
                circuit.opened_at = Some(Instant::now());
                circuit.probe_in_flight = false;
            }
            State::Closed | State::Open => {
                circuit.consecutive_failures += 1;
                if circuit.consecutive_failures >= self.failure_threshold {
                    circuit.state = State::Open;
                    circuit.opened_at = Some(Instant::now());
                }
            }
        }
    }

    /// True if `provider` is currently open (fast-failing).
    pub fn is_open(&self, provider: &str) -> bool {
        let providers = self.providers.lock().unwrap();
        matches!(providers.get(provider), Some(c) if c.state == State::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_by_default() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(300));
        assert!(breaker.check("tmdb").is_ok());
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(300));
        for _ in 0..3 {
            breaker.record_failure("tmdb");
        }
        assert!(breaker.is_open("tmdb"));
        assert!(matches!(breaker.check("tmdb"), Err(Error::CircuitOpen { .. })));
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(300));
        for _ in 0..4 {
            breaker.record_failure("tmdb");
        }
        assert!(!breaker.is_open("tmdb"));
        assert!(breaker.check("tmdb").is_ok());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(300));
        breaker.record_failure("tmdb");
        breaker.record_failure("tmdb");
        breaker.record_success("tmdb");
        breaker.record_failure("tmdb");
        assert!(!breaker.is_open("tmdb"));
    }

    #[test]
    fn half_open_after_reset_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure("tmdb");
        assert!(breaker.is_open("tmdb"));

        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.check("tmdb").is_ok());

        breaker.record_success("tmdb");
        assert!(!breaker.is_open("tmdb"));
        assert!(breaker.check("tmdb").is_ok());
    }

    #[test]
    fn half_open_admits_only_one_concurrent_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure("tmdb");
        std::thread::sleep(Duration::from_millis(20));

        assert!(breaker.check("tmdb").is_ok(), "first caller after the timeout is the probe");
        assert!(
            matches!(breaker.check("tmdb"), Err(Error::CircuitOpen { .. })),
            "a second concurrent caller must not also be admitted as a probe"
        );

        breaker.record_success("tmdb");
        assert!(breaker.check("tmdb").is_ok(), "circuit is closed again after the probe succeeds");
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure("tmdb");
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.check("tmdb").is_ok());

        breaker.record_failure("tmdb");
        assert!(breaker.is_open("tmdb"));
    }

    #[test]
    fn independent_providers_have_independent_circuits() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(300));
        breaker.record_failure("tmdb");
        assert!(breaker.is_open("tmdb"));
        assert!(!breaker.is_open("tvdb"));
        assert!(breaker.check("tvdb").is_ok());
    }
}
