//! Per-worker circuit breaker. Counters are process-wide (one breaker
//! per worker name, shared across concurrent workflow runs) and updated
//! atomically.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    failure_count: AtomicU32,
    failure_threshold: u32,
    recovery_timeout: Duration,
    opened_at_millis: AtomicU64,
    half_open_probe_in_flight: AtomicBool,
}

/// A single worker's breaker. Cheap to clone (shares the inner counters).
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                failure_count: AtomicU32::new(0),
                failure_threshold,
                recovery_timeout,
                opened_at_millis: AtomicU64::new(0),
                half_open_probe_in_flight: AtomicBool::new(false),
            }),
        }
    }

    fn is_open_now(&self) -> Option<CircuitState> {
        let opened_at = self.inner.opened_at_millis.load(Ordering::Acquire);
        if opened_at == 0 {
            return None;
        }
        let elapsed = Instant::now()
            .duration_since(epoch_instant())
            .as_millis()
            .saturating_sub(opened_at as u128);
        if elapsed as u128 >= self.inner.recovery_timeout.as_millis() {
            Some(CircuitState::HalfOpen)
        } else {
            Some(CircuitState::Open)
        }
    }

    /// Call before attempting the transport. Returns an error without
    /// touching the transport if the circuit is open; grants exactly
    /// one in-flight probe when half-open.
    pub fn guard(&self, worker: &str) -> Result<CircuitGuard<'_>, WorkflowError> {
        match self.is_open_now() {
            None => Ok(CircuitGuard { breaker: self, probe: false }),
            Some(CircuitState::Open) => Err(WorkflowError::WorkerUnavailable {
                worker: worker.to_string(),
                reason: "circuit breaker open".to_string(),
            }),
            Some(CircuitState::HalfOpen) => {
                if self
                    .inner
                    .half_open_probe_in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    Ok(CircuitGuard { breaker: self, probe: true })
                } else {
                    Err(WorkflowError::WorkerUnavailable {
                        worker: worker.to_string(),
                        reason: "circuit breaker half-open probe in flight".to_string(),
                    })
                }
            }
            Some(CircuitState::Closed) => unreachable!(),
        }
    }

    fn record_success(&self) {
        self.inner.failure_count.store(0, Ordering::Release);
        self.inner.opened_at_millis.store(0, Ordering::Release);
        self.inner.half_open_probe_in_flight.store(false, Ordering::Release);
    }

    fn record_failure(&self) {
        let count = self.inner.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if count >= self.inner.failure_threshold {
            let now = Instant::now().duration_since(epoch_instant()).as_millis() as u64;
            self.inner.opened_at_millis.store(now, Ordering::Release);
        }
        self.inner.half_open_probe_in_flight.store(false, Ordering::Release);
    }

    pub fn state(&self) -> CircuitState {
        self.is_open_now().unwrap_or(CircuitState::Closed)
    }
}

/// Held for the duration of one call; reports the outcome back to the breaker on drop-free completion.
pub struct CircuitGuard<'a> {
    breaker: &'a CircuitBreaker,
    #[allow(dead_code)]
    probe: bool,
}

impl<'a> CircuitGuard<'a> {
    pub fn on_success(self) {
        self.breaker.record_success();
    }

    pub fn on_failure(self) {
        self.breaker.record_failure();
    }
}

// A fixed reference point so we can store elapsed-millis in an AtomicU64
// instead of an `Instant` (which isn't atomically storable).
fn epoch_instant() -> Instant {
    static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Process-wide registry of per-worker breakers.
#[derive(Clone, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<DashMap<String, CircuitBreaker>>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            failure_threshold,
            recovery_timeout,
        }
    }

    pub fn get(&self, worker: &str) -> CircuitBreaker {
        self.breakers
            .entry(worker.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.failure_threshold, self.recovery_timeout))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(5, Duration::from_secs(60));
        for _ in 0..4 {
            let guard = breaker.guard("writer").unwrap();
            guard.on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        let guard = breaker.guard("writer").unwrap();
        guard.on_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.guard("writer").is_err());
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            breaker.guard("w").unwrap().on_failure();
        }
        breaker.guard("w").unwrap().on_success();
        for _ in 0..2 {
            breaker.guard("w").unwrap().on_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_grants_a_single_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(0));
        breaker.guard("w").unwrap().on_failure();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let first = breaker.guard("w");
        assert!(first.is_ok());
        // A second concurrent caller must be rejected while the probe is in flight.
        let second = breaker.guard("w");
        assert!(second.is_err());
    }
}
