//! Per-domain admission control
//!
//! The [`DomainScheduler`] is the one piece of shared mutable state in the
//! crate. It enforces, independently for every domain:
//! - a concurrency cap (in-flight permits)
//! - a request-rate cap (minimum interval between permits)
//! - exponential backoff after failures
//! - a circuit breaker that rejects all work after repeated failures
//!
//! # Locking
//!
//! The domain map sits behind an `RwLock`; each domain has its own `Mutex`
//! so that domains never contend with each other. No lock is held across
//! an `.await`. Waiters blocked on the concurrency cap park on a per-domain
//! `Notify` and are woken by releases; rate and backoff waits are plain
//! timer sleeps.

mod limits;
mod permit;

pub use limits::{
    CircuitBreakerConfig, CircuitBreakerUpdate, DomainLimit, DomainLimitUpdate, LimitTable,
};
pub use permit::DomainPermit;

use crate::config::Config;
use crate::state::{Admission, DomainState, DomainStats, WaitReason};
use crate::url::normalize_host;
use crate::FetchError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Instant};

/// One domain's state plus its wake-up signal
pub(crate) struct DomainSlot {
    state: Mutex<DomainState>,
    released: Notify,
}

impl DomainSlot {
    fn new(limit: DomainLimit) -> Self {
        Self {
            state: Mutex::new(DomainState::new(limit.max_concurrent, limit.rate_per_second)),
            released: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DomainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn release(&self) {
        self.lock().release();
        self.released.notify_one();
    }
}

/// Domain-aware admission controller shared by every fetch
///
/// Construct one per process and pass it by `Arc` to every caller.
/// All methods take `&self` and are safe to call while fetches are in
/// flight, including the runtime reconfiguration setters.
pub struct DomainScheduler {
    domains: RwLock<HashMap<String, Arc<DomainSlot>>>,
    limits: LimitTable,
    circuit: RwLock<CircuitBreakerConfig>,
}

impl DomainScheduler {
    /// Creates a scheduler with a static limit table and breaker config
    pub fn new(limits: LimitTable, circuit: CircuitBreakerConfig) -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            limits,
            circuit: RwLock::new(circuit),
        }
    }

    /// Builds the scheduler from `[scheduler]`, `[[domain-limit]]` and
    /// `[circuit-breaker]` sections
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(
            LimitTable::from_config(config)?,
            CircuitBreakerConfig::from_settings(&config.circuit_breaker),
        ))
    }

    /// Current breaker thresholds
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        *self.circuit.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn existing_slot(&self, domain: &str) -> Option<Arc<DomainSlot>> {
        self.domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(domain)
            .cloned()
    }

    /// Normalizes the domain and returns its slot, creating it lazily
    fn slot(&self, domain: &str) -> (String, Arc<DomainSlot>) {
        let key = normalize_host(domain);

        if let Some(slot) = self.existing_slot(&key) {
            return (key, slot);
        }

        let mut domains = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        let slot = domains
            .entry(key.clone())
            .or_insert_with(|| {
                let limit = self.limits.limit_for(&key);
                tracing::debug!(
                    "Tracking domain {} (max_concurrent={}, rps={})",
                    key,
                    limit.max_concurrent,
                    limit.rate_per_second
                );
                Arc::new(DomainSlot::new(limit))
            })
            .clone();

        (key, slot)
    }

    /// Non-blocking admission check
    ///
    /// # Returns
    ///
    /// * `Duration::ZERO` - A permit was granted; the caller must call
    ///   [`release`](Self::release) when done
    /// * otherwise - Nothing was granted; a suggested wait before retrying
    pub fn acquire(&self, domain: &str) -> Duration {
        let (_, slot) = self.slot(domain);
        let admission = slot.lock().admission(Instant::now());

        match admission {
            Admission::Granted => Duration::ZERO,
            Admission::Wait { duration, .. } => duration,
        }
    }

    /// Waits until a permit can be granted
    ///
    /// # Arguments
    ///
    /// * `domain` - Hostname; normalized before lookup
    /// * `max_wait` - Ceiling on the total wait; defaults to the breaker's
    ///   `max_admission_wait`
    ///
    /// # Errors
    ///
    /// * `FetchError::CircuitOpen` - Returned immediately while the circuit is open
    /// * `FetchError::AdmissionTimeout` - The ceiling was reached, or a known
    ///   rate/backoff wait would exceed it
    pub async fn acquire_with_wait(
        &self,
        domain: &str,
        max_wait: Option<Duration>,
    ) -> Result<DomainPermit, FetchError> {
        let max_wait = max_wait.unwrap_or_else(|| self.circuit_breaker_config().max_admission_wait);
        let (key, slot) = self.slot(domain);
        let started = Instant::now();

        loop {
            let now = Instant::now();
            let admission = slot.lock().admission(now);

            let (wait, reason) = match admission {
                Admission::Granted => {
                    tracing::trace!(
                        "Permit granted for {} after {}ms",
                        key,
                        now.duration_since(started).as_millis()
                    );
                    return Ok(DomainPermit::new(key, slot));
                }
                Admission::Wait { duration, reason } => (duration, reason),
            };

            if reason == WaitReason::CircuitOpen {
                tracing::debug!("Rejecting {}: circuit open for {:?}", key, wait);
                return Err(FetchError::CircuitOpen {
                    domain: key,
                    retry_after_ms: wait.as_millis() as u64,
                });
            }

            let elapsed = now.duration_since(started);
            let remaining = max_wait.saturating_sub(elapsed);
            if remaining.is_zero() || (reason != WaitReason::Concurrency && wait > remaining) {
                tracing::debug!(
                    "Admission timeout for {} after {}ms ({:?} needs {:?})",
                    key,
                    elapsed.as_millis(),
                    reason,
                    wait
                );
                return Err(FetchError::AdmissionTimeout {
                    domain: key,
                    waited_ms: elapsed.as_millis() as u64,
                });
            }

            match reason {
                WaitReason::Concurrency => {
                    // Woken by a release; the timeout covers missed wake-ups
                    let _ = timeout(wait.min(remaining), slot.released.notified()).await;
                }
                _ => sleep(wait).await,
            }
        }
    }

    /// Returns a permit taken with [`acquire`](Self::acquire)
    pub fn release(&self, domain: &str) {
        if let Some(slot) = self.existing_slot(&normalize_host(domain)) {
            slot.release();
        }
    }

    /// Clears the failure streak and backoff; permits are untouched
    pub fn report_success(&self, domain: &str) {
        let (_, slot) = self.slot(domain);
        slot.lock().record_success();
    }

    /// Records a site failure, extending backoff and possibly opening the circuit
    pub fn report_failure(&self, domain: &str) {
        let config = self.circuit_breaker_config();
        let (key, slot) = self.slot(domain);
        let mut state = slot.lock();

        if state.record_failure(Instant::now(), &config) {
            tracing::warn!(
                "Circuit opened for {} after {} consecutive failures ({}s cool-down)",
                key,
                state.fail_count,
                config.open_duration.as_secs()
            );
        } else {
            tracing::debug!(
                "Failure #{} for {}, backing off {}ms",
                state.fail_count,
                key,
                state.backoff_wait(Instant::now()).as_millis()
            );
        }
    }

    /// Whether the circuit is open; an expired circuit is reset here
    pub fn is_circuit_open(&self, domain: &str) -> bool {
        let Some(slot) = self.existing_slot(&normalize_host(domain)) else {
            return false;
        };

        let now = Instant::now();
        let mut state = slot.lock();
        if state.clear_expired_circuit(now) {
            tracing::info!("Circuit closed for {}", normalize_host(domain));
        }
        state.circuit_remaining(now).is_some()
    }

    /// Overrides a domain's limits at runtime
    ///
    /// Invalid values are rejected and leave the current limits untouched.
    /// Raising the cap wakes parked waiters so they can re-check.
    pub fn set_domain_limit(
        &self,
        domain: &str,
        update: DomainLimitUpdate,
    ) -> Result<DomainLimit, FetchError> {
        let (key, slot) = self.slot(domain);

        let next = {
            let mut state = slot.lock();
            let current = DomainLimit {
                max_concurrent: state.max_concurrent,
                rate_per_second: state.rate_per_second,
            };
            let next = current.apply(&update)?;
            state.max_concurrent = next.max_concurrent;
            state.rate_per_second = next.rate_per_second;
            next
        };

        slot.released.notify_waiters();
        tracing::info!(
            "Limits for {} set to max_concurrent={}, rps={}",
            key,
            next.max_concurrent,
            next.rate_per_second
        );

        Ok(next)
    }

    /// Replaces breaker thresholds at runtime; applies to future reports
    pub fn set_circuit_breaker_config(
        &self,
        update: CircuitBreakerUpdate,
    ) -> Result<CircuitBreakerConfig, FetchError> {
        let mut current = self.circuit.write().unwrap_or_else(PoisonError::into_inner);
        let next = current.apply(&update)?;
        *current = next;

        tracing::info!(
            "Circuit breaker: threshold={}, open={}ms, backoff={}..{}ms, max wait={}ms",
            next.fail_threshold,
            next.open_duration.as_millis(),
            next.initial_backoff.as_millis(),
            next.max_backoff.as_millis(),
            next.max_admission_wait.as_millis()
        );

        Ok(next)
    }

    /// Snapshot of one domain, if it has been seen
    pub fn domain_stats(&self, domain: &str) -> Option<DomainStats> {
        let key = normalize_host(domain);
        let slot = self.existing_slot(&key)?;
        let stats = slot.lock().stats(&key, Instant::now());
        Some(stats)
    }

    /// Snapshots of every tracked domain, sorted by domain
    pub fn stats(&self) -> Vec<DomainStats> {
        let now = Instant::now();
        let slots: Vec<(String, Arc<DomainSlot>)> = self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(domain, slot)| (domain.clone(), slot.clone()))
            .collect();

        let mut stats: Vec<DomainStats> = slots
            .iter()
            .map(|(domain, slot)| slot.lock().stats(domain, now))
            .collect();
        stats.sort_by(|a, b| a.domain.cmp(&b.domain));
        stats
    }

    /// Clears failures, backoff and circuit for a domain
    ///
    /// # Returns
    ///
    /// `false` if the domain has never been seen
    pub fn reset(&self, domain: &str) -> bool {
        let key = normalize_host(domain);
        let Some(slot) = self.existing_slot(&key) else {
            return false;
        };

        slot.lock().reset();
        slot.released.notify_waiters();
        tracing::info!("Reset admission state for {}", key);
        true
    }
}

impl Default for DomainScheduler {
    fn default() -> Self {
        Self::new(LimitTable::default(), CircuitBreakerConfig::default())
    }
}
