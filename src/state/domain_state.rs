use crate::scheduler::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Poll interval used when a request is blocked only by the concurrency cap
pub const CONCURRENCY_POLL: Duration = Duration::from_millis(100);

/// Longest single wait or deadline offset the state will ever compute
pub const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Which constraint dominates an admission wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitReason {
    Concurrency,
    Rate,
    Backoff,
    CircuitOpen,
}

/// Outcome of one admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A permit was granted and recorded
    Granted,
    /// Nothing was granted; retry after `duration`
    Wait { duration: Duration, reason: WaitReason },
}

/// Admission-control state for one domain
///
/// All methods take the current instant so that tests can drive time
/// explicitly. The scheduler owns one of these per domain behind its own lock.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Maximum in-flight permits
    pub max_concurrent: u32,

    /// Permits per second; fractional values allowed
    pub rate_per_second: f64,

    /// Current in-flight permits
    pub active_requests: u32,

    /// When the last permit was granted
    pub last_permit_at: Option<Instant>,

    /// Consecutive failures since the last success
    pub fail_count: u32,

    /// No permit is granted before this instant
    pub backoff_until: Option<Instant>,

    pub circuit_open: bool,

    pub circuit_open_until: Option<Instant>,

    /// Permits granted over the state's lifetime
    pub total_permits: u64,

    /// Failures reported over the state's lifetime
    pub total_failures: u64,

    /// Wall-clock time of the most recent failure, for reporting
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl DomainState {
    /// Creates a fresh state with the given limits
    pub fn new(max_concurrent: u32, rate_per_second: f64) -> Self {
        Self {
            max_concurrent,
            rate_per_second,
            active_requests: 0,
            last_permit_at: None,
            fail_count: 0,
            backoff_until: None,
            circuit_open: false,
            circuit_open_until: None,
            total_permits: 0,
            total_failures: 0,
            last_failure_at: None,
        }
    }

    /// Minimum spacing between two permits (`1 / rate_per_second`),
    /// capped at [`MAX_DELAY`]
    pub fn min_interval(&self) -> Duration {
        if self.rate_per_second.is_finite() && self.rate_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.rate_per_second)
                .map_or(MAX_DELAY, |interval| interval.min(MAX_DELAY))
        } else {
            Duration::ZERO
        }
    }

    /// Resets an expired circuit
    ///
    /// # Returns
    ///
    /// `true` if the circuit was open and has just been closed
    pub fn clear_expired_circuit(&mut self, now: Instant) -> bool {
        if !self.circuit_open {
            return false;
        }

        match self.circuit_open_until {
            Some(until) if now < until => false,
            _ => {
                self.circuit_open = false;
                self.circuit_open_until = None;
                self.fail_count = 0;
                self.backoff_until = None;
                true
            }
        }
    }

    /// Time left before an open circuit closes, `None` when closed
    pub fn circuit_remaining(&self, now: Instant) -> Option<Duration> {
        if !self.circuit_open {
            return None;
        }
        self.circuit_open_until
            .map(|until| until.saturating_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn concurrency_wait(&self) -> Duration {
        if self.active_requests >= self.max_concurrent {
            CONCURRENCY_POLL
        } else {
            Duration::ZERO
        }
    }

    pub fn rate_wait(&self, now: Instant) -> Duration {
        match self.last_permit_at {
            Some(last) => deadline(last, self.min_interval()).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    pub fn backoff_wait(&self, now: Instant) -> Duration {
        self.backoff_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Tries to grant a permit
    ///
    /// The three constraints are independent, so the wait is the maximum of
    /// all of them and a permit is granted only when every one is satisfied.
    /// An open circuit short-circuits with its remaining duration.
    ///
    /// # Arguments
    ///
    /// * `now` - The current instant
    pub fn admission(&mut self, now: Instant) -> Admission {
        self.clear_expired_circuit(now);

        if let Some(remaining) = self.circuit_remaining(now) {
            return Admission::Wait {
                duration: remaining,
                reason: WaitReason::CircuitOpen,
            };
        }

        let waits = [
            (self.concurrency_wait(), WaitReason::Concurrency),
            (self.rate_wait(now), WaitReason::Rate),
            (self.backoff_wait(now), WaitReason::Backoff),
        ];

        let (duration, reason) = waits
            .into_iter()
            .fold((Duration::ZERO, WaitReason::Concurrency), |acc, w| {
                if w.0 > acc.0 {
                    w
                } else {
                    acc
                }
            });

        if duration.is_zero() {
            self.active_requests += 1;
            self.last_permit_at = Some(now);
            self.total_permits += 1;
            Admission::Granted
        } else {
            Admission::Wait { duration, reason }
        }
    }

    /// Returns one permit (floor 0)
    pub fn release(&mut self) {
        self.active_requests = self.active_requests.saturating_sub(1);
    }

    /// Clears the failure streak and any pending backoff
    pub fn record_success(&mut self) {
        self.fail_count = 0;
        self.backoff_until = None;
    }

    /// Records a failure, extending backoff and possibly opening the circuit
    ///
    /// Backoff is `min(initial * 2^(fail_count - 1), max)` from `now`, and
    /// never moves an existing deadline earlier.
    ///
    /// # Returns
    ///
    /// `true` if this failure opened the circuit
    pub fn record_failure(&mut self, now: Instant, config: &CircuitBreakerConfig) -> bool {
        self.clear_expired_circuit(now);

        self.fail_count = self.fail_count.saturating_add(1);
        self.total_failures += 1;
        self.last_failure_at = Some(Utc::now());

        let backoff = backoff_for(self.fail_count, config);
        let candidate = deadline(now, backoff);
        self.backoff_until = Some(match self.backoff_until {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        });

        if !self.circuit_open && self.fail_count >= config.fail_threshold {
            self.circuit_open = true;
            self.circuit_open_until = Some(deadline(now, config.open_duration));
            return true;
        }

        false
    }

    /// Forgets failures and the circuit
    ///
    /// In-flight permits and the last permit time are kept, so the rate
    /// interval still applies to the next permit.
    pub fn reset(&mut self) {
        self.fail_count = 0;
        self.backoff_until = None;
        self.circuit_open = false;
        self.circuit_open_until = None;
    }

    /// Snapshot for reporting
    pub fn stats(&self, domain: &str, now: Instant) -> DomainStats {
        DomainStats {
            domain: domain.to_string(),
            max_concurrent: self.max_concurrent,
            rate_per_second: self.rate_per_second,
            active_requests: self.active_requests,
            fail_count: self.fail_count,
            circuit_open: self.circuit_remaining(now).is_some(),
            circuit_remaining_ms: self
                .circuit_remaining(now)
                .map_or(0, |d| d.as_millis() as u64),
            backoff_remaining_ms: self.backoff_wait(now).as_millis() as u64,
            total_permits: self.total_permits,
            total_failures: self.total_failures,
            last_failure_at: self.last_failure_at,
        }
    }
}

/// `from + delay`, with the delay capped at [`MAX_DELAY`] and the sum saturating
fn deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay.min(MAX_DELAY)).unwrap_or(from)
}

/// Exponential backoff for the n-th consecutive failure, capped at the maximum
fn backoff_for(fail_count: u32, config: &CircuitBreakerConfig) -> Duration {
    let exponent = fail_count.saturating_sub(1);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    config
        .initial_backoff
        .checked_mul(factor)
        .unwrap_or(config.max_backoff)
        .min(config.max_backoff)
}

/// Serializable per-domain snapshot returned by the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct DomainStats {
    pub domain: String,
    pub max_concurrent: u32,
    pub rate_per_second: f64,
    pub active_requests: u32,
    pub fail_count: u32,
    pub circuit_open: bool,
    pub circuit_remaining_ms: u64,
    pub backoff_remaining_ms: u64,
    pub total_permits: u64,
    pub total_failures: u64,
    pub last_failure_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            fail_threshold: 3,
            open_duration: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            max_admission_wait: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_grant_updates_counters() {
        let now = Instant::now();
        let mut state = DomainState::new(2, 10.0);

        assert_eq!(state.admission(now), Admission::Granted);
        assert_eq!(state.active_requests, 1);
        assert_eq!(state.last_permit_at, Some(now));
        assert_eq!(state.total_permits, 1);
    }

    #[test]
    fn test_concurrency_cap() {
        let now = Instant::now();
        let mut state = DomainState::new(1, 1000.0);

        assert_eq!(state.admission(now), Admission::Granted);
        let later = now + Duration::from_secs(1);
        assert_eq!(
            state.admission(later),
            Admission::Wait {
                duration: CONCURRENCY_POLL,
                reason: WaitReason::Concurrency
            }
        );

        state.release();
        assert_eq!(state.admission(later), Admission::Granted);
    }

    #[test]
    fn test_rate_wait() {
        let now = Instant::now();
        let mut state = DomainState::new(5, 0.5);
        assert_eq!(state.min_interval(), Duration::from_secs(2));

        assert_eq!(state.admission(now), Admission::Granted);
        state.release();

        let later = now + Duration::from_millis(500);
        assert_eq!(
            state.admission(later),
            Admission::Wait {
                duration: Duration::from_millis(1500),
                reason: WaitReason::Rate
            }
        );
        assert_eq!(state.admission(now + Duration::from_secs(2)), Admission::Granted);
    }

    #[test]
    fn test_wait_is_max_of_constraints() {
        let now = Instant::now();
        let mut state = DomainState::new(1, 0.5);
        assert_eq!(state.admission(now), Admission::Granted);

        // Both concurrency and rate block; rate is longer
        match state.admission(now) {
            Admission::Wait { duration, reason } => {
                assert_eq!(duration, Duration::from_secs(2));
                assert_eq!(reason, WaitReason::Rate);
            }
            Admission::Granted => panic!("expected wait"),
        }
        assert_eq!(state.active_requests, 1);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let mut state = DomainState::new(1, 1.0);
        state.release();
        state.release();
        assert_eq!(state.active_requests, 0);
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let cfg = config();
        assert_eq!(backoff_for(1, &cfg), Duration::from_millis(100));
        assert_eq!(backoff_for(2, &cfg), Duration::from_millis(200));
        assert_eq!(backoff_for(4, &cfg), Duration::from_millis(800));
        assert_eq!(backoff_for(5, &cfg), Duration::from_millis(1000));
        assert_eq!(backoff_for(200, &cfg), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_never_moves_earlier() {
        let cfg = CircuitBreakerConfig {
            fail_threshold: 100,
            ..config()
        };
        let now = Instant::now();
        let mut state = DomainState::new(1, 1.0);

        let mut previous = None;
        for i in 0..8 {
            state.record_failure(now + Duration::from_millis(i), &cfg);
            let until = state.backoff_until;
            assert!(until >= previous);
            previous = until;
        }

        // A failure observed with an older clock must not shorten the deadline
        let mut state = DomainState::new(1, 1.0);
        state.record_failure(now + Duration::from_millis(500), &cfg);
        let first = state.backoff_until;
        state.record_failure(now, &cfg);
        assert_eq!(state.backoff_until, first);
    }

    #[test]
    fn test_backoff_blocks_admission() {
        let cfg = config();
        let now = Instant::now();
        let mut state = DomainState::new(1, 1000.0);

        state.record_failure(now, &cfg);
        assert_eq!(
            state.admission(now),
            Admission::Wait {
                duration: Duration::from_millis(100),
                reason: WaitReason::Backoff
            }
        );
        assert_eq!(
            state.admission(now + Duration::from_millis(100)),
            Admission::Granted
        );
    }

    #[test]
    fn test_success_resets_failures() {
        let cfg = config();
        let now = Instant::now();
        let mut state = DomainState::new(1, 1.0);

        state.record_failure(now, &cfg);
        state.record_failure(now, &cfg);
        state.record_success();

        assert_eq!(state.fail_count, 0);
        assert!(state.backoff_until.is_none());
        assert_eq!(state.total_failures, 2);
    }

    #[test]
    fn test_circuit_opens_at_threshold_and_expires() {
        let cfg = config();
        let now = Instant::now();
        let mut state = DomainState::new(1, 1.0);

        assert!(!state.record_failure(now, &cfg));
        assert!(!state.record_failure(now, &cfg));
        assert!(state.record_failure(now, &cfg));
        assert!(state.circuit_open);
        assert_eq!(state.circuit_remaining(now), Some(Duration::from_secs(60)));

        match state.admission(now + Duration::from_secs(1)) {
            Admission::Wait { reason, .. } => assert_eq!(reason, WaitReason::CircuitOpen),
            Admission::Granted => panic!("circuit should reject"),
        }

        let after = now + Duration::from_secs(60);
        assert!(state.clear_expired_circuit(after));
        assert!(!state.circuit_open);
        assert_eq!(state.fail_count, 0);
        assert!(state.backoff_until.is_none());
    }

    #[test]
    fn test_reset_keeps_active_permits() {
        let cfg = config();
        let now = Instant::now();
        let mut state = DomainState::new(2, 1.0);

        assert_eq!(state.admission(now), Admission::Granted);
        for _ in 0..3 {
            state.record_failure(now, &cfg);
        }
        state.reset();

        assert!(!state.circuit_open);
        assert_eq!(state.fail_count, 0);
        assert_eq!(state.active_requests, 1);
    }

    #[test]
    fn test_reset_keeps_rate_interval() {
        let now = Instant::now();
        let mut state = DomainState::new(4, 0.5);

        assert_eq!(state.admission(now), Admission::Granted);
        state.release();
        state.reset();

        assert_eq!(state.last_permit_at, Some(now));
        assert!(matches!(
            state.admission(now + Duration::from_millis(500)),
            Admission::Wait {
                reason: WaitReason::Rate,
                ..
            }
        ));
    }

    #[test]
    fn test_tiny_rate_saturates() {
        let now = Instant::now();
        let mut state = DomainState::new(2, 1e-20);
        assert_eq!(state.min_interval(), MAX_DELAY);

        assert_eq!(state.admission(now), Admission::Granted);
        assert_eq!(
            state.admission(now),
            Admission::Wait {
                duration: MAX_DELAY,
                reason: WaitReason::Rate
            }
        );
    }

    #[test]
    fn test_huge_backoff_and_open_duration_saturate() {
        let cfg = CircuitBreakerConfig {
            fail_threshold: 1,
            open_duration: Duration::from_millis(u64::MAX),
            initial_backoff: Duration::from_millis(u64::MAX),
            max_backoff: Duration::from_millis(u64::MAX),
            max_admission_wait: Duration::from_secs(5),
        };
        let now = Instant::now();
        let mut state = DomainState::new(1, 1.0);

        assert!(state.record_failure(now, &cfg));
        assert_eq!(state.backoff_wait(now), MAX_DELAY);
        assert_eq!(state.circuit_remaining(now), Some(MAX_DELAY));

        // A second failure with the circuit already open must not overflow either
        assert!(!state.record_failure(now, &cfg));
        assert_eq!(state.stats("a.com", now).backoff_remaining_ms, MAX_DELAY.as_millis() as u64);
    }

    #[test]
    fn test_stats_snapshot() {
        let cfg = config();
        let now = Instant::now();
        let mut state = DomainState::new(2, 4.0);
        state.record_failure(now, &cfg);

        let stats = state.stats("a.com", now);
        assert_eq!(stats.domain, "a.com");
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.backoff_remaining_ms, 100);
        assert!(!stats.circuit_open);
        assert!(stats.last_failure_at.is_some());
    }
}
