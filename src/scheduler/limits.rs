use crate::config::{CircuitBreakerSettings, Config};
use crate::url::DomainTable;
use crate::FetchError;
use std::time::Duration;

/// Process-wide failure handling thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub fail_threshold: u32,
    pub open_duration: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Ceiling on a single `acquire_with_wait` call
    pub max_admission_wait: Duration,
}

impl CircuitBreakerConfig {
    pub fn from_settings(settings: &CircuitBreakerSettings) -> Self {
        Self {
            fail_threshold: settings.fail_threshold,
            open_duration: Duration::from_millis(settings.open_duration_ms),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            max_admission_wait: Duration::from_millis(settings.max_admission_wait_ms),
        }
    }

    /// Returns a copy with the update applied, or an error naming the bad field
    pub fn apply(&self, update: &CircuitBreakerUpdate) -> Result<Self, FetchError> {
        let mut next = *self;

        if let Some(threshold) = update.fail_threshold {
            if threshold == 0 {
                return Err(FetchError::InvalidLimit(
                    "fail_threshold must be >= 1".to_string(),
                ));
            }
            next.fail_threshold = threshold;
        }

        for (name, value, slot) in [
            ("open_duration", update.open_duration, &mut next.open_duration),
            ("initial_backoff", update.initial_backoff, &mut next.initial_backoff),
            ("max_backoff", update.max_backoff, &mut next.max_backoff),
            (
                "max_admission_wait",
                update.max_admission_wait,
                &mut next.max_admission_wait,
            ),
        ] {
            if let Some(value) = value {
                if value.is_zero() {
                    return Err(FetchError::InvalidLimit(format!("{} must be > 0", name)));
                }
                *slot = value;
            }
        }

        if next.initial_backoff > next.max_backoff {
            return Err(FetchError::InvalidLimit(format!(
                "initial_backoff ({:?}) cannot exceed max_backoff ({:?})",
                next.initial_backoff, next.max_backoff
            )));
        }

        Ok(next)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from_settings(&CircuitBreakerSettings::default())
    }
}

/// Partial update for [`CircuitBreakerConfig`]; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerUpdate {
    pub fail_threshold: Option<u32>,
    pub open_duration: Option<Duration>,
    pub initial_backoff: Option<Duration>,
    pub max_backoff: Option<Duration>,
    pub max_admission_wait: Option<Duration>,
}

/// Effective limits for one domain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainLimit {
    pub max_concurrent: u32,
    pub rate_per_second: f64,
}

impl DomainLimit {
    pub fn new(max_concurrent: u32, rate_per_second: f64) -> Result<Self, FetchError> {
        validate_max_concurrent(max_concurrent)?;
        validate_rate(rate_per_second)?;
        Ok(Self {
            max_concurrent,
            rate_per_second,
        })
    }

    pub fn apply(&self, update: &DomainLimitUpdate) -> Result<Self, FetchError> {
        Self::new(
            update.max_concurrent.unwrap_or(self.max_concurrent),
            update.rate_per_second.unwrap_or(self.rate_per_second),
        )
    }
}

impl Default for DomainLimit {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            rate_per_second: 1.0,
        }
    }
}

/// Partial update for a domain's limits; `None` keeps the current value
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainLimitUpdate {
    pub max_concurrent: Option<u32>,
    pub rate_per_second: Option<f64>,
}

impl DomainLimitUpdate {
    pub fn rps(rate_per_second: f64) -> Self {
        Self {
            max_concurrent: None,
            rate_per_second: Some(rate_per_second),
        }
    }

    pub fn concurrency(max_concurrent: u32) -> Self {
        Self {
            max_concurrent: Some(max_concurrent),
            rate_per_second: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max_concurrent.is_none() && self.rate_per_second.is_none()
    }
}

/// Static limit table: `[[domain-limit]]` patterns over scheduler defaults
#[derive(Debug, Clone, Default)]
pub struct LimitTable {
    defaults: DomainLimit,
    overrides: DomainTable<DomainLimitUpdate>,
}

impl LimitTable {
    pub fn new(defaults: DomainLimit) -> Self {
        Self {
            defaults,
            overrides: DomainTable::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let defaults = DomainLimit::new(
            config.scheduler.default_max_concurrent,
            config.scheduler.default_rps,
        )?;

        let mut table = Self::new(defaults);
        for entry in &config.domain_limits {
            table.insert(
                &entry.domain,
                DomainLimitUpdate {
                    max_concurrent: entry.max_concurrent,
                    rate_per_second: entry.rps,
                },
            )?;
        }
        Ok(table)
    }

    /// Adds a pattern override, validated against the defaults
    pub fn insert(&mut self, pattern: &str, update: DomainLimitUpdate) -> Result<(), FetchError> {
        self.defaults.apply(&update)?;
        self.overrides.insert(pattern, update);
        Ok(())
    }

    pub fn defaults(&self) -> DomainLimit {
        self.defaults
    }

    /// Limits for a normalized domain
    pub fn limit_for(&self, domain: &str) -> DomainLimit {
        self.overrides
            .lookup(domain)
            .and_then(|update| self.defaults.apply(update).ok())
            .unwrap_or(self.defaults)
    }
}

fn validate_max_concurrent(value: u32) -> Result<(), FetchError> {
    if value == 0 {
        return Err(FetchError::InvalidLimit(
            "max_concurrent must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_rate(value: f64) -> Result<(), FetchError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FetchError::InvalidLimit(format!(
            "rate_per_second must be a positive finite number, got {}",
            value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_limit_validation() {
        assert!(DomainLimit::new(1, 0.5).is_ok());
        assert!(DomainLimit::new(0, 1.0).is_err());
        assert!(DomainLimit::new(1, 0.0).is_err());
        assert!(DomainLimit::new(1, -2.0).is_err());
        assert!(DomainLimit::new(1, f64::NAN).is_err());
        assert!(DomainLimit::new(1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_partial_update() {
        let limit = DomainLimit::new(4, 2.0).unwrap();
        let next = limit.apply(&DomainLimitUpdate::rps(0.25)).unwrap();
        assert_eq!(next.max_concurrent, 4);
        assert_eq!(next.rate_per_second, 0.25);
    }

    #[test]
    fn test_limit_table_lookup() {
        let mut table = LimitTable::new(DomainLimit::default());
        table
            .insert("*.slow.org", DomainLimitUpdate::rps(0.2))
            .unwrap();
        table
            .insert("api.slow.org", DomainLimitUpdate::concurrency(8))
            .unwrap();

        assert_eq!(table.limit_for("news.slow.org").rate_per_second, 0.2);
        assert_eq!(table.limit_for("api.slow.org").max_concurrent, 8);
        assert_eq!(table.limit_for("api.slow.org").rate_per_second, 1.0);
        assert_eq!(table.limit_for("fast.com"), DomainLimit::default());
        assert!(table
            .insert("bad.org", DomainLimitUpdate::concurrency(0))
            .is_err());
    }

    #[test]
    fn test_circuit_breaker_update() {
        let config = CircuitBreakerConfig::default();
        let next = config
            .apply(&CircuitBreakerUpdate {
                fail_threshold: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(next.fail_threshold, 3);
        assert_eq!(next.open_duration, config.open_duration);

        assert!(config
            .apply(&CircuitBreakerUpdate {
                fail_threshold: Some(0),
                ..Default::default()
            })
            .is_err());
        assert!(config
            .apply(&CircuitBreakerUpdate {
                max_admission_wait: Some(Duration::ZERO),
                ..Default::default()
            })
            .is_err());
        assert!(config
            .apply(&CircuitBreakerUpdate {
                initial_backoff: Some(Duration::from_secs(120)),
                ..Default::default()
            })
            .is_err());
    }
}
