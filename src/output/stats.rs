//! Scheduler and backend status display

use crate::backend::BackendHealth;
use crate::state::DomainStats;

/// Aggregate over every tracked domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerSummary {
    pub domains: usize,
    pub total_permits: u64,
    pub total_failures: u64,
    pub open_circuits: Vec<String>,
    pub backing_off: Vec<String>,
}

impl SchedulerSummary {
    pub fn from_stats(stats: &[DomainStats]) -> Self {
        let mut summary = Self {
            domains: stats.len(),
            ..Self::default()
        };

        for domain in stats {
            summary.total_permits += domain.total_permits;
            summary.total_failures += domain.total_failures;
            if domain.circuit_open {
                summary.open_circuits.push(domain.domain.clone());
            } else if domain.backoff_remaining_ms > 0 {
                summary.backing_off.push(domain.domain.clone());
            }
        }

        summary
    }
}

/// Prints per-domain scheduler state to stdout
///
/// # Arguments
///
/// * `stats` - Snapshots from `DomainScheduler::stats`
pub fn print_domain_stats(stats: &[DomainStats]) {
    println!("=== Domain Scheduler ===\n");

    if stats.is_empty() {
        println!("  (no domains contacted)");
        return;
    }

    println!(
        "  {:<32} {:>6} {:>8} {:>7} {:>6} {:>9}  {}",
        "DOMAIN", "ACTIVE", "RPS", "PERMITS", "FAILS", "BACKOFF", "CIRCUIT"
    );
    for domain in stats {
        let circuit = if domain.circuit_open {
            format!("open ({}s)", domain.circuit_remaining_ms / 1000)
        } else {
            "closed".to_string()
        };
        println!(
            "  {:<32} {:>3}/{:<2} {:>8.2} {:>7} {:>6} {:>7}ms  {}",
            domain.domain,
            domain.active_requests,
            domain.max_concurrent,
            domain.rate_per_second,
            domain.total_permits,
            domain.fail_count,
            domain.backoff_remaining_ms,
            circuit
        );
    }

    let summary = SchedulerSummary::from_stats(stats);
    println!();
    println!(
        "  {} domains, {} permits granted, {} failures reported",
        summary.domains, summary.total_permits, summary.total_failures
    );
    if !summary.open_circuits.is_empty() {
        println!("  Open circuits: {}", summary.open_circuits.join(", "));
    }
    if !summary.backing_off.is_empty() {
        println!("  Backing off: {}", summary.backing_off.join(", "));
    }
}

/// Prints one line per backend health check
pub fn print_health(health: &[BackendHealth]) {
    println!("=== Backend Health ===\n");

    for backend in health {
        let mark = if backend.available { "✓" } else { "✗" };
        match backend.running {
            Some(running) => println!(
                "  {} {:<8} {} (running: {})",
                mark, backend.strategy, backend.status, running
            ),
            None => println!("  {} {:<8} {}", mark, backend.strategy, backend.status),
        }
    }
}
