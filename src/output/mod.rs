//! Human-readable output for the command-line interface

mod report;
mod stats;

pub use report::{
    print_batch, print_discovery_report, print_fetch_result, print_raw_result, BatchSummary,
};
pub use stats::{print_domain_stats, print_health, SchedulerSummary};
