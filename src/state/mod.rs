//! Per-domain admission state
//!
//! - `DomainState`: limits, in-flight count, backoff and circuit for one domain
//! - `DomainStats`: serializable snapshot of a `DomainState`

mod domain_state;

pub use domain_state::{Admission, DomainState, DomainStats, WaitReason, CONCURRENCY_POLL};
