use super::DomainSlot;
use std::fmt;
use std::sync::Arc;

/// An admission permit for one domain
///
/// Returned by [`DomainScheduler::acquire_with_wait`](super::DomainScheduler::acquire_with_wait).
/// Dropping the permit releases it and wakes one waiter, so every exit
/// path of a fetch returns its permit.
pub struct DomainPermit {
    domain: String,
    slot: Arc<DomainSlot>,
}

impl DomainPermit {
    pub(super) fn new(domain: String, slot: Arc<DomainSlot>) -> Self {
        Self { domain, slot }
    }

    /// The normalized domain this permit was granted for
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Releases the permit now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for DomainPermit {
    fn drop(&mut self) {
        self.slot.release();
        tracing::trace!("Released permit for {}", self.domain);
    }
}

impl fmt::Debug for DomainPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainPermit")
            .field("domain", &self.domain)
            .finish()
    }
}
