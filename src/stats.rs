use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics collected while decoding a dump, shared across decode workers
#[derive(Default, Debug)]
pub struct ReadStats {
    pub entities_read: AtomicU64,
    pub claims_read: AtomicU64,
    pub claims_dropped: AtomicU64,
    pub snaks_dropped: AtomicU64,
    pub records_skipped: AtomicU64,
}

impl ReadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_entities(&self) {
        self.entities_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_claims(&self, count: u64) {
        self.claims_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_claims_dropped(&self) {
        self.claims_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snaks_dropped(&self) {
        self.snaks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_records_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entities(&self) -> u64 {
        self.entities_read.load(Ordering::Relaxed)
    }

    pub fn claims(&self) -> u64 {
        self.claims_read.load(Ordering::Relaxed)
    }

    pub fn claims_dropped(&self) -> u64 {
        self.claims_dropped.load(Ordering::Relaxed)
    }

    pub fn snaks_dropped(&self) -> u64 {
        self.snaks_dropped.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }
}
