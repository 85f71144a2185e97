use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

/// Process-wide counters shared by the pipeline and the admin control plane.
#[derive(Debug)]
pub struct GlobalStats {
    files_processed: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
    maintenance: AtomicBool,
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalStats {
    pub fn new() -> Self {
        Self {
            files_processed: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
            maintenance: AtomicBool::new(false),
        }
    }

    pub fn record_processed(&self) -> u64 {
        self.files_processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed.load(Ordering::SeqCst)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn maintenance(&self) -> bool {
        self.maintenance.load(Ordering::SeqCst)
    }

    /// Returns the previous value.
    pub fn set_maintenance(&self, on: bool) -> bool {
        self.maintenance.swap(on, Ordering::SeqCst)
    }
}
