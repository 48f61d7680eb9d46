use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Run counters shared by the producer and consumers of one strategy.
///
/// Recorded per block on the producer side and once per consumer at
/// completion, never per line, so the atomics stay off the hot path.
#[derive(Debug, Clone, Default)]
pub struct ScanMetrics {
    blocks_produced: Arc<AtomicU64>,
    lines_read: Arc<AtomicU64>,
    matches_found: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one produced block and the number of lines it carries.
    pub fn record_block(&self, lines: usize) {
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
        self.lines_read.fetch_add(lines as u64, Ordering::Relaxed);
    }

    /// Records a consumer's final match count.
    pub fn record_matches(&self, matches: usize) {
        self.matches_found.fetch_add(matches as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanStats {
        ScanStats {
            blocks_produced: self.blocks_produced.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
        }
    }

    /// Logs the current counters.
    pub fn log_stats(&self) {
        let stats = self.snapshot();
        debug!(
            blocks = stats.blocks_produced,
            lines = stats.lines_read,
            matches = stats.matches_found,
            "scan metrics"
        );
    }
}

/// Point-in-time view of [`ScanMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub blocks_produced: u64,
    pub lines_read: u64,
    pub matches_found: u64,
}
