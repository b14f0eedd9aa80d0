//! Run-wide counters and the end-of-run summary.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::contract::{ConversionOutcome, ConversionStatus};

/// Totals for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Directories mirrored (after filtering).
    pub directories_visited: usize,
    pub directories_skipped: usize,
    pub directories_failed: usize,
    /// Every file listed in a mirrored directory, excluded ones included.
    pub files_seen: usize,
    pub files_converted: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "create directory: {}, convert files: {}/{} ({} skipped, {} failed), cost time: {:.3} seconds",
            self.directories_visited,
            self.files_converted,
            self.files_seen,
            self.files_skipped,
            self.files_failed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Aggregates outcomes while the walk runs. Owns the [`RunStats`] until
/// [`finish`](Self::finish).
#[derive(Debug)]
pub struct RunReporter {
    stats: RunStats,
    started: Instant,
}

impl RunReporter {
    /// Start the clock.
    pub fn start() -> Self {
        Self {
            stats: RunStats::default(),
            started: Instant::now(),
        }
    }

    pub fn directory_visited(&mut self) {
        self.stats.directories_visited += 1;
    }

    pub fn directory_skipped(&mut self) {
        self.stats.directories_skipped += 1;
    }

    pub fn directory_failed(&mut self) {
        self.stats.directories_failed += 1;
    }

    pub fn record(&mut self, outcome: &ConversionOutcome) {
        self.stats.files_seen += 1;
        match outcome.status {
            ConversionStatus::Succeeded => self.stats.files_converted += 1,
            ConversionStatus::Skipped => self.stats.files_skipped += 1,
            ConversionStatus::Failed => self.stats.files_failed += 1,
        }
    }

    /// Stop the clock and log the summary line.
    pub fn finish(mut self, cancelled: bool) -> RunStats {
        self.stats.cancelled = cancelled;
        self.stats.elapsed = self.started.elapsed();
        let stats = self.stats;
        if cancelled {
            warn!(
                directories = stats.directories_visited,
                converted = stats.files_converted,
                "Run cancelled before the walk completed"
            );
        }
        info!(
            directories_visited = stats.directories_visited,
            directories_skipped = stats.directories_skipped,
            directories_failed = stats.directories_failed,
            files_seen = stats.files_seen,
            files_converted = stats.files_converted,
            files_skipped = stats.files_skipped,
            files_failed = stats.files_failed,
            elapsed_secs = stats.elapsed.as_secs_f64(),
            "{stats}"
        );
        stats
    }
}
