use super::ProcessOutcome;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of terminal outcomes since startup
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub accepted: AtomicU64,
    pub rejected: AtomicU64,
    pub error_routed: AtomicU64,
    pub dead_lettered: AtomicU64,
    /// Videos left in the incoming tree after every move failed
    pub stranded: AtomicU64,
    /// Entries whose file disappeared before processing
    pub vanished: AtomicU64,
    /// Accepted videos whose snapshots were not all written
    pub snapshot_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &ProcessOutcome) {
        let counter = match outcome {
            ProcessOutcome::Accepted { snapshots_failed, .. } => {
                if *snapshots_failed > 0 {
                    self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
                }
                &self.accepted
            }
            ProcessOutcome::Rejected { .. } => &self.rejected,
            ProcessOutcome::ErrorRouted { .. } => &self.error_routed,
            ProcessOutcome::DeadLettered { .. } => &self.dead_lettered,
            ProcessOutcome::Stranded { .. } => &self.stranded,
            ProcessOutcome::Vanished => &self.vanished,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            error_routed: self.error_routed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            stranded: self.stranded.load(Ordering::Relaxed),
            vanished: self.vanished.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub error_routed: u64,
    pub dead_lettered: u64,
    pub stranded: u64,
    pub vanished: u64,
    pub snapshot_failures: u64,
}

impl PipelineStatsSnapshot {
    pub fn processed(&self) -> u64 {
        self.accepted + self.rejected + self.error_routed + self.dead_lettered + self.stranded
    }
}

impl fmt::Display for PipelineStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} accepted, {} rejected, {} error-routed, {} dead-lettered, {} stranded",
            self.processed(),
            self.accepted,
            self.rejected,
            self.error_routed,
            self.dead_lettered,
            self.stranded
        )
    }
}
