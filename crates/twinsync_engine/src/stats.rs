//! Per-link sync statistics.

use crate::direction::Direction;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, SystemTime};
use twinsync_model::EntityId;

/// One recorded sync attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRecord {
    /// Wall-clock time the attempt finished.
    pub timestamp: SystemTime,
    /// Direction of the mirror.
    pub direction: Direction,
    /// Entity the change came from.
    pub source: EntityId,
    /// Entity the action went to.
    pub target: EntityId,
    /// Time spent, including retries.
    pub duration: Duration,
    /// Whether the target was actuated.
    pub success: bool,
    /// Failure text, if any.
    pub error: Option<String>,
}

/// Counters and recent history of a link.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    /// Syncs that reached the executor.
    pub attempts: u64,
    /// Syncs that actuated the target.
    pub succeeded: u64,
    /// Syncs that gave up.
    pub failed: u64,
    /// Syncs with nothing to do.
    pub skipped: u64,
    /// Running average over succeeded and failed syncs.
    pub average_duration: Duration,
    /// Most recent outcomes, oldest first.
    pub recent: VecDeque<SyncRecord>,
    /// Time of the last successful sync.
    pub last_sync_time: Option<SystemTime>,
    /// Text of the last failure.
    pub last_error: Option<String>,
    #[serde(skip)]
    history_len: usize,
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new(10)
    }
}

impl SyncStats {
    /// Creates empty stats keeping `history_len` recent records.
    pub fn new(history_len: usize) -> Self {
        Self {
            attempts: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            average_duration: Duration::ZERO,
            recent: VecDeque::with_capacity(history_len),
            last_sync_time: None,
            last_error: None,
            history_len,
        }
    }

    /// Records a sync that actuated the target.
    pub fn record_success(&mut self, record: SyncRecord) {
        self.attempts += 1;
        self.succeeded += 1;
        self.last_sync_time = Some(record.timestamp);
        self.fold_duration(record.duration);
        self.push(record);
    }

    /// Records a sync that failed.
    pub fn record_failure(&mut self, record: SyncRecord) {
        self.attempts += 1;
        self.failed += 1;
        self.last_error = record.error.clone();
        self.fold_duration(record.duration);
        self.push(record);
    }

    /// Records a sync that had nothing to do.
    pub fn record_skip(&mut self) {
        self.attempts += 1;
        self.skipped += 1;
    }

    /// Fraction of executed syncs that succeeded.
    pub fn success_rate(&self) -> Option<f64> {
        let executed = self.succeeded + self.failed;
        (executed > 0).then(|| self.succeeded as f64 / executed as f64)
    }

    fn fold_duration(&mut self, duration: Duration) {
        let n = (self.succeeded + self.failed) as f64;
        let avg = self.average_duration.as_secs_f64();
        let next = avg + (duration.as_secs_f64() - avg) / n;
        self.average_duration = Duration::from_secs_f64(next.max(0.0));
    }

    fn push(&mut self, record: SyncRecord) {
        if self.history_len == 0 {
            return;
        }
        while self.recent.len() >= self.history_len {
            self.recent.pop_front();
        }
        self.recent.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ms: u64, success: bool) -> SyncRecord {
        SyncRecord {
            timestamp: SystemTime::now(),
            direction: Direction::AToB,
            source: EntityId::new("light.a"),
            target: EntityId::new("light.b"),
            duration: Duration::from_millis(ms),
            success,
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn counters_and_average() {
        let mut stats = SyncStats::new(10);
        stats.record_success(record(100, true));
        stats.record_failure(record(200, false));
        stats.record_skip();

        assert_eq!(stats.attempts, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.average_duration.as_millis(), 150);
        assert_eq!(stats.success_rate(), Some(0.5));
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
        assert!(stats.last_sync_time.is_some());
    }

    #[test]
    fn history_is_bounded() {
        let mut stats = SyncStats::new(3);
        for i in 0..5 {
            stats.record_success(record(i, true));
        }
        assert_eq!(stats.recent.len(), 3);
        assert_eq!(stats.recent[0].duration, Duration::from_millis(2));
    }

    #[test]
    fn no_rate_without_executions() {
        let mut stats = SyncStats::default();
        stats.record_skip();
        assert_eq!(stats.success_rate(), None);
    }
}
