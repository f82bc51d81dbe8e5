//! Pipeline counters for debugging and performance analysis.
//!
//! Counters are shared between the pipeline thread and its producers, so
//! they are plain relaxed atomics. A summary is logged at debug level once
//! per second of frame time.

use std::sync::atomic::{AtomicU64, Ordering};

const LOG_INTERVAL_NS: u64 = 1_000_000_000;

/// Snapshot of accumulated pipeline statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub transactions_applied: u64,
    pub commands_applied: u64,
    pub decode_failures: u64,
    pub vsync_requests: u64,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_rendered: AtomicU64,
    frames_skipped: AtomicU64,
    transactions_applied: AtomicU64,
    commands_applied: AtomicU64,
    decode_failures: AtomicU64,
    vsync_requests: AtomicU64,
    last_log_ns: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_frame_rendered(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transaction(&self, commands: usize) {
        self.transactions_applied.fetch_add(1, Ordering::Relaxed);
        self.commands_applied.fetch_add(commands as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_vsync_request(&self) {
        self.vsync_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            transactions_applied: self.transactions_applied.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            vsync_requests: self.vsync_requests.load(Ordering::Relaxed),
        }
    }

    /// Log a summary if a second of frame time passed since the last one.
    pub fn maybe_log(&self, timestamp_ns: u64) {
        let last = self.last_log_ns.load(Ordering::Relaxed);
        if timestamp_ns.saturating_sub(last) < LOG_INTERVAL_NS {
            return;
        }
        self.last_log_ns.store(timestamp_ns, Ordering::Relaxed);
        let s = self.snapshot();
        let total_frames = s.frames_rendered + s.frames_skipped;
        let skip_rate = if total_frames > 0 {
            s.frames_skipped as f64 / total_frames as f64 * 100.0
        } else {
            0.0
        };
        log::debug!(
            "[pipeline stats] frames: {} rendered, {} skipped ({skip_rate:.1}% skip) | \
             transactions: {} ({} commands, {} undecodable) | vsync requests: {}",
            s.frames_rendered,
            s.frames_skipped,
            s.transactions_applied,
            s.commands_applied,
            s.decode_failures,
            s.vsync_requests
        );
    }
}
