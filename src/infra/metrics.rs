//! Lock-free sync and binding metrics with periodic reporting
//!
//! Counters are plain atomics with Relaxed ordering; they are statistics
//! only and never drive control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Bind latency bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn swap_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Upper bound of the bucket containing `percentile`
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Last bucket reports 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

pub struct SyncMetrics {
    /// Fetches issued (monotonic)
    fetches_started: AtomicU64,
    /// Snapshots applied (monotonic)
    snapshots_applied: AtomicU64,
    /// Fetches that failed (monotonic)
    fetches_failed: AtomicU64,
    /// Completions discarded because a newer request existed (monotonic)
    stale_discarded: AtomicU64,
    /// Date inputs rejected before any request (monotonic)
    malformed_dates: AtomicU64,
    /// Entities matched to a record, summed over all binds (monotonic)
    join_hits: AtomicU64,
    /// Entities without a record, summed over all binds (monotonic)
    join_misses: AtomicU64,
    /// Bind passes since last report (reset on report)
    binds_since_report: AtomicU64,
    /// Sum of bind latencies (reset on report)
    bind_latency_sum_us: AtomicU64,
    /// Max bind latency (reset on report)
    bind_latency_max_us: AtomicU64,
    /// Bind latency histogram (reset on report)
    bind_latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Last report time (only touched by the reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            fetches_started: AtomicU64::new(0),
            snapshots_applied: AtomicU64::new(0),
            fetches_failed: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
            malformed_dates: AtomicU64::new(0),
            join_hits: AtomicU64::new(0),
            join_misses: AtomicU64::new(0),
            binds_since_report: AtomicU64::new(0),
            bind_latency_sum_us: AtomicU64::new(0),
            bind_latency_max_us: AtomicU64::new(0),
            bind_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_discarded(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_malformed_date(&self) {
        self.malformed_dates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an applied snapshot and the bind pass it triggered
    #[inline]
    pub fn record_snapshot_applied(&self, bind_latency_us: u64, matched: usize, missed: usize) {
        self.snapshots_applied.fetch_add(1, Ordering::Relaxed);
        self.join_hits.fetch_add(matched as u64, Ordering::Relaxed);
        self.join_misses.fetch_add(missed as u64, Ordering::Relaxed);

        self.binds_since_report.fetch_add(1, Ordering::Relaxed);
        self.bind_latency_sum_us.fetch_add(bind_latency_us, Ordering::Relaxed);
        self.bind_latency_buckets[bucket_index(bind_latency_us)].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.bind_latency_max_us, bind_latency_us);
    }

    pub fn fetches_started(&self) -> u64 {
        self.fetches_started.load(Ordering::Relaxed)
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied.load(Ordering::Relaxed)
    }

    pub fn fetches_failed(&self) -> u64 {
        self.fetches_failed.load(Ordering::Relaxed)
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded.load(Ordering::Relaxed)
    }

    pub fn malformed_dates(&self) -> u64 {
        self.malformed_dates.load(Ordering::Relaxed)
    }

    /// Snapshot monotonic counters and drain the per-interval latency stats
    pub fn report(&self) -> MetricsSummary {
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed().as_secs_f64();
            *last = Instant::now();
            elapsed
        };

        let binds = self.binds_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.bind_latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.bind_latency_max_us.swap(0, Ordering::Relaxed);
        let buckets = swap_buckets(&self.bind_latency_buckets);

        MetricsSummary {
            interval_secs: elapsed_secs,
            fetches_started: self.fetches_started(),
            snapshots_applied: self.snapshots_applied(),
            fetches_failed: self.fetches_failed(),
            stale_discarded: self.stale_discarded(),
            malformed_dates: self.malformed_dates(),
            join_hits: self.join_hits.load(Ordering::Relaxed),
            join_misses: self.join_misses.load(Ordering::Relaxed),
            binds_in_interval: binds,
            avg_bind_latency_us: if binds > 0 { latency_sum / binds } else { 0 },
            max_bind_latency_us: max_latency,
            bind_p99_us: percentile_from_buckets(&buckets, 0.99),
            bind_latency_buckets: buckets,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub interval_secs: f64,
    pub fetches_started: u64,
    pub snapshots_applied: u64,
    pub fetches_failed: u64,
    pub stale_discarded: u64,
    pub malformed_dates: u64,
    pub join_hits: u64,
    pub join_misses: u64,
    pub binds_in_interval: u64,
    pub avg_bind_latency_us: u64,
    pub max_bind_latency_us: u64,
    pub bind_p99_us: u64,
    pub bind_latency_buckets: [u64; METRICS_NUM_BUCKETS],
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            interval_secs = format!("{:.1}", self.interval_secs),
            fetches = %self.fetches_started,
            applied = %self.snapshots_applied,
            failed = %self.fetches_failed,
            stale = %self.stale_discarded,
            malformed_dates = %self.malformed_dates,
            join_hits = %self.join_hits,
            join_misses = %self.join_misses,
            binds = %self.binds_in_interval,
            avg_bind_us = %self.avg_bind_latency_us,
            max_bind_us = %self.max_bind_latency_us,
            bind_p99_us = %self.bind_p99_us,
            "metrics"
        );
    }
}
