//! Performance metrics and statistics tracking for the call pipeline.
//!
//! Every counter is an atomic so session workers never contend on a lock.

use crate::types::{Label, SegmentQuality};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bounds (microseconds) of the latency histogram buckets; the last
/// bucket is open-ended.
const LATENCY_BOUNDS_US: [u64; 9] = [
    1_000, 5_000, 10_000, 50_000, 100_000, 250_000, 500_000, 1_000_000, 5_000_000,
];
const LATENCY_BUCKETS: usize = LATENCY_BOUNDS_US.len() + 1;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Chunks transcribed and classified
    pub chunks_processed: AtomicU64,
    /// Stateless text classifications
    pub text_classifications: AtomicU64,
    /// Verdicts by label
    safe_verdicts: AtomicU64,
    suspicious_verdicts: AtomicU64,
    scam_verdicts: AtomicU64,
    /// Segments that were low-confidence or unavailable
    pub degraded_segments: AtomicU64,
    /// Sequence gaps skipped
    pub gaps_detected: AtomicU64,
    /// Chunks rejected at intake
    pub chunks_rejected: AtomicU64,
    /// Risk escalation alerts raised
    pub escalations: AtomicU64,
    /// Per-segment keyword alerts raised
    pub keyword_alerts: AtomicU64,
    /// Times a session waited on its full event buffer
    pub event_backlogs: AtomicU64,
    pub sessions_started: AtomicU64,
    pub sessions_ended: AtomicU64,
    /// Chunk processing latency histogram
    latency_buckets: [AtomicU64; LATENCY_BUCKETS],
    latency_total_us: AtomicU64,
    latency_max_us: AtomicU64,
    /// Risk score distribution buckets
    score_buckets: [AtomicU64; 10],
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            chunks_processed: AtomicU64::new(0),
            text_classifications: AtomicU64::new(0),
            safe_verdicts: AtomicU64::new(0),
            suspicious_verdicts: AtomicU64::new(0),
            scam_verdicts: AtomicU64::new(0),
            degraded_segments: AtomicU64::new(0),
            gaps_detected: AtomicU64::new(0),
            chunks_rejected: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            keyword_alerts: AtomicU64::new(0),
            event_backlogs: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            sessions_ended: AtomicU64::new(0),
            latency_buckets: Default::default(),
            latency_total_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            score_buckets: Default::default(),
            start_time: Instant::now(),
        }
    }

    /// Record a processed chunk
    pub fn record_chunk(
        &self,
        processing_time: Duration,
        label: Label,
        risk_score: f64,
        quality: SegmentQuality,
    ) {
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
        if quality.is_degraded() {
            self.degraded_segments.fetch_add(1, Ordering::Relaxed);
        }
        self.record_verdict(label, risk_score);

        let us = processing_time.as_micros() as u64;
        let bucket = LATENCY_BOUNDS_US
            .iter()
            .position(|&bound| us < bound)
            .unwrap_or(LATENCY_BUCKETS - 1);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_total_us.fetch_add(us, Ordering::Relaxed);
        self.latency_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Record a stateless text classification
    pub fn record_text_classification(&self, label: Label, risk_score: f64) {
        self.text_classifications.fetch_add(1, Ordering::Relaxed);
        self.record_verdict(label, risk_score);
    }

    fn record_verdict(&self, label: Label, risk_score: f64) {
        let counter = match label {
            Label::Safe => &self.safe_verdicts,
            Label::Suspicious => &self.suspicious_verdicts,
            Label::Scam => &self.scam_verdicts,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let bucket = (risk_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        self.score_buckets[bucket].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gap(&self) {
        self.gaps_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.chunks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_keyword_alert(&self) {
        self.keyword_alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_backlog(&self) {
        self.event_backlogs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_ended(&self) {
        self.sessions_ended.fetch_add(1, Ordering::Relaxed);
    }

    /// Sessions started and not yet ended
    pub fn active_sessions(&self) -> u64 {
        let started = self.sessions_started.load(Ordering::Relaxed);
        let ended = self.sessions_ended.load(Ordering::Relaxed);
        started.saturating_sub(ended)
    }

    /// Verdict counts as (safe, suspicious, scam)
    pub fn get_verdicts(&self) -> (u64, u64, u64) {
        (
            self.safe_verdicts.load(Ordering::Relaxed),
            self.suspicious_verdicts.load(Ordering::Relaxed),
            self.scam_verdicts.load(Ordering::Relaxed),
        )
    }

    /// Get processing time statistics.
    ///
    /// Percentiles are bucket upper bounds, so they over-estimate slightly.
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let counts: Vec<u64> = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let count: u64 = counts.iter().sum();
        if count == 0 {
            return ProcessingStats::default();
        }

        let max_us = self.latency_max_us.load(Ordering::Relaxed);
        let percentile = |q: f64| -> u64 {
            let rank = ((count as f64) * q).ceil().max(1.0) as u64;
            let mut seen = 0;
            for (i, &c) in counts.iter().enumerate() {
                seen += c;
                if seen >= rank {
                    return LATENCY_BOUNDS_US.get(i).copied().unwrap_or(max_us).min(max_us);
                }
            }
            max_us
        };

        ProcessingStats {
            count,
            mean_us: self.latency_total_us.load(Ordering::Relaxed) / count,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us,
        }
    }

    /// Get current throughput (chunks per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.chunks_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        let mut dist = [0; 10];
        for (slot, bucket) in dist.iter_mut().zip(&self.score_buckets) {
            *slot = bucket.load(Ordering::Relaxed);
        }
        dist
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let chunks = self.chunks_processed.load(Ordering::Relaxed);
        let texts = self.text_classifications.load(Ordering::Relaxed);
        let degraded = self.degraded_segments.load(Ordering::Relaxed);
        let degraded_rate = if chunks > 0 {
            (degraded as f64 / chunks as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let (safe, suspicious, scam) = self.get_verdicts();
        let verdicts = safe + suspicious + scam;
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            VOICE SCAM SHIELD - METRICS SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Chunks Processed: {:>8}  │  Throughput: {:>6.1} chunks/s  ║",
            chunks, throughput
        );
        info!(
            "║ Text Requests:    {:>8}  │  Degraded:   {:>6.1}%          ║",
            texts, degraded_rate
        );
        info!(
            "║ Sessions: active={:>5} started={:>6} ended={:>6}            ║",
            self.active_sessions(),
            self.sessions_started.load(Ordering::Relaxed),
            self.sessions_ended.load(Ordering::Relaxed)
        );
        info!(
            "║ Gaps: {:>6}  Rejected: {:>6}  Escalations: {:>6}          ║",
            self.gaps_detected.load(Ordering::Relaxed),
            self.chunks_rejected.load(Ordering::Relaxed),
            self.escalations.load(Ordering::Relaxed)
        );
        info!(
            "║ Keyword Alerts: {:>6}  Event Backlogs: {:>6}                ║",
            self.keyword_alerts.load(Ordering::Relaxed),
            self.event_backlogs.load(Ordering::Relaxed)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Chunk Latency (μs): mean={:>7} p50≤{:>7} p99≤{:>7}        ║",
            processing.mean_us, processing.p50_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Verdicts:                                                    ║");
        for (label, count) in [("safe", safe), ("suspicious", suspicious), ("scam", scam)] {
            let pct = if verdicts > 0 {
                (count as f64 / verdicts as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)                                ║", label, count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, PartialEq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
