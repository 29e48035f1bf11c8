use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::{OutcomeKind, TokenUsage};

/// Latency samples kept per series; older samples are dropped
const LATENCY_WINDOW: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks API attempts, retries, token usage, pipeline outcomes and upload
/// rejections. Thread-safe and cheap to clone.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // API Metrics
    api_calls_total: AtomicUsize,
    api_calls_success: AtomicUsize,
    api_calls_failed: AtomicUsize,
    api_retries_total: AtomicUsize,
    api_tokens_input: AtomicU64,
    api_tokens_output: AtomicU64,
    api_latency_ms: RwLock<VecDeque<u64>>,

    // Pipeline Metrics
    pipeline_duration_ms: RwLock<VecDeque<u64>>,
    outcome_counters: DashMap<OutcomeKind, AtomicUsize>,
    ingest_rejections: AtomicUsize,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                api_calls_total: AtomicUsize::new(0),
                api_calls_success: AtomicUsize::new(0),
                api_calls_failed: AtomicUsize::new(0),
                api_retries_total: AtomicUsize::new(0),
                api_tokens_input: AtomicU64::new(0),
                api_tokens_output: AtomicU64::new(0),
                api_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                pipeline_duration_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                outcome_counters: DashMap::new(),
                ingest_rejections: AtomicUsize::new(0),
                start_time: Instant::now(),
            }),
        }
    }

    // API Metrics
    pub fn record_api_call(&self, success: bool, duration: Duration) {
        self.inner.api_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.api_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.api_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.api_latency_ms, duration);
    }

    pub fn record_retry(&self) {
        self.inner.api_retries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_usage(&self, usage: TokenUsage) {
        self.inner.api_tokens_input.fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.inner.api_tokens_output.fetch_add(usage.output_tokens, Ordering::Relaxed);
    }

    // Pipeline Metrics
    pub fn record_outcome(&self, kind: OutcomeKind, duration: Duration) {
        self.inner
            .outcome_counters
            .entry(kind)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
        push_sample(&self.inner.pipeline_duration_ms, duration);
    }

    pub fn record_ingest_rejection(&self) {
        self.inner.ingest_rejections.fetch_add(1, Ordering::Relaxed);
    }

    fn outcome_count(&self, kind: OutcomeKind) -> usize {
        self.inner
            .outcome_counters
            .get(&kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let api_latency = self.inner.api_latency_ms.read();
        let api_latency_avg = avg(&api_latency);
        let api_latency_p50 = percentile(&api_latency, 0.5);
        let api_latency_p95 = percentile(&api_latency, 0.95);
        let api_latency_p99 = percentile(&api_latency, 0.99);
        drop(api_latency);

        let pipeline_durations = self.inner.pipeline_duration_ms.read();
        let pipeline_avg = avg(&pipeline_durations);
        drop(pipeline_durations);

        MetricsSnapshot {
            api_calls_total: self.inner.api_calls_total.load(Ordering::Relaxed),
            api_calls_success: self.inner.api_calls_success.load(Ordering::Relaxed),
            api_calls_failed: self.inner.api_calls_failed.load(Ordering::Relaxed),
            api_retries_total: self.inner.api_retries_total.load(Ordering::Relaxed),
            api_tokens_input: self.inner.api_tokens_input.load(Ordering::Relaxed),
            api_tokens_output: self.inner.api_tokens_output.load(Ordering::Relaxed),
            api_latency_avg_ms: api_latency_avg,
            api_latency_p50_ms: api_latency_p50,
            api_latency_p95_ms: api_latency_p95,
            api_latency_p99_ms: api_latency_p99,
            pipeline_avg_ms: pipeline_avg,
            outcomes_success: self.outcome_count(OutcomeKind::Success),
            outcomes_no_crop: self.outcome_count(OutcomeKind::NoCropDetected),
            outcomes_incomplete: self.outcome_count(OutcomeKind::Incomplete),
            outcomes_failure: self.outcome_count(OutcomeKind::Failure),
            ingest_rejections: self.inner.ingest_rejections.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP api_calls_total Total number of API attempts made
# TYPE api_calls_total counter
api_calls_total {{}} {}

# HELP api_calls_success Number of delivered API attempts
# TYPE api_calls_success counter
api_calls_success {{}} {}

# HELP api_calls_failed Number of failed API attempts
# TYPE api_calls_failed counter
api_calls_failed {{}} {}

# HELP api_retries_total Number of backoff waits taken before a retry
# TYPE api_retries_total counter
api_retries_total {{}} {}

# HELP api_tokens_input_total Total input tokens consumed
# TYPE api_tokens_input_total counter
api_tokens_input_total {{}} {}

# HELP api_tokens_output_total Total output tokens generated
# TYPE api_tokens_output_total counter
api_tokens_output_total {{}} {}

# HELP api_latency_avg_ms Average API latency in milliseconds
# TYPE api_latency_avg_ms gauge
api_latency_avg_ms {{}} {}

# HELP pipeline_avg_duration_ms Average end-to-end pipeline duration in milliseconds
# TYPE pipeline_avg_duration_ms gauge
pipeline_avg_duration_ms {{}} {}

# HELP pipeline_outcomes_total Pipeline runs by outcome
# TYPE pipeline_outcomes_total counter
pipeline_outcomes_total {{outcome="success"}} {}
pipeline_outcomes_total {{outcome="no_crop_detected"}} {}
pipeline_outcomes_total {{outcome="incomplete"}} {}
pipeline_outcomes_total {{outcome="failure"}} {}

# HELP ingest_rejections_total Uploads rejected by validation
# TYPE ingest_rejections_total counter
ingest_rejections_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.api_calls_total,
            snapshot.api_calls_success,
            snapshot.api_calls_failed,
            snapshot.api_retries_total,
            snapshot.api_tokens_input,
            snapshot.api_tokens_output,
            snapshot.api_latency_avg_ms,
            snapshot.pipeline_avg_ms,
            snapshot.outcomes_success,
            snapshot.outcomes_no_crop,
            snapshot.outcomes_incomplete,
            snapshot.outcomes_failure,
            snapshot.ingest_rejections,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub api_calls_total: usize,
    pub api_calls_success: usize,
    pub api_calls_failed: usize,
    pub api_retries_total: usize,
    pub api_tokens_input: u64,
    pub api_tokens_output: u64,
    pub api_latency_avg_ms: u64,
    pub api_latency_p50_ms: u64,
    pub api_latency_p95_ms: u64,
    pub api_latency_p99_ms: u64,
    pub pipeline_avg_ms: u64,
    pub outcomes_success: usize,
    pub outcomes_no_crop: usize,
    pub outcomes_incomplete: usize,
    pub outcomes_failure: usize,
    pub ingest_rejections: usize,
    pub uptime_seconds: u64,
}

fn push_sample(window: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut samples = window.write();
    if samples.len() == LATENCY_WINDOW {
        samples.pop_front();
    }
    samples.push_back(duration.as_millis() as u64);
}

fn percentile(values: &VecDeque<u64>, p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted: Vec<u64> = values.iter().copied().collect();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &VecDeque<u64>) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
