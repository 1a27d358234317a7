//! Request and cache metrics backed by a Prometheus registry.
//!
//! Counters only ever increase and every collector is safe to update concurrently.
//! [`MetricsRecorder::snapshot`] gathers the registry into an owned value and
//! [`MetricsRecorder::export_text`] renders it for a Prometheus scrape.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use prometheus::proto::{self, Metric, MetricFamily};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;

use crate::FaultKind;

pub const REQUESTS_TOTAL: &str = "solvency_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "solvency_request_duration_seconds";
pub const CACHE_HITS_TOTAL: &str = "solvency_cache_hits_total";
pub const CACHE_MISSES_TOTAL: &str = "solvency_cache_misses_total";
pub const CACHE_EVICTIONS_TOTAL: &str = "solvency_cache_evictions_total";

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const MILLIS_PER_SECOND: f64 = 1_000.0;

/// Upper bounds (inclusive) of the latency histogram buckets, in seconds.
pub const LATENCY_BUCKETS_SECONDS: [f64; 9] = [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Outcome label for a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    NotFound,
    ValidationError,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "success" => Some(Self::Success),
            "not_found" => Some(Self::NotFound),
            "validation_error" => Some(Self::ValidationError),
            _ => None,
        }
    }
}

impl From<&FaultKind> for Outcome {
    fn from(kind: &FaultKind) -> Self {
        match kind {
            FaultKind::NotFound { .. } => Self::NotFound,
            FaultKind::ValidationError { .. } => Self::ValidationError,
        }
    }
}

/// Cache event kinds forwarded by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvent {
    Hit,
    Miss,
    Eviction,
}

#[derive(Debug, Clone, Copy)]
struct LatencyRange {
    min_nanos: u64,
    max_nanos: u64,
}

/// Thread-safe metrics recorder shared by every request.
///
/// Request counts, latency histograms and cache events live in a Prometheus [`Registry`]
/// owned by the recorder. Prometheus keeps no extremes, so per-operation min/max latency
/// sits in a small side table. Cloning yields another handle to the same metrics.
#[derive(Clone)]
pub struct MetricsRecorder {
    registry: Registry,
    requests: IntCounterVec,
    latency: HistogramVec,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    cache_evictions: IntCounter,
    extremes: Arc<Mutex<HashMap<String, LatencyRange>>>,
    started: Instant,
}

impl fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// Create a recorder on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create a recorder that registers its collectors in `registry`.
    ///
    /// Fails when the registry already holds collectors with the same names.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new(REQUESTS_TOTAL, "Upstream and gateway calls by operation and outcome"),
            &["operation", "outcome"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION_SECONDS, "Call latency in seconds")
                .buckets(LATENCY_BUCKETS_SECONDS.to_vec()),
            &["operation"],
        )?;
        let cache_hits = IntCounter::new(CACHE_HITS_TOTAL, "Record cache hits")?;
        let cache_misses = IntCounter::new(CACHE_MISSES_TOTAL, "Record cache misses")?;
        let cache_evictions = IntCounter::new(CACHE_EVICTIONS_TOTAL, "Record cache evictions")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_evictions.clone()))?;

        Ok(Self {
            registry,
            requests,
            latency,
            cache_hits,
            cache_misses,
            cache_evictions,
            extremes: Arc::new(Mutex::new(HashMap::new())),
            started: Instant::now(),
        })
    }

    /// The registry backing this recorder.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn extremes(&self) -> MutexGuard<'_, HashMap<String, LatencyRange>> {
        self.extremes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_request(&self, operation: &str, duration_nanos: u64, outcome: Outcome) {
        self.requests
            .with_label_values(&[operation, outcome.as_str()])
            .inc();
        self.latency
            .with_label_values(&[operation])
            .observe(duration_nanos as f64 / NANOS_PER_SECOND);

        let mut extremes = self.extremes();
        match extremes.get_mut(operation) {
            Some(range) => {
                range.min_nanos = range.min_nanos.min(duration_nanos);
                range.max_nanos = range.max_nanos.max(duration_nanos);
            }
            None => {
                extremes.insert(
                    operation.to_owned(),
                    LatencyRange {
                        min_nanos: duration_nanos,
                        max_nanos: duration_nanos,
                    },
                );
            }
        }
    }

    /// Convenience wrapper over [`record_request`](Self::record_request) for a [`Duration`].
    pub fn record_duration(&self, operation: &str, duration: Duration, outcome: Outcome) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.record_request(operation, nanos, outcome);
    }

    pub fn record_cache_event(&self, event: CacheEvent) {
        self.record_cache_events(event, 1);
    }

    pub fn record_cache_events(&self, event: CacheEvent, count: u64) {
        if count == 0 {
            return;
        }
        match event {
            CacheEvent::Hit => self.cache_hits.inc_by(count),
            CacheEvent::Miss => self.cache_misses.inc_by(count),
            CacheEvent::Eviction => self.cache_evictions.inc_by(count),
        }
    }

    /// Point-in-time copy of every metric, read back from the registry.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.started.elapsed();
        let families = self.registry.gather();
        let extremes = self.extremes().clone();

        let mut operations: BTreeMap<String, OperationSnapshot> = BTreeMap::new();
        let mut cache = CacheCounters {
            hits: 0,
            misses: 0,
            evictions: 0,
        };

        for family in &families {
            match family.get_name() {
                REQUESTS_TOTAL => {
                    for metric in family.get_metric() {
                        let (Some(operation), Some(outcome)) = (
                            label(metric, "operation"),
                            label(metric, "outcome").and_then(Outcome::from_label),
                        ) else {
                            continue;
                        };
                        let count = metric.get_counter().get_value() as u64;
                        let entry = operations
                            .entry(operation.to_owned())
                            .or_insert_with(OperationSnapshot::empty);
                        *entry.outcomes.entry(outcome).or_default() += count;
                        entry.call_count += count;
                    }
                }
                REQUEST_DURATION_SECONDS => {
                    for metric in family.get_metric() {
                        let Some(operation) = label(metric, "operation") else {
                            continue;
                        };
                        let histogram = metric.get_histogram();
                        let entry = operations
                            .entry(operation.to_owned())
                            .or_insert_with(OperationSnapshot::empty);
                        if histogram.get_sample_count() > 0 {
                            entry.avg_latency_ms = histogram.get_sample_sum()
                                / histogram.get_sample_count() as f64
                                * MILLIS_PER_SECOND;
                        }
                        entry.histogram = histogram_buckets(histogram);
                    }
                }
                CACHE_HITS_TOTAL => cache.hits = counter_total(family),
                CACHE_MISSES_TOTAL => cache.misses = counter_total(family),
                CACHE_EVICTIONS_TOTAL => cache.evictions = counter_total(family),
                _ => {}
            }
        }

        for (name, op) in &mut operations {
            if let Some(range) = extremes.get(name) {
                op.min_latency_ms = nanos_to_ms(range.min_nanos as f64);
                op.max_latency_ms = nanos_to_ms(range.max_nanos as f64);
            }
        }

        MetricsSnapshot {
            uptime_seconds: uptime.as_secs_f64(),
            operations,
            cache,
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn export_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

fn label<'a>(metric: &'a Metric, name: &str) -> Option<&'a str> {
    metric
        .get_label()
        .iter()
        .find(|pair| pair.get_name() == name)
        .map(|pair| pair.get_value())
}

fn counter_total(family: &MetricFamily) -> u64 {
    family
        .get_metric()
        .iter()
        .map(|metric| metric.get_counter().get_value() as u64)
        .sum()
}

// Prometheus buckets are cumulative and omit +Inf; the snapshot reports per-bucket counts
// with a trailing overflow bucket.
fn histogram_buckets(histogram: &proto::Histogram) -> Vec<HistogramBucket> {
    let mut previous = 0;
    let mut buckets: Vec<HistogramBucket> = histogram
        .get_bucket()
        .iter()
        .map(|bucket| {
            let cumulative = bucket.get_cumulative_count();
            let count = cumulative.saturating_sub(previous);
            previous = cumulative;
            HistogramBucket {
                le_seconds: Some(bucket.get_upper_bound()),
                count,
            }
        })
        .collect();
    buckets.push(HistogramBucket {
        le_seconds: None,
        count: histogram.get_sample_count().saturating_sub(previous),
    });
    buckets
}

/// Cache event totals as seen by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// One histogram bucket: observations with latency `<= le_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBucket {
    /// `None` for the overflow bucket.
    pub le_seconds: Option<f64>,
    pub count: u64,
}

/// Per-operation view inside a [`MetricsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSnapshot {
    pub call_count: u64,
    pub outcomes: BTreeMap<Outcome, u64>,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub histogram: Vec<HistogramBucket>,
}

impl OperationSnapshot {
    fn empty() -> Self {
        Self {
            call_count: 0,
            outcomes: BTreeMap::new(),
            avg_latency_ms: 0.0,
            min_latency_ms: 0.0,
            max_latency_ms: 0.0,
            histogram: Vec::new(),
        }
    }

    pub fn outcome_count(&self, outcome: Outcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }
}

fn nanos_to_ms(nanos: f64) -> f64 {
    nanos / NANOS_PER_SECOND * MILLIS_PER_SECOND
}

/// Immutable point-in-time copy of all metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: f64,
    pub operations: BTreeMap<String, OperationSnapshot>,
    pub cache: CacheCounters,
}

impl MetricsSnapshot {
    pub fn operation(&self, name: &str) -> Option<&OperationSnapshot> {
        self.operations.get(name)
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Uptime: {:.2}s", self.uptime_seconds);
        let _ = writeln!(
            out,
            "Cache events: hits={} misses={} evictions={}",
            self.cache.hits, self.cache.misses, self.cache.evictions
        );

        for (name, op) in &self.operations {
            let _ = writeln!(out, "{name}:");
            let _ = writeln!(out, "  Calls: {}", op.call_count);
            for (outcome, count) in &op.outcomes {
                let _ = writeln!(out, "  {}: {count}", outcome.as_str());
            }
            let _ = writeln!(out, "  Avg Latency: {:.2}ms", op.avg_latency_ms);
            let _ = writeln!(
                out,
                "  Min/Max: {:.2}/{:.2}ms",
                op.min_latency_ms, op.max_latency_ms
            );
        }

        out
    }
}
