//! Prometheus metrics for the federation gateway.
//!
//! All metrics follow the naming convention: `fg_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., mappings_created_total)
//! - **Histogram**: Distribution of values (e.g., outbound_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // OUTBOUND METRICS (Subsystem 4)
    // =========================================================================

    /// Outbound exchanges by classified result
    pub static ref OUTBOUND_EXCHANGES: CounterVec = CounterVec::new(
        Opts::new("fg_outbound_exchanges_total", "Outbound exchanges by result"),
        &["result"]  // result: success/client_error_response/invalid_response/internal_error
    ).expect("metric creation failed");

    /// Outbound exchange duration, signing through classification
    pub static ref OUTBOUND_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "fg_outbound_duration_seconds",
            "Time spent on outbound exchanges"
        ).buckets(exponential_buckets(0.005, 2.0, 12).expect("bucket layout is valid"))
    ).expect("metric creation failed");

    // =========================================================================
    // DISPATCH METRICS (Subsystem 3)
    // =========================================================================

    /// Reconciliations by operation and outcome
    pub static ref RECONCILIATIONS: CounterVec = CounterVec::new(
        Opts::new("fg_dispatch_reconciliations_total", "Reconciled index/get/stats operations"),
        &["operation", "outcome"]  // operation: index/get/stats, outcome: ok/error
    ).expect("metric creation failed");

    // =========================================================================
    // MAPPING METRICS (Subsystems 2, 5)
    // =========================================================================

    /// Mappings stored
    pub static ref MAPPINGS_CREATED: Counter = Counter::new(
        "fg_mapping_created_total",
        "Identifier mappings stored"
    ).expect("metric creation failed");

    /// Ids rediscovered under a different unit
    pub static ref MAPPING_CONFLICTS: Counter = Counter::new(
        "fg_mapping_conflicts_total",
        "Identifier mapping conflicts detected"
    ).expect("metric creation failed");

    /// Synchronization runs by outcome
    pub static ref SYNC_RUNS: CounterVec = CounterVec::new(
        Opts::new("fg_sync_runs_total", "Mapping synchronization runs"),
        &["outcome"]  // outcome: ok/error/skipped
    ).expect("metric creation failed");

    // =========================================================================
    // INBOUND METRICS
    // =========================================================================

    /// Inbound API requests by capability and HTTP status
    pub static ref INBOUND_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("fg_inbound_requests_total", "Inbound API requests"),
        &["capability", "status"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Outbound
        Box::new(OUTBOUND_EXCHANGES.clone()),
        Box::new(OUTBOUND_DURATION.clone()),
        // Dispatch
        Box::new(RECONCILIATIONS.clone()),
        // Mapping
        Box::new(MAPPINGS_CREATED.clone()),
        Box::new(MAPPING_CONFLICTS.clone()),
        Box::new(SYNC_RUNS.clone()),
        // Inbound
        Box::new(INBOUND_REQUESTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
