//! Observability for the test orchestrator
//!
//! Prometheus counters and histograms covering test lifecycle and
//! control-plane interactions. Metrics register against the default
//! registry once per process; `OrchestratorMetrics` is a cheap handle
//! over that global state.

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for kubectl round trips (in seconds)
const APPLY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0];

static GLOBAL_METRICS: OnceLock<MetricsInner> = OnceLock::new();

struct MetricsInner {
    tests_started: IntCounter,
    tests_completed: IntCounter,
    tests_failed: IntCounter,
    tests_rejected: IntCounter,
    active_tests: IntGauge,
    poll_errors: IntCounter,
    scaling_samples: IntCounter,
    apply_duration_seconds: Histogram,
}

impl MetricsInner {
    fn new() -> Self {
        Self {
            tests_started: register_int_counter!(
                "orchestrator_tests_started_total",
                "Total number of test runs admitted"
            )
            .expect("Failed to register tests_started_total"),

            tests_completed: register_int_counter!(
                "orchestrator_tests_completed_total",
                "Total number of test runs that completed successfully"
            )
            .expect("Failed to register tests_completed_total"),

            tests_failed: register_int_counter!(
                "orchestrator_tests_failed_total",
                "Total number of test runs that ended in failure"
            )
            .expect("Failed to register tests_failed_total"),

            tests_rejected: register_int_counter!(
                "orchestrator_tests_rejected_total",
                "Total number of test creations rejected by admission control"
            )
            .expect("Failed to register tests_rejected_total"),

            active_tests: register_int_gauge!(
                "orchestrator_active_tests",
                "Number of test runs currently occupying the admission slot"
            )
            .expect("Failed to register active_tests"),

            poll_errors: register_int_counter!(
                "orchestrator_poll_errors_total",
                "Total number of failed pod status polls"
            )
            .expect("Failed to register poll_errors_total"),

            scaling_samples: register_int_counter!(
                "orchestrator_scaling_samples_total",
                "Total number of autoscaler samples recorded"
            )
            .expect("Failed to register scaling_samples_total"),

            apply_duration_seconds: register_histogram!(
                "orchestrator_apply_duration_seconds",
                "Time spent applying workload manifests",
                APPLY_BUCKETS.to_vec()
            )
            .expect("Failed to register apply_duration_seconds"),
        }
    }
}

/// Handle to the process-wide orchestrator metrics
#[derive(Clone)]
pub struct OrchestratorMetrics {
    _private: (),
}

impl Default for OrchestratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_tests_started(&self) {
        self.inner().tests_started.inc();
        self.inner().active_tests.set(1);
    }

    pub fn test_finished(&self, failed: bool) {
        if failed {
            self.inner().tests_failed.inc();
        } else {
            self.inner().tests_completed.inc();
        }
        self.inner().active_tests.set(0);
    }

    pub fn inc_tests_rejected(&self) {
        self.inner().tests_rejected.inc();
    }

    pub fn inc_poll_errors(&self) {
        self.inner().poll_errors.inc();
    }

    pub fn inc_scaling_samples(&self) {
        self.inner().scaling_samples.inc();
    }

    pub fn observe_apply_duration(&self, duration_secs: f64) {
        self.inner().apply_duration_seconds.observe(duration_secs);
    }
}
