//! Core data models for the test orchestrator

use serde::{Deserialize, Serialize};

/// Kind of workload a test run launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestKind {
    /// HTTP load with default parameters
    HttpLoad,
    /// HTTP load with caller-supplied parameters
    HttpLoadCustom,
    /// CPU stressor
    CpuStress,
    /// Memory stressor
    MemoryStress,
    /// HTTP load plus autoscaler observation and cooldown
    ScalingBehavior,
}

impl TestKind {
    /// Stable identifier used as the test id prefix and job name prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::HttpLoad => "http-load",
            TestKind::HttpLoadCustom => "http-load-custom",
            TestKind::CpuStress => "cpu-stress",
            TestKind::MemoryStress => "memory-stress",
            TestKind::ScalingBehavior => "scaling-behavior",
        }
    }

    /// True for workloads that run the k6 load generator (and therefore
    /// carry a script ConfigMap alongside the job)
    pub fn uses_load_generator(&self) -> bool {
        matches!(
            self,
            TestKind::HttpLoad | TestKind::HttpLoadCustom | TestKind::ScalingBehavior
        )
    }

    /// Name of the workload container inside the job pod
    pub fn container_name(&self) -> &'static str {
        if self.uses_load_generator() {
            "k6"
        } else {
            "stress"
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a test run
///
/// `CoolingDown` is an explicit phase between workload completion and the
/// terminal transition of a scaling test; it counts as active for
/// admission control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    Pending,
    Running,
    CoolingDown,
    Completed,
    Failed,
}

impl TestStatus {
    /// True while the run occupies the single admission slot
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TestStatus::Pending | TestStatus::Running | TestStatus::CoolingDown
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::CoolingDown => "cooling-down",
            TestStatus::Completed => "completed",
            TestStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for the HTTP load generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLoadConfig {
    /// Virtual user count
    #[serde(default = "default_vus")]
    pub vus: u32,
    /// Sustain duration, k6 notation (e.g. "30s", "2m")
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Target URL; the orchestrator default is applied when empty
    #[serde(default)]
    pub target_url: Option<String>,
    /// p95 latency threshold in milliseconds
    #[serde(default = "default_threshold_p95")]
    pub threshold_p95_ms: u32,
    /// Failed-request rate threshold (0.0..1.0)
    #[serde(default = "default_threshold_error_rate")]
    pub threshold_error_rate: f64,
    /// When set, the VU profile ramps up over this duration, sustains,
    /// then ramps back down over the same duration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_up: Option<String>,
}

fn default_vus() -> u32 {
    50
}

fn default_duration() -> String {
    "30s".to_string()
}

fn default_threshold_p95() -> u32 {
    2000
}

fn default_threshold_error_rate() -> f64 {
    0.5
}

impl Default for HttpLoadConfig {
    fn default() -> Self {
        Self {
            vus: default_vus(),
            duration: default_duration(),
            target_url: None,
            threshold_p95_ms: default_threshold_p95(),
            threshold_error_rate: default_threshold_error_rate(),
            ramp_up: None,
        }
    }
}

/// Parameters for the stress-ng workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    /// Worker count (cpu workers or vm workers, depending on kind)
    #[serde(default = "default_workers")]
    pub workers: u32,
    /// Run duration, stress-ng notation (e.g. "30s")
    #[serde(default = "default_duration")]
    pub timeout: String,
    /// Per-worker allocation size for memory stress (e.g. "64M")
    #[serde(default = "default_vm_bytes")]
    pub vm_bytes: String,
}

fn default_workers() -> u32 {
    1
}

fn default_vm_bytes() -> String {
    "64M".to_string()
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: default_duration(),
            vm_bytes: default_vm_bytes(),
        }
    }
}

/// Parameters for a scaling-behavior test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Load phase parameters
    #[serde(default = "default_scaling_load")]
    pub load: HttpLoadConfig,
    /// Post-workload observation window in seconds
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// When set, only these deployment names are considered when
    /// computing scaling metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_deployments: Option<Vec<String>>,
}

fn default_scaling_load() -> HttpLoadConfig {
    HttpLoadConfig {
        duration: "60s".to_string(),
        ..HttpLoadConfig::default()
    }
}

fn default_cooldown_secs() -> u64 {
    60
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            load: default_scaling_load(),
            cooldown_secs: default_cooldown_secs(),
            target_deployments: None,
        }
    }
}

/// Workload configuration, keyed by workload family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "workload", rename_all = "kebab-case")]
pub enum WorkloadConfig {
    HttpLoad(HttpLoadConfig),
    Stress(StressConfig),
    Scaling(ScalingConfig),
}

impl WorkloadConfig {
    /// Whether this configuration variant is valid for the given kind
    pub fn matches(&self, kind: TestKind) -> bool {
        match (self, kind) {
            (WorkloadConfig::HttpLoad(_), TestKind::HttpLoad | TestKind::HttpLoadCustom) => true,
            (WorkloadConfig::Stress(_), TestKind::CpuStress | TestKind::MemoryStress) => true,
            (WorkloadConfig::Scaling(_), TestKind::ScalingBehavior) => true,
            _ => false,
        }
    }

    /// Default configuration for a kind
    pub fn default_for(kind: TestKind) -> Self {
        match kind {
            TestKind::HttpLoad | TestKind::HttpLoadCustom => {
                WorkloadConfig::HttpLoad(HttpLoadConfig::default())
            }
            TestKind::CpuStress | TestKind::MemoryStress => {
                WorkloadConfig::Stress(StressConfig::default())
            }
            TestKind::ScalingBehavior => WorkloadConfig::Scaling(ScalingConfig::default()),
        }
    }
}

/// A single test run record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub kind: TestKind,
    pub cluster: String,
    pub status: TestStatus,
    /// Optional operator-supplied scenario label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Epoch milliseconds at admission
    pub started_at: i64,
    /// Epoch milliseconds at the terminal transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub config: WorkloadConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<TestResults>,
}

/// Numeric results extracted from workload logs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestResults {
    /// Tail of the workload container log
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99_latency_ms: Option<f64>,
    /// Failed-request rate (0.0..1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_bogo_ops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_bogo_ops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<ScalingTestMeta>,
}

/// One sampled autoscaler state for a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpaSnapshot {
    pub name: String,
    pub namespace: String,
    pub deployment: String,
    pub current_replicas: u32,
    pub desired_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_cpu_percent: Option<u32>,
    pub target_cpu_percent: u32,
}

impl HpaSnapshot {
    /// Baseline-map key: `namespace/deployment`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.deployment)
    }
}

/// One timestamped reading of all autoscaler states for a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingDataPoint {
    /// Capture time, epoch milliseconds
    pub timestamp: i64,
    pub hpas: Vec<HpaSnapshot>,
}

/// Derived scaling metrics attached to a scaling test's results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingTestMeta {
    /// Full snapshot series captured during the watch
    pub snapshots: Vec<ScalingDataPoint>,
    /// Epoch ms when the workload pod first reported running
    pub test_start: i64,
    /// Epoch ms when the workload reached a terminal pod state
    pub test_end: i64,
    /// Epoch ms when the cooldown window closed
    pub cooldown_end: i64,
    /// Delay from test start to the first replica increase over baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_up_latency_ms: Option<i64>,
    /// Maximum total in-scope replicas across the series
    pub peak_replicas: u32,
    /// Delay from test end to the first replica decrease below peak
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_down_started_ms: Option<i64>,
    /// Measured rps over the mean in-scope replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rps_per_replica: Option<f64>,
    /// Deployment names that were in scope for the computation
    pub target_deployments: Vec<String>,
}

/// Current epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_kebab_case() {
        let json = serde_json::to_string(&TestKind::ScalingBehavior).unwrap();
        assert_eq!(json, "\"scaling-behavior\"");

        let kind: TestKind = serde_json::from_str("\"cpu-stress\"").unwrap();
        assert_eq!(kind, TestKind::CpuStress);
    }

    #[test]
    fn test_status_active_set() {
        assert!(TestStatus::Pending.is_active());
        assert!(TestStatus::Running.is_active());
        assert!(TestStatus::CoolingDown.is_active());
        assert!(TestStatus::Completed.is_terminal());
        assert!(TestStatus::Failed.is_terminal());
    }

    #[test]
    fn test_workload_config_kind_pairing() {
        let load = WorkloadConfig::HttpLoad(HttpLoadConfig::default());
        assert!(load.matches(TestKind::HttpLoad));
        assert!(load.matches(TestKind::HttpLoadCustom));
        assert!(!load.matches(TestKind::CpuStress));
        assert!(!load.matches(TestKind::ScalingBehavior));

        let stress = WorkloadConfig::Stress(StressConfig::default());
        assert!(stress.matches(TestKind::MemoryStress));
        assert!(!stress.matches(TestKind::HttpLoad));

        let scaling = WorkloadConfig::Scaling(ScalingConfig::default());
        assert!(scaling.matches(TestKind::ScalingBehavior));
        assert!(!scaling.matches(TestKind::HttpLoad));
    }

    #[test]
    fn test_default_config_for_kind() {
        for kind in [
            TestKind::HttpLoad,
            TestKind::HttpLoadCustom,
            TestKind::CpuStress,
            TestKind::MemoryStress,
            TestKind::ScalingBehavior,
        ] {
            assert!(WorkloadConfig::default_for(kind).matches(kind));
        }
    }

    #[test]
    fn test_scaling_defaults() {
        let cfg = ScalingConfig::default();
        assert_eq!(cfg.cooldown_secs, 60);
        assert_eq!(cfg.load.duration, "60s");
        assert_eq!(cfg.load.vus, 50);
    }

    #[test]
    fn test_hpa_snapshot_key() {
        let hpa = HpaSnapshot {
            name: "web-hpa".to_string(),
            namespace: "demo".to_string(),
            deployment: "web".to_string(),
            current_replicas: 2,
            desired_replicas: 2,
            min_replicas: 1,
            max_replicas: 10,
            current_cpu_percent: Some(35),
            target_cpu_percent: 50,
        };
        assert_eq!(hpa.key(), "demo/web");
    }

    #[test]
    fn test_container_name_by_kind() {
        assert_eq!(TestKind::HttpLoad.container_name(), "k6");
        assert_eq!(TestKind::ScalingBehavior.container_name(), "k6");
        assert_eq!(TestKind::CpuStress.container_name(), "stress");
    }
}
