//! Orchestrator configuration

use anyhow::Result;
use serde::Deserialize;

/// Orchestrator configuration, read from `BENCH_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding one kubeconfig per cluster (`<name>.yaml`)
    #[serde(default = "default_kubeconfig_dir")]
    pub kubeconfig_dir: String,

    /// Namespace all workload objects are created in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Comma-separated cluster names the orchestrator manages
    #[serde(default = "default_clusters")]
    pub clusters: String,

    /// Autoscaler sampling cadence in seconds
    #[serde(default = "default_scaling_interval")]
    pub scaling_interval_secs: u64,

    /// Target URL applied when a load config leaves it unset
    #[serde(default = "default_target_url")]
    pub default_target_url: String,
}

fn default_api_port() -> u16 {
    8080
}

fn default_kubeconfig_dir() -> String {
    "/etc/bench/kubeconfig".to_string()
}

fn default_namespace() -> String {
    "demo".to_string()
}

fn default_clusters() -> String {
    "local".to_string()
}

fn default_scaling_interval() -> u64 {
    5
}

fn default_target_url() -> String {
    "http://nginx-web.demo.svc.cluster.local".to_string()
}

impl OrchestratorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("BENCH"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| Self {
            api_port: default_api_port(),
            kubeconfig_dir: default_kubeconfig_dir(),
            namespace: default_namespace(),
            clusters: default_clusters(),
            scaling_interval_secs: default_scaling_interval(),
            default_target_url: default_target_url(),
        }))
    }

    /// Cluster names parsed from the comma-separated list
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
