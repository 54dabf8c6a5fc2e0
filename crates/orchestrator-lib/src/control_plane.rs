//! Control-plane command interface
//!
//! The orchestrator drives the cluster through a small command set:
//! apply a manifest, inspect the pod behind a job, fetch job logs,
//! delete job/config objects, and sample autoscaler state. The trait is
//! the seam used by watchers and tests; `KubectlClient` is the real
//! implementation shelling out to kubectl with a per-cluster kubeconfig.

use crate::models::HpaSnapshot;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Pod phase as reported by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// Observation of the pod backing a job
#[derive(Debug, Clone)]
pub struct PodObservation {
    pub phase: PodPhase,
    /// Exit code of the workload container if it has terminated, even
    /// when the pod phase still reports running (sidecars)
    pub terminated_exit_code: Option<i32>,
}

impl PodObservation {
    /// True once the workload is done, regardless of sidecar state
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, PodPhase::Succeeded | PodPhase::Failed)
            || self.terminated_exit_code.is_some()
    }

    /// True when the terminal observation indicates failure
    pub fn is_failure(&self) -> bool {
        self.phase == PodPhase::Failed || self.terminated_exit_code.is_some_and(|code| code != 0)
    }
}

/// Command interface against the cluster control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Submit a manifest for creation
    async fn apply(&self, cluster: &str, manifest: &str) -> Result<()>;

    /// Observe the pod labeled with the given job name; `None` when no
    /// pod exists yet
    async fn job_pod(&self, cluster: &str, job: &str) -> Result<Option<PodObservation>>;

    /// Tail the logs of a job's container
    async fn job_logs(&self, cluster: &str, job: &str, container: &str) -> Result<String>;

    /// Delete a job, idempotent on not-found
    async fn delete_job(&self, cluster: &str, job: &str) -> Result<()>;

    /// Delete a ConfigMap, idempotent on not-found
    async fn delete_config_map(&self, cluster: &str, name: &str) -> Result<()>;

    /// Sample the current autoscaler state across all namespaces
    async fn hpa_state(&self, cluster: &str) -> Result<Vec<HpaSnapshot>>;
}

/// kubectl-backed control-plane client
///
/// Kubeconfigs are expected at `<kubeconfig_dir>/<cluster>.yaml`.
pub struct KubectlClient {
    kubeconfig_dir: PathBuf,
    namespace: String,
    command_timeout: Duration,
}

impl KubectlClient {
    pub fn new(kubeconfig_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            kubeconfig_dir: kubeconfig_dir.into(),
            namespace: namespace.into(),
            command_timeout: Duration::from_secs(15),
        }
    }

    fn kubeconfig(&self, cluster: &str) -> PathBuf {
        self.kubeconfig_dir.join(format!("{cluster}.yaml"))
    }

    /// Run kubectl with the cluster's kubeconfig, optionally piping
    /// stdin, returning stdout on success
    async fn run(&self, cluster: &str, args: &[&str], stdin: Option<&str>) -> Result<String> {
        let kubeconfig = self.kubeconfig(cluster);
        let mut cmd = Command::new("kubectl");
        cmd.arg("--kubeconfig")
            .arg(&kubeconfig)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().context("failed to spawn kubectl")?;

        if let Some(input) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .context("kubectl stdin pipe unavailable")?;
            pipe.write_all(input.as_bytes())
                .await
                .context("failed to write manifest to kubectl")?;
            drop(pipe);
        }

        let output = tokio::time::timeout(self.command_timeout, child.wait_with_output())
            .await
            .context("kubectl timed out")?
            .context("kubectl did not run")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("kubectl {}: {}", args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ControlPlane for KubectlClient {
    async fn apply(&self, cluster: &str, manifest: &str) -> Result<()> {
        self.run(cluster, &["apply", "-f", "-"], Some(manifest))
            .await?;
        Ok(())
    }

    async fn job_pod(&self, cluster: &str, job: &str) -> Result<Option<PodObservation>> {
        let selector = format!("job-name={job}");
        let stdout = self
            .run(
                cluster,
                &[
                    "get", "pods", "-n", &self.namespace, "-l", &selector, "-o", "json",
                ],
                None,
            )
            .await?;

        let data: Value = serde_json::from_str(&stdout).context("invalid pod list JSON")?;
        let Some(pod) = data["items"].get(0) else {
            return Ok(None);
        };

        let phase = pod["status"]["phase"]
            .as_str()
            .map(PodPhase::parse)
            .unwrap_or(PodPhase::Unknown);
        let terminated_exit_code = pod["status"]["containerStatuses"]
            .get(0)
            .and_then(|cs| cs["state"]["terminated"]["exitCode"].as_i64())
            .map(|code| code as i32);

        Ok(Some(PodObservation {
            phase,
            terminated_exit_code,
        }))
    }

    async fn job_logs(&self, cluster: &str, job: &str, container: &str) -> Result<String> {
        let target = format!("job/{job}");
        self.run(
            cluster,
            &[
                "logs",
                &target,
                "-c",
                container,
                "-n",
                &self.namespace,
                "--tail=500",
            ],
            None,
        )
        .await
    }

    async fn delete_job(&self, cluster: &str, job: &str) -> Result<()> {
        self.run(
            cluster,
            &[
                "delete",
                "job",
                job,
                "-n",
                &self.namespace,
                "--ignore-not-found",
            ],
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete_config_map(&self, cluster: &str, name: &str) -> Result<()> {
        self.run(
            cluster,
            &[
                "delete",
                "configmap",
                name,
                "-n",
                &self.namespace,
                "--ignore-not-found",
            ],
            None,
        )
        .await?;
        Ok(())
    }

    async fn hpa_state(&self, cluster: &str) -> Result<Vec<HpaSnapshot>> {
        let stdout = self
            .run(cluster, &["get", "hpa", "-A", "-o", "json"], None)
            .await?;
        let data: Value = serde_json::from_str(&stdout).context("invalid HPA list JSON")?;

        let mut hpas = Vec::new();
        for item in data["items"].as_array().unwrap_or(&Vec::new()) {
            hpas.push(parse_hpa_item(item));
        }
        debug!(cluster, count = hpas.len(), "Sampled HPA state");
        Ok(hpas)
    }
}

/// Decode a single HPA object from the control plane's JSON
fn parse_hpa_item(item: &Value) -> HpaSnapshot {
    let spec = &item["spec"];
    let status = &item["status"];

    let mut target_cpu = 50;
    for metric in spec["metrics"].as_array().unwrap_or(&Vec::new()) {
        if metric["type"] == "Resource" && metric["resource"]["name"] == "cpu" {
            if let Some(v) = metric["resource"]["target"]["averageUtilization"].as_u64() {
                target_cpu = v as u32;
            }
        }
    }

    let mut current_cpu = None;
    for metric in status["currentMetrics"].as_array().unwrap_or(&Vec::new()) {
        if metric["type"] == "Resource" && metric["resource"]["name"] == "cpu" {
            current_cpu = metric["resource"]["current"]["averageUtilization"]
                .as_u64()
                .map(|v| v as u32);
        }
    }

    HpaSnapshot {
        name: item["metadata"]["name"].as_str().unwrap_or("").to_string(),
        namespace: item["metadata"]["namespace"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        deployment: spec["scaleTargetRef"]["name"]
            .as_str()
            .unwrap_or("unknown")
            .to_string(),
        current_replicas: status["currentReplicas"].as_u64().unwrap_or(0) as u32,
        desired_replicas: status["desiredReplicas"].as_u64().unwrap_or(0) as u32,
        min_replicas: spec["minReplicas"].as_u64().unwrap_or(1) as u32,
        max_replicas: spec["maxReplicas"].as_u64().unwrap_or(1) as u32,
        current_cpu_percent: current_cpu,
        target_cpu_percent: target_cpu,
    }
}
