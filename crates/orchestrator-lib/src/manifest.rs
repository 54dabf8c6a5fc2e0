//! Workload manifest generation
//!
//! Pure mapping from (test kind, workload configuration) to the
//! declarative objects submitted to the control plane: a permissive
//! network policy for test-labeled pods, a ConfigMap holding the
//! generated k6 script for load workloads, and the batch job itself.
//! Submission is the caller's responsibility.

use crate::error::OrchestratorError;
use crate::models::{HttpLoadConfig, StressConfig, TestKind, WorkloadConfig};

/// Container image for the HTTP load generator
const K6_IMAGE: &str = "grafana/k6:latest";

/// Container image for the resource stressor
const STRESS_IMAGE: &str = "alexeiled/stress-ng:latest";

/// Pod label marking bench workloads, matched by the network policy
const TEST_LABEL: &str = "sre-test";

/// Fixed parameters applied to every generated manifest
#[derive(Debug, Clone)]
pub struct ManifestParams {
    /// Namespace all objects are created in
    pub namespace: String,
    /// Target URL applied when the load config leaves it unset
    pub default_target_url: String,
}

impl Default for ManifestParams {
    fn default() -> Self {
        Self {
            namespace: "demo".to_string(),
            default_target_url: "http://nginx-web.demo.svc.cluster.local".to_string(),
        }
    }
}

/// Name of the script ConfigMap that accompanies a load job
pub fn config_map_name(id: &str) -> String {
    format!("{id}-script")
}

/// Build the full manifest for a test run.
///
/// Returns `UnsupportedWorkload` when the configuration variant does not
/// match the kind.
pub fn build(
    id: &str,
    kind: TestKind,
    config: &WorkloadConfig,
    params: &ManifestParams,
) -> Result<String, OrchestratorError> {
    match (kind, config) {
        (TestKind::HttpLoad | TestKind::HttpLoadCustom, WorkloadConfig::HttpLoad(load)) => {
            Ok(k6_job(id, load, params))
        }
        (TestKind::ScalingBehavior, WorkloadConfig::Scaling(scaling)) => {
            Ok(k6_job(id, &scaling.load, params))
        }
        (TestKind::CpuStress, WorkloadConfig::Stress(stress)) => {
            let args = vec![
                "--cpu".to_string(),
                stress.workers.to_string(),
                "--timeout".to_string(),
                stress.timeout.clone(),
                "--metrics-brief".to_string(),
            ];
            Ok(stress_job(id, &args, &params.namespace))
        }
        (TestKind::MemoryStress, WorkloadConfig::Stress(stress)) => {
            let args = vec![
                "--vm".to_string(),
                stress.workers.to_string(),
                "--vm-bytes".to_string(),
                stress.vm_bytes.clone(),
                "--timeout".to_string(),
                stress.timeout.clone(),
                "--metrics-brief".to_string(),
            ];
            Ok(stress_job(id, &args, &params.namespace))
        }
        _ => Err(OrchestratorError::UnsupportedWorkload {
            kind: kind.to_string(),
        }),
    }
}

/// CiliumNetworkPolicy allowing test pods full egress and ingress plus
/// DNS, applied alongside every load job (idempotent under re-apply)
fn network_policy(namespace: &str) -> String {
    format!(
        r#"apiVersion: cilium.io/v2
kind: CiliumNetworkPolicy
metadata:
  name: allow-sre-tests
  namespace: {namespace}
spec:
  endpointSelector:
    matchLabels:
      {TEST_LABEL}: "true"
  ingress:
  - fromEntities:
    - cluster
    - world
  egress:
  - toEntities:
    - cluster
    - world
  - toEndpoints:
    - matchLabels:
        io.kubernetes.pod.namespace: kube-system
        k8s-app: kube-dns
    toPorts:
    - ports:
      - port: "53"
        protocol: ANY"#
    )
}

/// The k6 options block: flat VU profile, or ramp-up/sustain/ramp-down
/// stages when a ramp duration is configured
fn k6_options(load: &HttpLoadConfig) -> String {
    let thresholds = format!(
        "  thresholds: {{\n    http_req_duration: ['p(95)<{}'],\n    http_req_failed: ['rate<{}'],\n  }},",
        load.threshold_p95_ms, load.threshold_error_rate
    );

    match &load.ramp_up {
        Some(ramp) => format!(
            "  stages: [\n    {{ duration: '{ramp}', target: {vus} }},\n    {{ duration: '{duration}', target: {vus} }},\n    {{ duration: '{ramp}', target: 0 }},\n  ],\n{thresholds}",
            vus = load.vus,
            duration = load.duration,
        ),
        None => format!(
            "  vus: {},\n  duration: '{}',\n{thresholds}",
            load.vus, load.duration
        ),
    }
}

/// Generated k6 load script
fn k6_script(load: &HttpLoadConfig, target_url: &str) -> String {
    format!(
        r#"import http from 'k6/http';
import {{ check, sleep }} from 'k6';

export const options = {{
{options}
}};

export default function () {{
  const res = http.get('{target_url}');
  check(res, {{ 'status is 200': (r) => r.status === 200 }});
  sleep(0.1);
}}"#,
        options = k6_options(load),
    )
}

fn k6_job(id: &str, load: &HttpLoadConfig, params: &ManifestParams) -> String {
    let target_url = load
        .target_url
        .as_deref()
        .unwrap_or(&params.default_target_url);
    let script = k6_script(load, target_url);
    let indented: String = script
        .lines()
        .map(|l| format!("    {l}"))
        .collect::<Vec<_>>()
        .join("\n");
    let namespace = &params.namespace;
    let config_map = config_map_name(id);

    format!(
        r#"{policy}
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: {config_map}
  namespace: {namespace}
data:
  loadtest.js: |
{indented}
---
apiVersion: batch/v1
kind: Job
metadata:
  name: {id}
  namespace: {namespace}
spec:
  backoffLimit: 0
  ttlSecondsAfterFinished: 300
  template:
    metadata:
      labels:
        {TEST_LABEL}: "true"
      annotations:
        sidecar.istio.io/inject: "false"
    spec:
      restartPolicy: Never
      containers:
        - name: k6
          image: {K6_IMAGE}
          command: ["k6", "run", "--summary-trend-stats", "avg,min,med,max,p(90),p(95),p(99)", "/scripts/loadtest.js"]
          resources:
            requests:
              cpu: 100m
              memory: 64Mi
            limits:
              cpu: 500m
              memory: 256Mi
          volumeMounts:
            - name: script
              mountPath: /scripts
      volumes:
        - name: script
          configMap:
            name: {config_map}"#,
        policy = network_policy(namespace),
    )
}

fn stress_job(id: &str, args: &[String], namespace: &str) -> String {
    let rendered_args = args
        .iter()
        .map(|a| format!("\"{a}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"apiVersion: batch/v1
kind: Job
metadata:
  name: {id}
  namespace: {namespace}
spec:
  backoffLimit: 0
  ttlSecondsAfterFinished: 300
  template:
    metadata:
      labels:
        {TEST_LABEL}: "true"
      annotations:
        sidecar.istio.io/inject: "false"
    spec:
      restartPolicy: Never
      containers:
        - name: stress
          image: {STRESS_IMAGE}
          args: [{rendered_args}]
          resources:
            requests:
              cpu: 50m
              memory: 32Mi
            limits:
              cpu: "1"
              memory: 256Mi"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScalingConfig;

    fn params() -> ManifestParams {
        ManifestParams::default()
    }

    #[test]
    fn test_http_load_manifest_contains_all_objects() {
        let config = WorkloadConfig::HttpLoad(HttpLoadConfig::default());
        let yaml = build("http-load-abc", TestKind::HttpLoad, &config, &params()).unwrap();

        assert!(yaml.contains("kind: CiliumNetworkPolicy"));
        assert!(yaml.contains("kind: ConfigMap"));
        assert!(yaml.contains("kind: Job"));
        assert!(yaml.contains("name: http-load-abc-script"));
        assert!(yaml.contains("name: http-load-abc\n"));
        assert!(yaml.contains(K6_IMAGE));
        assert!(yaml.contains("vus: 50"));
        assert!(yaml.contains("duration: '30s'"));
        assert!(yaml.contains("http://nginx-web.demo.svc.cluster.local"));
    }

    #[test]
    fn test_custom_load_overrides() {
        let config = WorkloadConfig::HttpLoad(HttpLoadConfig {
            vus: 120,
            duration: "2m".to_string(),
            target_url: Some("http://api.demo.svc.cluster.local".to_string()),
            threshold_p95_ms: 500,
            threshold_error_rate: 0.1,
            ramp_up: None,
        });
        let yaml = build("http-load-custom-x", TestKind::HttpLoadCustom, &config, &params()).unwrap();

        assert!(yaml.contains("vus: 120"));
        assert!(yaml.contains("duration: '2m'"));
        assert!(yaml.contains("http://api.demo.svc.cluster.local"));
        assert!(yaml.contains("p(95)<500"));
        assert!(yaml.contains("rate<0.1"));
    }

    #[test]
    fn test_ramped_profile_uses_stages() {
        let config = WorkloadConfig::HttpLoad(HttpLoadConfig {
            ramp_up: Some("15s".to_string()),
            ..HttpLoadConfig::default()
        });
        let yaml = build("http-load-r", TestKind::HttpLoad, &config, &params()).unwrap();

        assert!(yaml.contains("stages:"));
        assert!(yaml.contains("{ duration: '15s', target: 50 }"));
        assert!(yaml.contains("{ duration: '15s', target: 0 }"));
        // Flat profile fields must not appear alongside stages
        assert!(!yaml.contains("vus: 50,"));
    }

    #[test]
    fn test_cpu_stress_args() {
        let config = WorkloadConfig::Stress(StressConfig {
            workers: 4,
            timeout: "45s".to_string(),
            vm_bytes: "64M".to_string(),
        });
        let yaml = build("cpu-stress-a", TestKind::CpuStress, &config, &params()).unwrap();

        assert!(yaml.contains(STRESS_IMAGE));
        assert!(yaml.contains("\"--cpu\", \"4\", \"--timeout\", \"45s\", \"--metrics-brief\""));
        assert!(!yaml.contains("--vm-bytes"));
        assert!(!yaml.contains("ConfigMap"));
    }

    #[test]
    fn test_memory_stress_args() {
        let config = WorkloadConfig::Stress(StressConfig {
            workers: 2,
            timeout: "30s".to_string(),
            vm_bytes: "128M".to_string(),
        });
        let yaml = build("memory-stress-a", TestKind::MemoryStress, &config, &params()).unwrap();

        assert!(yaml.contains("\"--vm\", \"2\", \"--vm-bytes\", \"128M\""));
    }

    #[test]
    fn test_scaling_test_renders_load_job() {
        let config = WorkloadConfig::Scaling(ScalingConfig::default());
        let yaml = build("scaling-behavior-z", TestKind::ScalingBehavior, &config, &params()).unwrap();

        assert!(yaml.contains(K6_IMAGE));
        assert!(yaml.contains("duration: '60s'"));
    }

    #[test]
    fn test_mismatched_config_is_rejected() {
        let config = WorkloadConfig::Stress(StressConfig::default());
        let err = build("http-load-bad", TestKind::HttpLoad, &config, &params()).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnsupportedWorkload { .. }));
    }

    #[test]
    fn test_custom_namespace_is_applied_everywhere() {
        let p = ManifestParams {
            namespace: "bench".to_string(),
            ..ManifestParams::default()
        };
        let config = WorkloadConfig::HttpLoad(HttpLoadConfig::default());
        let yaml = build("http-load-ns", TestKind::HttpLoad, &config, &p).unwrap();

        assert_eq!(yaml.matches("namespace: bench").count(), 3);
        assert!(!yaml.contains("namespace: demo"));
    }
}
