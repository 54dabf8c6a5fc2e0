//! Test orchestration facade
//!
//! Ties admission, manifest generation, submission, and watcher spawn
//! into the two operations the API exposes: start a test and delete a
//! test. Admission and manifest validation fail synchronously; an apply
//! failure is recorded on the run itself, which still vacates the
//! single-flight slot because the run is terminal.

use crate::control_plane::ControlPlane;
use crate::error::OrchestratorError;
use crate::manifest::{self, ManifestParams};
use crate::models::{now_millis, TestKind, TestRun, TestStatus, WorkloadConfig};
use crate::observability::OrchestratorMetrics;
use crate::registry::TestRegistry;
use crate::results::ResultCollector;
use crate::scaling::ScalingHistory;
use crate::watcher::{self, scaling::ScalingWatchContext, WatchContext, WatchSettings};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request body for test creation
#[derive(Debug, Clone, Deserialize)]
pub struct TestRequest {
    pub kind: TestKind,
    pub cluster: String,
    #[serde(default)]
    pub scenario: Option<String>,
    /// Workload parameters; the kind's defaults apply when omitted
    #[serde(default)]
    pub config: Option<WorkloadConfig>,
}

/// Tunables shared by every test run
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub namespace: String,
    pub default_target_url: String,
    pub poll_interval: Duration,
    /// Wall-clock bound for load and stress tests
    pub load_timeout: Duration,
    /// Wall-clock bound for scaling tests, spanning load plus cooldown
    pub scaling_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            namespace: "demo".to_string(),
            default_target_url: "http://nginx-web.demo.svc.cluster.local".to_string(),
            poll_interval: Duration::from_secs(2),
            load_timeout: Duration::from_secs(300),
            scaling_timeout: Duration::from_secs(480),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: TestRegistry,
    control_plane: Arc<dyn ControlPlane>,
    scaling: ScalingHistory,
    settings: Arc<OrchestratorSettings>,
    metrics: OrchestratorMetrics,
}

impl Orchestrator {
    pub fn new(
        registry: TestRegistry,
        control_plane: Arc<dyn ControlPlane>,
        scaling: ScalingHistory,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            control_plane,
            scaling,
            settings: Arc::new(settings),
            metrics: OrchestratorMetrics::new(),
        }
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn scaling_history(&self) -> &ScalingHistory {
        &self.scaling
    }

    /// Admit and launch a test run.
    ///
    /// Returns the pending record on success. When the manifest apply
    /// fails the record is returned in `failed` status instead; only
    /// admission and validation errors surface as `Err`.
    pub async fn start_test(&self, request: TestRequest) -> Result<TestRun, OrchestratorError> {
        let config = request
            .config
            .unwrap_or_else(|| WorkloadConfig::default_for(request.kind));

        let test = match self
            .registry
            .admit(request.kind, &request.cluster, request.scenario, config)
            .await
        {
            Ok(test) => test,
            Err(e) => {
                self.metrics.inc_tests_rejected();
                return Err(e);
            }
        };

        let params = ManifestParams {
            namespace: self.settings.namespace.clone(),
            default_target_url: self.settings.default_target_url.clone(),
        };
        let manifest = match manifest::build(&test.id, test.kind, &test.config, &params) {
            Ok(manifest) => manifest,
            Err(e) => {
                // Nothing was created; vacate the slot entirely
                self.registry.remove(&test.id).await;
                return Err(e);
            }
        };

        let apply_started = Instant::now();
        if let Err(e) = self.control_plane.apply(&test.cluster, &manifest).await {
            let error = OrchestratorError::ApplyFailed(e.to_string());
            warn!(id = %test.id, cluster = %test.cluster, "{error}");
            self.metrics.test_finished(true);
            self.registry
                .update(&test.id, |t| {
                    t.status = TestStatus::Failed;
                    t.error = Some(error.to_string());
                    t.completed_at = Some(now_millis());
                })
                .await;
            return Ok(self.registry.get(&test.id).await.unwrap_or(test));
        }
        self.metrics
            .observe_apply_duration(apply_started.elapsed().as_secs_f64());
        self.metrics.inc_tests_started();

        let handle = self.spawn_watcher(&test);
        self.registry.attach_watcher(&test.id, handle).await;

        info!(id = %test.id, kind = %test.kind, cluster = %test.cluster, "Test run launched");
        Ok(test)
    }

    fn spawn_watcher(&self, test: &TestRun) -> watcher::WatcherHandle {
        let base = WatchContext {
            id: test.id.clone(),
            cluster: test.cluster.clone(),
            registry: self.registry.clone(),
            control_plane: self.control_plane.clone(),
            collector: ResultCollector::new(self.control_plane.clone()),
            settings: WatchSettings {
                poll_interval: self.settings.poll_interval,
                timeout: if test.kind == TestKind::ScalingBehavior {
                    self.settings.scaling_timeout
                } else {
                    self.settings.load_timeout
                },
            },
            metrics: self.metrics.clone(),
        };

        match &test.config {
            WorkloadConfig::Scaling(config) => watcher::scaling::spawn(ScalingWatchContext {
                base,
                history: self.scaling.clone(),
                cooldown: Duration::from_secs(config.cooldown_secs),
                target_deployments: config.target_deployments.clone(),
            }),
            _ => watcher::spawn(base),
        }
    }

    /// Delete a test run: cancel its watcher, drop the record, and clean
    /// up cluster objects in the background. Returns false for an
    /// unknown id.
    pub async fn delete_test(&self, id: &str) -> bool {
        let Some(test) = self.registry.remove(id).await else {
            return false;
        };

        info!(id = %test.id, "Test run deleted");
        let control_plane = self.control_plane.clone();
        tokio::spawn(async move {
            if let Err(e) = control_plane.delete_job(&test.cluster, &test.id).await {
                warn!(id = %test.id, error = %e, "Job cleanup failed");
            }
            if test.kind.uses_load_generator() {
                let name = manifest::config_map_name(&test.id);
                if let Err(e) = control_plane.delete_config_map(&test.cluster, &name).await {
                    warn!(id = %test.id, error = %e, "ConfigMap cleanup failed");
                }
            }
        });
        true
    }
}
