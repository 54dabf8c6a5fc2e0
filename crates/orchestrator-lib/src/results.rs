//! Result collection after workload termination
//!
//! Fetches the workload container's logs from the control plane and
//! delegates to the format-specific parser for the test's workload
//! family. The script ConfigMap is cleaned up best-effort afterwards.

use crate::control_plane::ControlPlane;
use crate::manifest;
use crate::models::{TestKind, TestResults, TestRun};
use crate::parsers;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ResultCollector {
    control_plane: Arc<dyn ControlPlane>,
}

impl ResultCollector {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self { control_plane }
    }

    /// Fetch and parse the workload's output.
    ///
    /// Errors here become `ResultCollectionFailed` on the test run; the
    /// ConfigMap cleanup never escalates.
    pub async fn collect(&self, test: &TestRun) -> Result<TestResults> {
        let container = test.kind.container_name();
        let logs = self
            .control_plane
            .job_logs(&test.cluster, &test.id, container)
            .await
            .context("log fetch failed")?;

        let mut results = TestResults {
            raw_output: logs.clone(),
            ..TestResults::default()
        };

        match test.kind {
            TestKind::HttpLoad | TestKind::HttpLoadCustom | TestKind::ScalingBehavior => {
                parsers::k6::parse_into(&logs, &mut results);
            }
            TestKind::CpuStress | TestKind::MemoryStress => {
                parsers::stress_ng::parse_into(&logs, &mut results);
            }
        }

        debug!(id = %test.id, rps = ?results.rps, "Collected workload results");

        if test.kind.uses_load_generator() {
            let name = manifest::config_map_name(&test.id);
            if let Err(e) = self
                .control_plane
                .delete_config_map(&test.cluster, &name)
                .await
            {
                warn!(id = %test.id, error = %e, "Script ConfigMap cleanup failed");
            }
        }

        Ok(results)
    }
}
