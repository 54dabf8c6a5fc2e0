//! Per-test lifecycle watchers
//!
//! Every admitted test is driven by a dedicated watcher task that polls
//! the control plane for the job's pod, promotes the registry record
//! through its status transitions, and collects results once the
//! workload terminates. Watchers are cancellable through the handle the
//! registry holds; a cancelled watcher stops without touching the record
//! again.

pub mod scaling;

use crate::control_plane::ControlPlane;
use crate::error::OrchestratorError;
use crate::models::{now_millis, TestStatus};
use crate::observability::OrchestratorMetrics;
use crate::registry::TestRegistry;
use crate::results::ResultCollector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

/// Polling cadence and overall deadline for one watch
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Cancellation handle for a running watcher task
pub struct WatcherHandle {
    cancel: broadcast::Sender<()>,
}

impl WatcherHandle {
    pub fn cancel(&self) {
        // No receiver means the task already exited
        let _ = self.cancel.send(());
    }
}

/// Everything a watcher task needs to drive one test
pub struct WatchContext {
    pub id: String,
    pub cluster: String,
    pub registry: TestRegistry,
    pub control_plane: Arc<dyn ControlPlane>,
    pub collector: ResultCollector,
    pub settings: WatchSettings,
    pub metrics: OrchestratorMetrics,
}

/// Spawn the watcher task for a load or stress test
pub fn spawn(ctx: WatchContext) -> WatcherHandle {
    let (cancel, rx) = broadcast::channel(1);
    tokio::spawn(run(ctx, rx));
    WatcherHandle { cancel }
}

async fn run(ctx: WatchContext, mut cancel: broadcast::Receiver<()>) {
    debug!(id = %ctx.id, cluster = %ctx.cluster, "Watcher started");
    let started = Instant::now();
    let mut ticker = interval(ctx.settings.poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tick(&ctx, started).await {
                    break;
                }
            }
            _ = cancel.recv() => {
                debug!(id = %ctx.id, "Watcher cancelled");
                break;
            }
        }
    }

    ctx.registry.detach_watcher(&ctx.id).await;
}

/// One poll cycle; returns true when the watch is finished
async fn tick(ctx: &WatchContext, started: Instant) -> bool {
    let Some(test) = ctx.registry.get(&ctx.id).await else {
        return true;
    };
    if !test.status.is_active() {
        return true;
    }

    if started.elapsed() >= ctx.settings.timeout {
        let error = OrchestratorError::Timeout {
            limit_secs: ctx.settings.timeout.as_secs(),
        };
        warn!(id = %ctx.id, "{error}");
        ctx.registry
            .update(&ctx.id, |t| {
                t.status = TestStatus::Failed;
                t.error = Some(error.to_string());
                t.completed_at = Some(now_millis());
            })
            .await;
        if let Err(e) = ctx.control_plane.delete_job(&ctx.cluster, &ctx.id).await {
            warn!(id = %ctx.id, error = %e, "Timed-out job cleanup failed");
        }
        ctx.metrics.test_finished(true);
        return true;
    }

    let observation = match ctx.control_plane.job_pod(&ctx.cluster, &ctx.id).await {
        Ok(Some(obs)) => obs,
        Ok(None) => return false,
        Err(e) => {
            // Transient control-plane hiccup; the next tick retries
            debug!(id = %ctx.id, error = %e, "Pod poll failed");
            ctx.metrics.inc_poll_errors();
            return false;
        }
    };

    if observation.is_terminal() {
        finish(ctx, observation.is_failure()).await;
        return true;
    }

    if observation.phase == crate::control_plane::PodPhase::Running
        && test.status == TestStatus::Pending
    {
        ctx.registry
            .update(&ctx.id, |t| t.status = TestStatus::Running)
            .await;
    }

    false
}

/// Collect results and settle the record in a terminal status
async fn finish(ctx: &WatchContext, workload_failed: bool) {
    let Some(test) = ctx.registry.get(&ctx.id).await else {
        return;
    };

    let (results, error) = match ctx.collector.collect(&test).await {
        Ok(results) => (Some(results), None),
        Err(e) => (
            None,
            Some(OrchestratorError::ResultCollection(e.to_string()).to_string()),
        ),
    };

    let failed = workload_failed || error.is_some();
    let updated = ctx
        .registry
        .update(&ctx.id, |t| {
            t.status = if failed {
                TestStatus::Failed
            } else {
                TestStatus::Completed
            };
            t.results = results;
            if let Some(error) = error {
                t.error = Some(error);
            } else if workload_failed {
                t.error = Some("workload exited with failure".to_string());
            }
            t.completed_at = Some(now_millis());
        })
        .await;

    if updated {
        ctx.metrics.test_finished(failed);
        info!(id = %ctx.id, failed, "Test run finished");
    }
}
