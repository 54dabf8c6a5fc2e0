//! Scaling-behavior watcher
//!
//! Extends the plain lifecycle watch with three phases: a baseline
//! capture before the load starts, snapshot accumulation while the
//! workload runs, and a cooldown window after it terminates during
//! which the autoscaler's scale-down is still observed. Only after the
//! cooldown closes are the derived metrics computed and the run settled.

use crate::error::OrchestratorError;
use crate::models::{now_millis, ScalingDataPoint, TestResults, TestStatus};
use crate::scaling::metrics::{self, MetricsInput};
use crate::scaling::ScalingHistory;
use crate::watcher::{WatchContext, WatcherHandle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

pub struct ScalingWatchContext {
    pub base: WatchContext,
    pub history: ScalingHistory,
    pub cooldown: Duration,
    pub target_deployments: Option<Vec<String>>,
}

/// Spawn the watcher task for a scaling-behavior test
pub fn spawn(ctx: ScalingWatchContext) -> WatcherHandle {
    let (cancel, rx) = broadcast::channel(1);
    tokio::spawn(run(ctx, rx));
    WatcherHandle { cancel }
}

#[derive(Default)]
struct Progress {
    snapshots: Vec<ScalingDataPoint>,
    baseline: HashMap<String, u32>,
    last_snapshot_ts: i64,
    test_start: Option<i64>,
    test_end: Option<i64>,
    results: Option<TestResults>,
    workload_failed: bool,
    collection_error: Option<String>,
    cooldown_started: Option<Instant>,
}

async fn run(ctx: ScalingWatchContext, mut cancel: broadcast::Receiver<()>) {
    let mut progress = Progress::default();

    // Baseline: the most recent autoscaler sample taken before the load
    // started. Deployments absent here can never register a scale-up.
    if let Some(seed) = ctx.history.latest(&ctx.base.cluster).await {
        for hpa in &seed.hpas {
            progress.baseline.insert(hpa.key(), hpa.current_replicas);
        }
        progress.last_snapshot_ts = seed.timestamp;
        progress.snapshots.push(seed);
    } else {
        debug!(id = %ctx.base.id, "No baseline sample available yet");
    }

    debug!(id = %ctx.base.id, cluster = %ctx.base.cluster, "Scaling watcher started");
    let started = Instant::now();
    let mut ticker = interval(ctx.base.settings.poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if tick(&ctx, &mut progress, started).await {
                    break;
                }
            }
            _ = cancel.recv() => {
                debug!(id = %ctx.base.id, "Scaling watcher cancelled");
                break;
            }
        }
    }

    ctx.base.registry.detach_watcher(&ctx.base.id).await;
}

/// One poll cycle; returns true when the watch is finished
async fn tick(ctx: &ScalingWatchContext, progress: &mut Progress, started: Instant) -> bool {
    let Some(test) = ctx.base.registry.get(&ctx.base.id).await else {
        return true;
    };
    if !test.status.is_active() {
        return true;
    }

    // The deadline spans load plus cooldown
    if started.elapsed() >= ctx.base.settings.timeout {
        let error = OrchestratorError::Timeout {
            limit_secs: ctx.base.settings.timeout.as_secs(),
        };
        warn!(id = %ctx.base.id, "{error}");
        ctx.base
            .registry
            .update(&ctx.base.id, |t| {
                t.status = TestStatus::Failed;
                t.error = Some(error.to_string());
                t.completed_at = Some(now_millis());
            })
            .await;
        if let Err(e) = ctx
            .base
            .control_plane
            .delete_job(&ctx.base.cluster, &ctx.base.id)
            .await
        {
            warn!(id = %ctx.base.id, error = %e, "Timed-out job cleanup failed");
        }
        ctx.base.metrics.test_finished(true);
        return true;
    }

    // Accumulate any sample the collector recorded since the last tick
    if let Some(point) = ctx.history.latest(&ctx.base.cluster).await {
        if point.timestamp > progress.last_snapshot_ts {
            progress.last_snapshot_ts = point.timestamp;
            progress.snapshots.push(point);
        }
    }

    if let Some(cooldown_started) = progress.cooldown_started {
        if cooldown_started.elapsed() >= ctx.cooldown {
            finalize(ctx, progress).await;
            return true;
        }
        return false;
    }

    let observation = match ctx
        .base
        .control_plane
        .job_pod(&ctx.base.cluster, &ctx.base.id)
        .await
    {
        Ok(Some(obs)) => obs,
        Ok(None) => return false,
        Err(e) => {
            debug!(id = %ctx.base.id, error = %e, "Pod poll failed");
            ctx.base.metrics.inc_poll_errors();
            return false;
        }
    };

    if observation.is_terminal() {
        progress.test_start.get_or_insert_with(now_millis);
        progress.test_end = Some(now_millis());
        progress.workload_failed = observation.is_failure();

        match ctx.base.collector.collect(&test).await {
            Ok(results) => progress.results = Some(results),
            Err(e) => {
                progress.collection_error =
                    Some(OrchestratorError::ResultCollection(e.to_string()).to_string());
            }
        }

        ctx.base
            .registry
            .update(&ctx.base.id, |t| t.status = TestStatus::CoolingDown)
            .await;
        progress.cooldown_started = Some(Instant::now());
        debug!(id = %ctx.base.id, "Load finished, cooldown started");
        return false;
    }

    if observation.phase == crate::control_plane::PodPhase::Running
        && progress.test_start.is_none()
    {
        progress.test_start = Some(now_millis());
        ctx.base
            .registry
            .update(&ctx.base.id, |t| t.status = TestStatus::Running)
            .await;
    }

    false
}

/// Compute the derived metrics and settle the record
async fn finalize(ctx: &ScalingWatchContext, progress: &mut Progress) {
    let test_start = progress.test_start.unwrap_or(progress.last_snapshot_ts);
    let test_end = progress.test_end.unwrap_or_else(now_millis);
    let meta = metrics::compute(&MetricsInput {
        snapshots: &progress.snapshots,
        test_start,
        test_end,
        cooldown_end: now_millis(),
        baseline: &progress.baseline,
        rps: progress.results.as_ref().and_then(|r| r.rps),
        target_deployments: ctx.target_deployments.as_deref(),
    });

    let mut results = progress.results.take().unwrap_or_default();
    results.scaling = Some(meta);

    let failed = progress.workload_failed || progress.collection_error.is_some();
    let error = progress
        .collection_error
        .take()
        .or_else(|| failed.then(|| "workload exited with failure".to_string()));

    let updated = ctx
        .base
        .registry
        .update(&ctx.base.id, |t| {
            t.status = if failed {
                TestStatus::Failed
            } else {
                TestStatus::Completed
            };
            t.results = Some(results);
            t.error = error;
            t.completed_at = Some(now_millis());
        })
        .await;

    if updated {
        ctx.base.metrics.test_finished(failed);
        info!(id = %ctx.base.id, failed, "Scaling test finished");
    }
}
