//! Per-cluster scaling history
//!
//! An independent collection loop samples autoscaler state for every
//! configured cluster at a fixed cadence and appends it to a bounded
//! per-cluster ring buffer. The orchestrator's scaling watcher only
//! reads this buffer; it never writes.

use crate::control_plane::ControlPlane;
use crate::models::{now_millis, ScalingDataPoint};
use crate::observability::OrchestratorMetrics;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info};

/// Retained points per cluster: ~30 minutes at the 5 s default cadence
const MAX_POINTS: usize = 360;

/// Clone-shared handle over the per-cluster snapshot ring buffers
#[derive(Clone, Default)]
pub struct ScalingHistory {
    buffers: Arc<RwLock<HashMap<String, VecDeque<ScalingDataPoint>>>>,
}

impl ScalingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point, evicting the oldest once the buffer is full
    pub async fn record(&self, cluster: &str, point: ScalingDataPoint) {
        let mut buffers = self.buffers.write().await;
        let buffer = buffers.entry(cluster.to_string()).or_default();
        while buffer.len() >= MAX_POINTS {
            buffer.pop_front();
        }
        buffer.push_back(point);
    }

    /// Most recent point for a cluster, if any
    pub async fn latest(&self, cluster: &str) -> Option<ScalingDataPoint> {
        self.buffers
            .read()
            .await
            .get(cluster)
            .and_then(|b| b.back().cloned())
    }

    /// Full retained series for a cluster, oldest first
    pub async fn series(&self, cluster: &str) -> Vec<ScalingDataPoint> {
        self.buffers
            .read()
            .await
            .get(cluster)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, cluster: &str) -> usize {
        self.buffers
            .read()
            .await
            .get(cluster)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

/// Timer-driven loop sampling HPA state for every configured cluster
pub struct ScalingCollector {
    control_plane: Arc<dyn ControlPlane>,
    history: ScalingHistory,
    clusters: Vec<String>,
    sample_interval: Duration,
    metrics: OrchestratorMetrics,
}

impl ScalingCollector {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        history: ScalingHistory,
        clusters: Vec<String>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            control_plane,
            history,
            clusters,
            sample_interval,
            metrics: OrchestratorMetrics::new(),
        }
    }

    /// Run until the shutdown channel fires
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            clusters = self.clusters.len(),
            interval_secs = self.sample_interval.as_secs(),
            "Starting scaling history collector"
        );

        let mut ticker = interval(self.sample_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample_all().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scaling history collector");
                    break;
                }
            }
        }
    }

    /// Sample every cluster; unreachable clusters are skipped until the
    /// next tick
    pub async fn sample_all(&self) {
        for cluster in &self.clusters {
            match self.control_plane.hpa_state(cluster).await {
                Ok(hpas) => {
                    let point = ScalingDataPoint {
                        timestamp: now_millis(),
                        hpas,
                    };
                    self.history.record(cluster, point).await;
                    self.metrics.inc_scaling_samples();
                }
                Err(e) => {
                    debug!(cluster = %cluster, error = %e, "Scaling sample failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::testing::MockControlPlane;
    use crate::models::HpaSnapshot;

    fn point(ts: i64) -> ScalingDataPoint {
        ScalingDataPoint {
            timestamp: ts,
            hpas: vec![],
        }
    }

    fn hpa(deployment: &str, replicas: u32) -> HpaSnapshot {
        HpaSnapshot {
            name: format!("{deployment}-hpa"),
            namespace: "demo".to_string(),
            deployment: deployment.to_string(),
            current_replicas: replicas,
            desired_replicas: replicas,
            min_replicas: 1,
            max_replicas: 10,
            current_cpu_percent: None,
            target_cpu_percent: 50,
        }
    }

    #[tokio::test]
    async fn test_latest_and_series_ordering() {
        let history = ScalingHistory::new();
        history.record("east", point(1)).await;
        history.record("east", point(2)).await;
        history.record("east", point(3)).await;

        assert_eq!(history.latest("east").await.unwrap().timestamp, 3);
        let series = history.series("east").await;
        assert_eq!(
            series.iter().map(|p| p.timestamp).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_empty() {
        let history = ScalingHistory::new();
        assert!(history.latest("nowhere").await.is_none());
        assert!(history.series("nowhere").await.is_empty());
    }

    #[tokio::test]
    async fn test_ring_buffer_eviction() {
        let history = ScalingHistory::new();
        for i in 0..(MAX_POINTS as i64 + 20) {
            history.record("east", point(i)).await;
        }

        assert_eq!(history.len("east").await, MAX_POINTS);
        // Oldest entries were evicted
        assert_eq!(history.series("east").await[0].timestamp, 20);
    }

    #[tokio::test]
    async fn test_clusters_are_isolated() {
        let history = ScalingHistory::new();
        history.record("east", point(1)).await;
        history.record("west", point(9)).await;

        assert_eq!(history.latest("east").await.unwrap().timestamp, 1);
        assert_eq!(history.latest("west").await.unwrap().timestamp, 9);
    }

    #[tokio::test]
    async fn test_sample_all_records_reachable_clusters() {
        let control = Arc::new(MockControlPlane::new());
        control.set_hpas(vec![hpa("web", 2)]).await;

        let history = ScalingHistory::new();
        let collector = ScalingCollector::new(
            control,
            history.clone(),
            vec!["east".to_string()],
            Duration::from_secs(5),
        );
        collector.sample_all().await;

        let latest = history.latest("east").await.unwrap();
        assert_eq!(latest.hpas.len(), 1);
        assert_eq!(latest.hpas[0].deployment, "web");
    }

    #[tokio::test]
    async fn test_sample_all_swallows_errors() {
        let control = Arc::new(MockControlPlane::new());
        control.fail_hpas("cluster unreachable").await;

        let history = ScalingHistory::new();
        let collector = ScalingCollector::new(
            control,
            history.clone(),
            vec!["east".to_string()],
            Duration::from_secs(5),
        );
        collector.sample_all().await;

        assert!(history.latest("east").await.is_none());
    }
}
