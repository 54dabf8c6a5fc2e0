//! Derived scaling metrics
//!
//! Pure computation over the snapshot series a scaling watcher
//! accumulated: scale-up latency against the pre-test baseline, peak
//! replica count, scale-down onset after load ends, and throughput per
//! replica. Snapshots are assumed time-ordered as received; "first
//! snapshot satisfying a condition" always resolves to the earliest
//! timestamp.

use crate::models::{HpaSnapshot, ScalingDataPoint, ScalingTestMeta};
use std::collections::{BTreeSet, HashMap};

/// Inputs to the metric computation
pub struct MetricsInput<'a> {
    /// Accumulated snapshot series, oldest first
    pub snapshots: &'a [ScalingDataPoint],
    /// Epoch ms when the workload pod first reported running
    pub test_start: i64,
    /// Epoch ms when the workload reached a terminal pod state
    pub test_end: i64,
    /// Epoch ms when the cooldown window closed
    pub cooldown_end: i64,
    /// Replica count per `namespace/deployment` key, observed strictly
    /// before test start
    pub baseline: &'a HashMap<String, u32>,
    /// Measured requests per second from the load phase
    pub rps: Option<f64>,
    /// Restrict the computation to these deployment names
    pub target_deployments: Option<&'a [String]>,
}

/// Compute the scaling metrics for a finished scaling test
pub fn compute(input: &MetricsInput<'_>) -> ScalingTestMeta {
    let in_scope = |hpa: &HpaSnapshot| -> bool {
        match input.target_deployments {
            Some(targets) if !targets.is_empty() => {
                targets.iter().any(|t| t == &hpa.deployment)
            }
            _ => true,
        }
    };

    // Scale-up latency: first snapshot at or after test start where any
    // in-scope deployment exceeds its baseline
    let mut scale_up_latency_ms = None;
    'up: for point in input.snapshots {
        if point.timestamp < input.test_start {
            continue;
        }
        for hpa in point.hpas.iter().filter(|h| in_scope(h)) {
            if let Some(&baseline) = input.baseline.get(&hpa.key()) {
                if hpa.current_replicas > baseline {
                    scale_up_latency_ms = Some(point.timestamp - input.test_start);
                    break 'up;
                }
            }
        }
    }

    // Peak replicas: maximum total in-scope replicas over the series
    let peak_replicas = input
        .snapshots
        .iter()
        .map(|point| {
            point
                .hpas
                .iter()
                .filter(|h| in_scope(h))
                .map(|h| h.current_replicas)
                .sum::<u32>()
        })
        .max()
        .unwrap_or(0);

    // Scale-down onset: per-deployment peak as of test end, then the
    // first later snapshot where any in-scope deployment drops below it
    let mut peak_by_deployment: HashMap<String, u32> = HashMap::new();
    for point in input.snapshots {
        if point.timestamp > input.test_end {
            break;
        }
        for hpa in point.hpas.iter().filter(|h| in_scope(h)) {
            let entry = peak_by_deployment.entry(hpa.key()).or_insert(0);
            *entry = (*entry).max(hpa.current_replicas);
        }
    }
    let mut scale_down_started_ms = None;
    'down: for point in input.snapshots {
        if point.timestamp <= input.test_end {
            continue;
        }
        for hpa in point.hpas.iter().filter(|h| in_scope(h)) {
            if let Some(&peak) = peak_by_deployment.get(&hpa.key()) {
                if hpa.current_replicas < peak {
                    scale_down_started_ms = Some(point.timestamp - input.test_end);
                    break 'down;
                }
            }
        }
    }

    // Throughput per replica over the load window
    let avg_rps_per_replica = input.rps.and_then(|rps| {
        let window: Vec<&ScalingDataPoint> = input
            .snapshots
            .iter()
            .filter(|p| p.timestamp >= input.test_start && p.timestamp <= input.test_end)
            .collect();
        if window.is_empty() {
            return None;
        }
        let total: u32 = window
            .iter()
            .map(|p| {
                p.hpas
                    .iter()
                    .filter(|h| in_scope(h))
                    .map(|h| h.current_replicas)
                    .sum::<u32>()
            })
            .sum();
        let mean = f64::from(total) / window.len() as f64;
        (mean > 0.0).then(|| rps / mean)
    });

    // Resolved scope: explicit filter, else every deployment seen
    let target_deployments: Vec<String> = match input.target_deployments {
        Some(targets) if !targets.is_empty() => targets.to_vec(),
        _ => {
            let mut seen = BTreeSet::new();
            for point in input.snapshots {
                for hpa in &point.hpas {
                    seen.insert(hpa.deployment.clone());
                }
            }
            seen.into_iter().collect()
        }
    };

    ScalingTestMeta {
        snapshots: input.snapshots.to_vec(),
        test_start: input.test_start,
        test_end: input.test_end,
        cooldown_end: input.cooldown_end,
        scale_up_latency_ms,
        peak_replicas,
        scale_down_started_ms,
        avg_rps_per_replica,
        target_deployments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn point(ts: i64, hpas: Vec<HpaSnapshot>) -> ScalingDataPoint {
        ScalingDataPoint { timestamp: ts, hpas }
    }

    fn baseline(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries
            .iter()
            .map(|(d, r)| (format!("demo/{d}"), *r))
            .collect()
    }

    #[test]
    fn test_scale_up_latency_first_increase() {
        // Baseline {web: 2}, snapshot at start+4s shows {web: 3}
        let snapshots = vec![
            point(0, vec![hpa("web", 2)]),
            point(1_000, vec![hpa("web", 2)]),
            point(5_000, vec![hpa("web", 3)]),
            point(7_000, vec![hpa("web", 4)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 60_000,
            cooldown_end: 120_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.scale_up_latency_ms, Some(4_000));
    }

    #[test]
    fn test_scale_up_null_when_never_exceeded() {
        let snapshots = vec![
            point(0, vec![hpa("web", 2)]),
            point(5_000, vec![hpa("web", 2)]),
            point(10_000, vec![hpa("web", 2)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 8_000,
            cooldown_end: 20_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.scale_up_latency_ms, None);
        // Peak equals the baseline total when nothing scaled
        assert_eq!(meta.peak_replicas, 2);
    }

    #[test]
    fn test_increase_before_test_start_does_not_count() {
        let snapshots = vec![
            point(500, vec![hpa("web", 5)]),
            point(2_000, vec![hpa("web", 2)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 20_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.scale_up_latency_ms, None);
    }

    #[test]
    fn test_unknown_deployment_never_triggers_scale_up() {
        // "api" has no baseline entry, so its replicas cannot count
        let snapshots = vec![point(2_000, vec![hpa("api", 9)])];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 20_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.scale_up_latency_ms, None);
    }

    #[test]
    fn test_peak_replicas_is_max_of_sums() {
        let snapshots = vec![
            point(0, vec![hpa("web", 2), hpa("api", 1)]),
            point(1_000, vec![hpa("web", 4), hpa("api", 3)]),
            point(2_000, vec![hpa("web", 3), hpa("api", 2)]),
        ];
        let base = baseline(&[("web", 2), ("api", 1)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 0,
            test_end: 2_000,
            cooldown_end: 3_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.peak_replicas, 7);
    }

    #[test]
    fn test_scale_down_onset_after_test_end() {
        let snapshots = vec![
            point(0, vec![hpa("web", 2)]),
            point(5_000, vec![hpa("web", 5)]),
            point(10_000, vec![hpa("web", 5)]),
            point(15_000, vec![hpa("web", 5)]),
            point(40_000, vec![hpa("web", 3)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 12_000,
            cooldown_end: 72_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        // Peak as of test end is 5; first drop below it is at 40s
        assert_eq!(meta.scale_down_started_ms, Some(28_000));
    }

    #[test]
    fn test_scale_down_null_when_replicas_hold() {
        let snapshots = vec![
            point(5_000, vec![hpa("web", 5)]),
            point(20_000, vec![hpa("web", 5)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 70_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(meta.scale_down_started_ms, None);
    }

    #[test]
    fn test_avg_rps_per_replica() {
        // Mean replicas in [start, end]: (2 + 4) / 2 = 3
        let snapshots = vec![
            point(1_000, vec![hpa("web", 2)]),
            point(5_000, vec![hpa("web", 4)]),
            point(20_000, vec![hpa("web", 4)]),
        ];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 70_000,
            baseline: &base,
            rps: Some(150.0),
            target_deployments: None,
        });

        assert_eq!(meta.avg_rps_per_replica, Some(50.0));
    }

    #[test]
    fn test_avg_rps_null_without_window_snapshots() {
        let snapshots = vec![point(50_000, vec![hpa("web", 2)])];
        let base = baseline(&[("web", 2)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 70_000,
            baseline: &base,
            rps: Some(150.0),
            target_deployments: None,
        });

        assert_eq!(meta.avg_rps_per_replica, None);
    }

    #[test]
    fn test_avg_rps_null_with_zero_mean_replicas() {
        let snapshots = vec![point(2_000, vec![hpa("web", 0)])];
        let base = baseline(&[("web", 0)]);
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 70_000,
            baseline: &base,
            rps: Some(150.0),
            target_deployments: None,
        });

        assert_eq!(meta.avg_rps_per_replica, None);
    }

    #[test]
    fn test_deployment_filter_restricts_scope() {
        let snapshots = vec![
            point(1_000, vec![hpa("web", 2), hpa("api", 1)]),
            point(3_000, vec![hpa("web", 2), hpa("api", 6)]),
        ];
        let base = baseline(&[("web", 2), ("api", 1)]);
        let filter = vec!["web".to_string()];
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 1_000,
            test_end: 10_000,
            cooldown_end: 70_000,
            baseline: &base,
            rps: None,
            target_deployments: Some(&filter),
        });

        // api's jump to 6 is out of scope
        assert_eq!(meta.scale_up_latency_ms, None);
        assert_eq!(meta.peak_replicas, 2);
        assert_eq!(meta.target_deployments, vec!["web".to_string()]);
    }

    #[test]
    fn test_scope_defaults_to_all_seen_deployments() {
        let snapshots = vec![
            point(1_000, vec![hpa("web", 2)]),
            point(2_000, vec![hpa("api", 1)]),
        ];
        let base = HashMap::new();
        let meta = compute(&MetricsInput {
            snapshots: &snapshots,
            test_start: 0,
            test_end: 5_000,
            cooldown_end: 10_000,
            baseline: &base,
            rps: None,
            target_deployments: None,
        });

        assert_eq!(
            meta.target_deployments,
            vec!["api".to_string(), "web".to_string()]
        );
    }

    #[test]
    fn test_empty_series() {
        let base = HashMap::new();
        let meta = compute(&MetricsInput {
            snapshots: &[],
            test_start: 0,
            test_end: 1_000,
            cooldown_end: 2_000,
            baseline: &base,
            rps: Some(10.0),
            target_deployments: None,
        });

        assert_eq!(meta.peak_replicas, 0);
        assert_eq!(meta.scale_up_latency_ms, None);
        assert_eq!(meta.scale_down_started_ms, None);
        assert_eq!(meta.avg_rps_per_replica, None);
        assert!(meta.target_deployments.is_empty());
    }
}
