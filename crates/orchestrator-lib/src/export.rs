//! CSV export of finished test runs
//!
//! Flattens per-kind configuration and results into one row per run.
//! Only terminal runs are exported; an in-flight run has nothing stable
//! to report. Every value is quoted and absent fields render as empty
//! cells so the output loads cleanly in spreadsheet tools.

use crate::models::{TestRun, WorkloadConfig};
use chrono::{DateTime, SecondsFormat};

const HEADERS: &[&str] = &[
    "id",
    "kind",
    "scenario",
    "cluster",
    "status",
    "started_at",
    "completed_at",
    "duration_sec",
    "vus",
    "load_duration",
    "target_url",
    "stress_workers",
    "stress_timeout",
    "stress_vm_bytes",
    "p95_latency_ms",
    "p99_latency_ms",
    "avg_latency_ms",
    "error_rate",
    "rps",
    "total_requests",
    "cpu_bogo_ops",
    "memory_bogo_ops",
    "scale_up_latency_ms",
    "peak_replicas",
    "scale_down_started_ms",
    "avg_rps_per_pod",
    "error",
];

/// Render the terminal runs among `tests` as a CSV document
pub fn export_csv(tests: &[TestRun]) -> String {
    let mut out = String::new();
    out.push_str(&HEADERS.join(","));
    out.push('\n');

    for test in tests.iter().filter(|t| t.status.is_terminal()) {
        out.push_str(&row(test).join(","));
        out.push('\n');
    }

    out
}

fn row(test: &TestRun) -> Vec<String> {
    let (vus, load_duration, target_url) = match &test.config {
        WorkloadConfig::HttpLoad(load) => (
            Some(load.vus),
            Some(load.duration.clone()),
            load.target_url.clone(),
        ),
        WorkloadConfig::Scaling(scaling) => (
            Some(scaling.load.vus),
            Some(scaling.load.duration.clone()),
            scaling.load.target_url.clone(),
        ),
        WorkloadConfig::Stress(_) => (None, None, None),
    };
    let stress = match &test.config {
        WorkloadConfig::Stress(stress) => Some(stress),
        _ => None,
    };
    let results = test.results.as_ref();
    let scaling_meta = results.and_then(|r| r.scaling.as_ref());

    let duration_sec = test
        .completed_at
        .map(|end| format!("{:.1}", (end - test.started_at) as f64 / 1000.0));

    vec![
        quote(&test.id),
        quote(test.kind.as_str()),
        quote(test.scenario.as_deref().unwrap_or("")),
        quote(&test.cluster),
        quote(test.status.as_str()),
        quote(&iso(test.started_at)),
        quote(&test.completed_at.map(iso).unwrap_or_default()),
        quote(&duration_sec.unwrap_or_default()),
        opt(vus),
        quote(&load_duration.unwrap_or_default()),
        quote(&target_url.unwrap_or_default()),
        opt(stress.map(|s| s.workers)),
        quote(stress.map(|s| s.timeout.as_str()).unwrap_or("")),
        quote(stress.map(|s| s.vm_bytes.as_str()).unwrap_or("")),
        opt(results.and_then(|r| r.p95_latency_ms)),
        opt(results.and_then(|r| r.p99_latency_ms)),
        opt(results.and_then(|r| r.avg_latency_ms)),
        opt(results.and_then(|r| r.error_rate)),
        opt(results.and_then(|r| r.rps)),
        opt(results.and_then(|r| r.total_requests)),
        opt(results.and_then(|r| r.cpu_bogo_ops)),
        opt(results.and_then(|r| r.memory_bogo_ops)),
        opt(scaling_meta.and_then(|m| m.scale_up_latency_ms)),
        opt(scaling_meta.map(|m| m.peak_replicas)),
        opt(scaling_meta.and_then(|m| m.scale_down_started_ms)),
        quote(
            &scaling_meta
                .and_then(|m| m.avg_rps_per_replica)
                .map(|v| format!("{v:.1}"))
                .unwrap_or_default(),
        ),
        quote(test.error.as_deref().unwrap_or("")),
    ]
}

fn iso(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn opt<T: ToString>(value: Option<T>) -> String {
    quote(&value.map(|v| v.to_string()).unwrap_or_default())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        HttpLoadConfig, StressConfig, TestKind, TestResults, TestStatus,
    };

    fn run(kind: TestKind, status: TestStatus) -> TestRun {
        TestRun {
            id: format!("{}-x1", kind.as_str()),
            kind,
            cluster: "east".to_string(),
            status,
            scenario: None,
            started_at: 1_700_000_000_000,
            completed_at: Some(1_700_000_030_500),
            error: None,
            config: WorkloadConfig::default_for(kind),
            results: None,
        }
    }

    #[test]
    fn test_header_row_always_present() {
        let csv = export_csv(&[]);
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,kind,scenario,cluster,status"));
        assert!(header.ends_with("error"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_active_runs_are_skipped() {
        let runs = vec![
            run(TestKind::HttpLoad, TestStatus::Running),
            run(TestKind::HttpLoad, TestStatus::Completed),
        ];
        let csv = export_csv(&runs);
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_load_row_carries_config_and_results() {
        let mut test = run(TestKind::HttpLoad, TestStatus::Completed);
        test.config = WorkloadConfig::HttpLoad(HttpLoadConfig {
            vus: 80,
            duration: "45s".to_string(),
            target_url: Some("http://web.demo".to_string()),
            ..HttpLoadConfig::default()
        });
        test.results = Some(TestResults {
            p95_latency_ms: Some(120.5),
            rps: Some(33.0),
            total_requests: Some(990),
            ..TestResults::default()
        });

        let csv = export_csv(&[test]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"80\""));
        assert!(row.contains("\"45s\""));
        assert!(row.contains("\"http://web.demo\""));
        assert!(row.contains("\"120.5\""));
        assert!(row.contains("\"990\""));
        // Stress columns stay empty for a load run
        assert!(row.contains(",\"\",\"\","));
    }

    #[test]
    fn test_stress_row_carries_stress_columns() {
        let mut test = run(TestKind::MemoryStress, TestStatus::Completed);
        test.config = WorkloadConfig::Stress(StressConfig {
            workers: 4,
            timeout: "20s".to_string(),
            vm_bytes: "128M".to_string(),
        });

        let csv = export_csv(&[test]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"4\""));
        assert!(row.contains("\"20s\""));
        assert!(row.contains("\"128M\""));
    }

    #[test]
    fn test_timestamps_render_iso_and_duration() {
        let csv = export_csv(&[run(TestKind::HttpLoad, TestStatus::Completed)]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("2023-11-14T22:13:20.000Z"));
        assert!(row.contains("\"30.5\""));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let mut test = run(TestKind::HttpLoad, TestStatus::Failed);
        test.error = Some("kubectl said \"no\"".to_string());

        let csv = export_csv(&[test]);
        assert!(csv.contains("\"kubectl said \"\"no\"\"\""));
    }
}
