//! k6 summary output parser

use crate::models::TestResults;
use regex::Regex;

/// Extract latency, error-rate and throughput numbers from a k6 run
/// summary into `results`. Fields absent from the output are left
/// untouched.
pub fn parse_into(output: &str, results: &mut TestResults) {
    // http_req_duration..............: avg=12.34ms min=1.23ms med=10ms max=100ms p(90)=50ms p(95)=75ms p(99)=90ms
    let duration_line = Regex::new(r"http_req_duration[.\s]*:([^\n]+)").expect("valid regex");
    if let Some(caps) = duration_line.captures(output) {
        let line = &caps[1];
        let stat = Regex::new(r"(avg|p\(95\)|p\(99\))=([\d.]+)(ms|s|µs)").expect("valid regex");
        for caps in stat.captures_iter(line) {
            let value: f64 = match caps[2].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let ms = to_millis(value, &caps[3]);
            match &caps[1] {
                "avg" => results.avg_latency_ms = Some(ms),
                "p(95)" => results.p95_latency_ms = Some(ms),
                "p(99)" => results.p99_latency_ms = Some(ms),
                _ => {}
            }
        }
    }

    // http_req_failed................: 0.00% ✓ 0 ✗ 1234
    let failed_line = Regex::new(r"http_req_failed[.\s]*:\s*([\d.]+)%").expect("valid regex");
    if let Some(caps) = failed_line.captures(output) {
        if let Ok(pct) = caps[1].parse::<f64>() {
            results.error_rate = Some(pct / 100.0);
        }
    }

    // http_reqs......................: 12345  205.75/s
    let reqs_line = Regex::new(r"http_reqs[.\s]*:\s*(\d+)\s+([\d.]+)/s").expect("valid regex");
    if let Some(caps) = reqs_line.captures(output) {
        results.total_requests = caps[1].parse().ok();
        results.rps = caps[2].parse().ok();
    }
}

fn to_millis(value: f64, unit: &str) -> f64 {
    match unit {
        "s" => value * 1000.0,
        "µs" => value / 1000.0,
        _ => value,
    }
}
