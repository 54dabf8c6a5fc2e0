//! stress-ng output parser

use crate::models::TestResults;
use regex::Regex;

/// Extract bogo-ops counters from stress-ng output into `results`.
///
/// Depending on version the metric lines are tagged `info:` or `metrc:`:
/// `stress-ng: metrc: [1] cpu   5829  30.00  29.90  0.01  194.30  194.88`
pub fn parse_into(output: &str, results: &mut TestResults) {
    let metric = Regex::new(r"(?:info|metrc):.*\]\s+(cpu|vm)\s+(\d+)").expect("valid regex");
    for line in output.lines() {
        if let Some(caps) = metric.captures(line) {
            let bogo_ops: u64 = match caps[2].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            match &caps[1] {
                "cpu" => results.cpu_bogo_ops = Some(bogo_ops),
                "vm" => results.memory_bogo_ops = Some(bogo_ops),
                _ => {}
            }
        }
    }
}
