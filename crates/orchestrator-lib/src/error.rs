//! Error taxonomy for the orchestration engine
//!
//! `Busy` and `UnsupportedWorkload` surface synchronously from test
//! creation; every other failure is recorded on the test run itself and
//! observed through subsequent queries.

use crate::models::TestStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Admission rejected: another run occupies the single active slot
    #[error("test \"{id}\" is still {status}; wait for it to finish")]
    Busy { id: String, status: TestStatus },

    /// The workload configuration does not match the requested kind
    #[error("unsupported workload configuration for test kind {kind}")]
    UnsupportedWorkload { kind: String },

    /// The control plane rejected the submitted manifest
    #[error("manifest apply failed: {0}")]
    ApplyFailed(String),

    /// The watcher exceeded its wall-clock bound
    #[error("timeout: test exceeded {limit_secs} seconds")]
    Timeout { limit_secs: u64 },

    /// Log fetch or parsing failed after the workload terminated
    #[error("failed to collect results: {0}")]
    ResultCollection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message_names_the_blocking_run() {
        let err = OrchestratorError::Busy {
            id: "http-load-abc123".to_string(),
            status: TestStatus::Running,
        };
        let msg = err.to_string();
        assert!(msg.contains("http-load-abc123"));
        assert!(msg.contains("running"));
    }

    #[test]
    fn test_timeout_message() {
        let err = OrchestratorError::Timeout { limit_secs: 300 };
        assert!(err.to_string().contains("300"));
    }
}
