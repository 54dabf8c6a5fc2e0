//! In-memory test registry and admission control
//!
//! The registry is the single concurrency-control point of the system:
//! all test creation funnels through `admit`, which holds the write lock
//! across the active-run check and the insert, so at most one run is
//! ever in the active set.

use crate::error::OrchestratorError;
use crate::models::{now_millis, TestKind, TestRun, TestStatus, WorkloadConfig};
use crate::watcher::WatcherHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Clone-shared handle over the test store and the per-test watcher map
#[derive(Clone, Default)]
pub struct TestRegistry {
    tests: Arc<RwLock<HashMap<String, TestRun>>>,
    watchers: Arc<RwLock<HashMap<String, WatcherHandle>>>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new test run.
    ///
    /// Fails with `Busy` while any run is pending, running, or cooling
    /// down, and with `UnsupportedWorkload` when the configuration does
    /// not match the kind. On success a `pending` record is stored and
    /// returned.
    pub async fn admit(
        &self,
        kind: TestKind,
        cluster: &str,
        scenario: Option<String>,
        config: WorkloadConfig,
    ) -> Result<TestRun, OrchestratorError> {
        if !config.matches(kind) {
            return Err(OrchestratorError::UnsupportedWorkload {
                kind: kind.to_string(),
            });
        }

        let mut tests = self.tests.write().await;

        if let Some(active) = tests.values().find(|t| t.status.is_active()) {
            return Err(OrchestratorError::Busy {
                id: active.id.clone(),
                status: active.status,
            });
        }

        let started_at = now_millis();
        let id = format!("{}-{}", kind.as_str(), base36(started_at as u64));
        let test = TestRun {
            id: id.clone(),
            kind,
            cluster: cluster.to_string(),
            status: TestStatus::Pending,
            scenario,
            started_at,
            completed_at: None,
            error: None,
            config,
            results: None,
        };
        tests.insert(id.clone(), test.clone());
        debug!(id, kind = %kind, cluster, "Admitted test run");
        Ok(test)
    }

    pub async fn get(&self, id: &str) -> Option<TestRun> {
        self.tests.read().await.get(id).cloned()
    }

    /// All test runs, newest first
    pub async fn list(&self) -> Vec<TestRun> {
        let mut all: Vec<TestRun> = self.tests.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    /// The run currently occupying the admission slot, if any
    pub async fn active(&self) -> Option<TestRun> {
        self.tests
            .read()
            .await
            .values()
            .find(|t| t.status.is_active())
            .cloned()
    }

    /// Apply a mutation to a test run.
    ///
    /// Returns false when the id is no longer present; a cancelled
    /// watcher's in-flight result is discarded through exactly this path.
    pub async fn update<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut TestRun),
    {
        let mut tests = self.tests.write().await;
        match tests.get_mut(id) {
            Some(test) => {
                mutate(test);
                true
            }
            None => false,
        }
    }

    /// Remove a test run, cancelling its watcher. Returns the removed
    /// record, or `None` if the id did not exist.
    pub async fn remove(&self, id: &str) -> Option<TestRun> {
        if let Some(handle) = self.watchers.write().await.remove(id) {
            handle.cancel();
        }
        self.tests.write().await.remove(id)
    }

    /// Register the watcher driving a test's lifecycle
    pub async fn attach_watcher(&self, id: &str, handle: WatcherHandle) {
        self.watchers.write().await.insert(id.to_string(), handle);
    }

    /// Drop a finished watcher's handle
    pub async fn detach_watcher(&self, id: &str) {
        self.watchers.write().await.remove(id);
    }

    #[cfg(test)]
    pub(crate) async fn watcher_count(&self) -> usize {
        self.watchers.read().await.len()
    }
}

/// Lowercase base-36 rendering, used for compact timestamp-derived ids
fn base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}
