//! Core library for the cluster test bench orchestrator
//!
//! This crate provides the test run orchestration engine:
//! - In-memory test registry with single-flight admission control
//! - Workload manifest generation (k6 load jobs, stress-ng jobs)
//! - Control-plane client (kubectl command interface)
//! - Per-test lifecycle watchers, including the scaling-test extension
//! - Scaling history buffer and derived scaling metrics
//! - Workload log parsing and CSV export

pub mod control_plane;
pub mod error;
pub mod export;
pub mod health;
pub mod manifest;
pub mod models;
pub mod observability;
pub mod parsers;
pub mod registry;
pub mod results;
pub mod scaling;
pub mod service;
pub mod watcher;

pub use error::OrchestratorError;
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse};
pub use models::*;
pub use observability::OrchestratorMetrics;
pub use registry::TestRegistry;
pub use service::{Orchestrator, OrchestratorSettings, TestRequest};
