//! Autoscaler observation: history buffer, collection loop, and the
//! derived-metrics calculator used by scaling-behavior tests

pub mod history;
pub mod metrics;

pub use history::{ScalingCollector, ScalingHistory};
