//! Workload log parsers
//!
//! Each workload family produces a text summary in its own format;
//! these parsers extract the numeric fields the orchestrator reports.
//! Lines that do not match are ignored, so partial output still yields
//! partial results.

pub mod k6;
pub mod stress_ng;
