//! CLI command implementations

pub mod scaling;
