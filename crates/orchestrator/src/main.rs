//! Cluster test bench orchestrator
//!
//! Serves the test-run API, drives workload jobs on the managed
//! clusters, and keeps a rolling autoscaler history per cluster.

use anyhow::Result;
use orchestrator_lib::{
    control_plane::KubectlClient,
    health::{components, HealthRegistry},
    scaling::{ScalingCollector, ScalingHistory},
    Orchestrator, OrchestratorSettings, TestRegistry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting orchestrator");

    let config = config::OrchestratorConfig::load()?;
    let clusters = config.cluster_names();
    info!(
        namespace = %config.namespace,
        clusters = clusters.len(),
        "Orchestrator configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONTROL_PLANE).await;
    health_registry.register(components::SCALING_COLLECTOR).await;
    health_registry.register(components::API).await;

    let control_plane = Arc::new(KubectlClient::new(
        config.kubeconfig_dir.clone(),
        config.namespace.clone(),
    ));

    let scaling_history = ScalingHistory::new();
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let collector = ScalingCollector::new(
        control_plane.clone(),
        scaling_history.clone(),
        clusters,
        Duration::from_secs(config.scaling_interval_secs),
    );
    tokio::spawn(collector.run(shutdown_tx.subscribe()));

    let orchestrator = Orchestrator::new(
        TestRegistry::new(),
        control_plane,
        scaling_history,
        OrchestratorSettings {
            namespace: config.namespace.clone(),
            default_target_url: config.default_target_url.clone(),
            ..OrchestratorSettings::default()
        },
    );

    let app_state = Arc::new(api::AppState::new(orchestrator, health_registry.clone()));

    health_registry.set_ready(true).await;

    tokio::spawn(api::serve(config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());

    Ok(())
}
