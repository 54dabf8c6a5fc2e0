//! Scaling history commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ScalingPoint};
use crate::output::{format_opt, format_timestamp, print_warning, OutputFormat};

/// Row for the autoscaler state table
#[derive(Tabled)]
struct HpaRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "CPU")]
    cpu: String,
}

/// Show the retained autoscaler history for a cluster
pub async fn show_history(client: &ApiClient, cluster: &str, format: OutputFormat) -> Result<()> {
    let series: Vec<ScalingPoint> = client.get(&format!("/api/scaling/{cluster}")).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
        OutputFormat::Table => {
            let Some(latest) = series.last() else {
                print_warning(&format!("No scaling samples for cluster {cluster}"));
                return Ok(());
            };

            println!(
                "Cluster {} at {} ({} samples retained)\n",
                cluster,
                format_timestamp(latest.timestamp),
                series.len()
            );

            if latest.hpas.is_empty() {
                print_warning("No autoscalers in the latest sample");
                return Ok(());
            }

            let rows: Vec<HpaRow> = latest
                .hpas
                .iter()
                .map(|hpa| HpaRow {
                    namespace: hpa.namespace.clone(),
                    deployment: hpa.deployment.clone(),
                    replicas: format!("{}/{}", hpa.current_replicas, hpa.desired_replicas),
                    range: format!("{}-{}", hpa.min_replicas, hpa.max_replicas),
                    cpu: format!(
                        "{}% / {}%",
                        format_opt(hpa.current_cpu_percent),
                        hpa.target_cpu_percent
                    ),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}
