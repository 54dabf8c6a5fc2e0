//! Cluster test bench CLI
//!
//! Command-line tool for launching load, stress, and scaling tests
//! against the bench clusters and inspecting their results.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::CreateTestRequest;
use commands::{scaling, tests};
use serde_json::json;

/// Cluster test bench CLI
#[derive(Parser)]
#[command(name = "bench")]
#[command(author, version, about = "CLI for the cluster test bench", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via BENCH_API_URL env var)
    #[arg(long, env = "BENCH_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch a test run
    #[command(subcommand)]
    Run(RunCommands),

    /// List all test runs
    List,

    /// Show one test run in detail
    Get {
        /// Test run id
        id: String,
    },

    /// Delete a test run and its cluster objects
    Delete {
        /// Test run id
        id: String,
    },

    /// Export finished runs as CSV
    Export {
        /// Output file path (stdout if not specified)
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Show the retained autoscaler history for a cluster
    Scaling {
        /// Cluster name
        cluster: String,
    },
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// HTTP load test with default parameters
    Load {
        /// Target cluster
        #[arg(long, short)]
        cluster: String,

        /// Scenario label attached to the run
        #[arg(long)]
        scenario: Option<String>,
    },

    /// HTTP load test with custom parameters
    CustomLoad {
        /// Target cluster
        #[arg(long, short)]
        cluster: String,

        /// Virtual user count
        #[arg(long, default_value_t = 50)]
        vus: u32,

        /// Sustain duration (k6 notation, e.g. 30s, 2m)
        #[arg(long, default_value = "30s")]
        duration: String,

        /// Target URL (orchestrator default when omitted)
        #[arg(long)]
        target_url: Option<String>,

        /// Ramp VUs up and down over this duration
        #[arg(long)]
        ramp_up: Option<String>,

        /// Scenario label attached to the run
        #[arg(long)]
        scenario: Option<String>,
    },

    /// CPU stress test
    StressCpu {
        /// Target cluster
        #[arg(long, short)]
        cluster: String,

        /// CPU worker count
        #[arg(long, default_value_t = 1)]
        workers: u32,

        /// Run duration (e.g. 30s)
        #[arg(long, default_value = "30s")]
        timeout: String,

        /// Scenario label attached to the run
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Memory stress test
    StressMemory {
        /// Target cluster
        #[arg(long, short)]
        cluster: String,

        /// VM worker count
        #[arg(long, default_value_t = 1)]
        workers: u32,

        /// Run duration (e.g. 30s)
        #[arg(long, default_value = "30s")]
        timeout: String,

        /// Per-worker allocation size (e.g. 64M)
        #[arg(long, default_value = "64M")]
        vm_bytes: String,

        /// Scenario label attached to the run
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Scaling behavior test: load phase plus autoscaler observation
    Scaling {
        /// Target cluster
        #[arg(long, short)]
        cluster: String,

        /// Virtual user count for the load phase
        #[arg(long, default_value_t = 50)]
        vus: u32,

        /// Load phase duration
        #[arg(long, default_value = "60s")]
        duration: String,

        /// Post-load observation window in seconds
        #[arg(long, default_value_t = 60)]
        cooldown_secs: u64,

        /// Restrict metrics to these deployments (repeatable)
        #[arg(long = "deployment")]
        deployments: Vec<String>,

        /// Scenario label attached to the run
        #[arg(long)]
        scenario: Option<String>,
    },
}

impl RunCommands {
    fn into_request(self) -> CreateTestRequest {
        match self {
            RunCommands::Load { cluster, scenario } => CreateTestRequest {
                kind: "http-load".to_string(),
                cluster,
                scenario,
                config: None,
            },
            RunCommands::CustomLoad {
                cluster,
                vus,
                duration,
                target_url,
                ramp_up,
                scenario,
            } => {
                let mut config = json!({
                    "workload": "http-load",
                    "vus": vus,
                    "duration": duration,
                });
                if let Some(url) = target_url {
                    config["target_url"] = json!(url);
                }
                if let Some(ramp) = ramp_up {
                    config["ramp_up"] = json!(ramp);
                }
                CreateTestRequest {
                    kind: "http-load-custom".to_string(),
                    cluster,
                    scenario,
                    config: Some(config),
                }
            }
            RunCommands::StressCpu {
                cluster,
                workers,
                timeout,
                scenario,
            } => CreateTestRequest {
                kind: "cpu-stress".to_string(),
                cluster,
                scenario,
                config: Some(json!({
                    "workload": "stress",
                    "workers": workers,
                    "timeout": timeout,
                })),
            },
            RunCommands::StressMemory {
                cluster,
                workers,
                timeout,
                vm_bytes,
                scenario,
            } => CreateTestRequest {
                kind: "memory-stress".to_string(),
                cluster,
                scenario,
                config: Some(json!({
                    "workload": "stress",
                    "workers": workers,
                    "timeout": timeout,
                    "vm_bytes": vm_bytes,
                })),
            },
            RunCommands::Scaling {
                cluster,
                vus,
                duration,
                cooldown_secs,
                deployments,
                scenario,
            } => {
                let mut config = json!({
                    "workload": "scaling",
                    "load": { "vus": vus, "duration": duration },
                    "cooldown_secs": cooldown_secs,
                });
                if !deployments.is_empty() {
                    config["target_deployments"] = json!(deployments);
                }
                CreateTestRequest {
                    kind: "scaling-behavior".to_string(),
                    cluster,
                    scenario,
                    config: Some(config),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Run(run_cmd) => {
            tests::run_test(&client, run_cmd.into_request(), cli.format).await?;
        }
        Commands::List => {
            tests::list_tests(&client, cli.format).await?;
        }
        Commands::Get { id } => {
            tests::get_test(&client, &id, cli.format).await?;
        }
        Commands::Delete { id } => {
            tests::delete_test(&client, &id).await?;
        }
        Commands::Export { output } => {
            tests::export_tests(&client, output).await?;
        }
        Commands::Scaling { cluster } => {
            scaling::show_history(&client, &cluster, cli.format).await?;
        }
    }

    Ok(())
}
