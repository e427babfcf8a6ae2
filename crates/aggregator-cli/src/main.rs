use std::io::IsTerminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kube::CustomResourceExt;
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Parser)]
#[command(name = "aggregator", about = "Kubernetes-native event aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the aggregator: bootstrap SourceConfigs, start adapters/pipelines,
    /// run GC, and block until SIGINT/SIGTERM.
    Run,
    /// Print the Observation and SourceConfig CustomResourceDefinitions as
    /// JSON, one per line, for `kubectl apply -f -`.
    Crds,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::io::stdout().is_terminal() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }

    match cli.command {
        Command::Run => server::run().await,
        Command::Crds => {
            println!("{}", serde_json::to_string_pretty(&aggregator_k8s::Observation::crd())?);
            println!("{}", serde_json::to_string_pretty(&aggregator_k8s::SourceConfig::crd())?);
            Ok(())
        }
    }
}
