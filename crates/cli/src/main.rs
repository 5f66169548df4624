//! kusage
//!
//! A command-line tool for reading pod, container and node resource usage
//! out of the cluster's Prometheus.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usage_lib::{Endpoint, SourceMetrics, UsageSource};

/// Cluster resource usage from Prometheus
#[derive(Parser)]
#[command(name = "kusage")]
#[command(author, version, about = "Cluster resource usage from Prometheus", long_about = None)]
pub struct Cli {
    /// Prometheus URL or namespace/service:port (auto-discovered if not set)
    #[arg(long, env = "KUSAGE_PROMETHEUS_ENDPOINT", global = true)]
    pub prometheus_endpoint: Option<String>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print query metrics to stderr before exiting
    #[arg(long, global = true)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List Prometheus services found in the cluster
    Discover,

    /// Show per-container usage
    Pods {
        /// Filter by namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Show per-node usage
    Nodes,

    /// Print the full snapshot as JSON
    Snapshot,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Build a cluster client from the given kubeconfig files, or infer one
async fn cluster_client(kubeconfig: Option<&str>) -> Result<kube::Client> {
    let config = match kubeconfig.map(config::kubeconfig_paths) {
        Some(paths) if !paths.is_empty() => {
            let mut merged: Option<Kubeconfig> = None;
            for path in &paths {
                let next = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                merged = Some(match merged {
                    Some(current) => current.merge(next)?,
                    None => next,
                });
            }
            let kubeconfig = merged.context("No kubeconfig files given")?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load kubeconfig")?
        }
        _ => kube::Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    kube::Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Whether the endpoint can be queried without talking to the API server
fn needs_cluster(endpoint: Option<&str>) -> bool {
    match endpoint {
        // invalid endpoints are reported when the source resolves them
        Some(e) => Endpoint::parse(e).map(|e| !e.is_direct()).unwrap_or(false),
        None => true,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let file_config = config::Config::load()?;
    let source_config = file_config.source_config(cli.prometheus_endpoint.clone(), cli.timeout);
    debug!(endpoint = ?source_config.endpoint, "Resolved configuration");

    let use_cluster =
        matches!(cli.command, Commands::Discover) || needs_cluster(source_config.endpoint.as_deref());
    let mut source = UsageSource::new(source_config);
    if use_cluster {
        source = source.with_cluster(cluster_client(cli.kubeconfig.as_deref()).await?);
    }

    let result = match cli.command {
        Commands::Discover => commands::discover::run(&source, cli.format).await,
        Commands::Pods { namespace } => {
            let namespace = namespace.or(file_config.default_namespace);
            commands::pods::run(&source, namespace.as_deref(), cli.format).await
        }
        Commands::Nodes => commands::nodes::run(&source, cli.format).await,
        Commands::Snapshot => commands::snapshot::run(&source).await,
    };

    if cli.dump_metrics {
        eprint!("{}", SourceMetrics::new().render_text());
    }

    result
}
