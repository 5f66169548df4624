//! `kusage pods`

use anyhow::Result;
use tabled::Tabled;
use usage_lib::{PodUsage, UsageSource};

use crate::output::{format_bytes, format_cpu, print_json, print_table, OutputFormat};

/// Row for containers table
#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

fn rows(pods: &[PodUsage]) -> Vec<ContainerRow> {
    pods.iter()
        .flat_map(|pod| {
            pod.containers.iter().map(move |c| ContainerRow {
                namespace: pod.namespace.clone(),
                pod: pod.name.clone(),
                container: c.name.clone(),
                cpu: format_cpu(c.cpu),
                memory: format_bytes(c.memory),
            })
        })
        .collect()
}

/// Show per-container usage, optionally for a single namespace
pub async fn run(source: &UsageSource, namespace: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut snapshot = super::fetch_snapshot(source).await?;
    if let Some(ns) = namespace {
        snapshot.pods.retain(|p| p.namespace == ns);
    }
    snapshot
        .pods
        .sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

    match format {
        OutputFormat::Json => print_json(&snapshot.to_pod_metrics_list())?,
        OutputFormat::Table => print_table(rows(&snapshot.pods)),
    }

    Ok(())
}
