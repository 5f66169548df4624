//! `kusage nodes`

use anyhow::Result;
use tabled::Tabled;
use usage_lib::UsageSource;

use crate::output::{format_bytes, format_cpu, print_json, print_table, OutputFormat};

/// Row for nodes table
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Show per-node usage
pub async fn run(source: &UsageSource, format: OutputFormat) -> Result<()> {
    let mut snapshot = super::fetch_snapshot(source).await?;
    snapshot.nodes.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        OutputFormat::Json => print_json(&snapshot.to_node_metrics_list())?,
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = snapshot
                .nodes
                .iter()
                .map(|n| NodeRow {
                    node: n.name.clone(),
                    cpu: format_cpu(n.cpu),
                    memory: format_bytes(n.memory),
                })
                .collect();
            print_table(rows);
        }
    }

    Ok(())
}
