//! `kusage discover`

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;
use usage_lib::UsageSource;

use crate::output::{print_json, print_table, OutputFormat};

/// Row for candidates table
#[derive(Tabled, Serialize)]
struct CandidateRow {
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Port")]
    port: i32,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Selected")]
    #[serde(skip)]
    marker: String,
    #[tabled(skip)]
    selected: bool,
}

/// List Prometheus services found in the cluster
pub async fn run(source: &UsageSource, format: OutputFormat) -> Result<()> {
    let discovery = source.discover().await?;

    let rows: Vec<CandidateRow> = discovery
        .candidates()
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow {
            namespace: c.namespace.clone(),
            service: c.name.clone(),
            port: c.port,
            endpoint: c.to_string(),
            marker: if i == 0 {
                "*".green().bold().to_string()
            } else {
                String::new()
            },
            selected: i == 0,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(rows),
    }

    Ok(())
}
