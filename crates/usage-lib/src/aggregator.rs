//! Folding of query results into per-pod and per-node usage
//!
//! CPU and memory come from independent queries whose series sets need not
//! line up, so each fold runs one pass per metric into a keyed accumulator and
//! only then shapes the output. A resource that was never observed for an
//! entity is left out rather than reported as zero.
//!
//! Output order is unspecified.

use std::collections::HashMap;

use crate::models::{ContainerUsage, CpuQuantity, MemoryQuantity, NodeUsage, PodUsage};
use crate::observability::{SnapshotLogger, SourceMetrics};
use crate::query::{QueryResponse, QueryResult};
use crate::sample::parse_sample;
use crate::source::MetricKind;

const LABEL_NAMESPACE: &str = "namespace";
const LABEL_POD: &str = "pod";
const LABEL_CONTAINER: &str = "container";
const LABEL_NODE: &str = "node";

/// Identity of a container across the CPU and memory result sets.
/// Missing labels are kept as empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

impl ContainerKey {
    fn from_labels(row: &QueryResult) -> Self {
        Self {
            namespace: row.label(LABEL_NAMESPACE).to_string(),
            pod: row.label(LABEL_POD).to_string(),
            container: row.label(LABEL_CONTAINER).to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Usage {
    cpu: Option<CpuQuantity>,
    memory: Option<MemoryQuantity>,
}

/// Parsed rows of one result set, malformed samples dropped
fn samples<'a>(
    response: &'a QueryResponse,
    metric: MetricKind,
) -> impl Iterator<Item = (&'a QueryResult, f64)> + 'a {
    response.data.result.iter().filter_map(move |row| {
        match parse_sample(&row.value) {
            Ok(value) => Some((row, value)),
            Err(e) => {
                SourceMetrics::new().inc_malformed_samples();
                SnapshotLogger::default().log_skipped_sample(
                    metric,
                    &format!("{:?}", row.metric),
                    &e.to_string(),
                );
                None
            }
        }
    })
}

/// Join container CPU and memory results and group them into pods
pub fn build_pod_usage(cpu: &QueryResponse, memory: &QueryResponse) -> Vec<PodUsage> {
    let mut containers: HashMap<ContainerKey, Usage> = HashMap::new();

    for (row, cores) in samples(cpu, MetricKind::ContainerCpu) {
        containers
            .entry(ContainerKey::from_labels(row))
            .or_default()
            .cpu = Some(CpuQuantity::from_cores(cores));
    }

    for (row, bytes) in samples(memory, MetricKind::ContainerMemory) {
        containers
            .entry(ContainerKey::from_labels(row))
            .or_default()
            .memory = Some(MemoryQuantity::from_sample(bytes));
    }

    let mut pods: HashMap<(String, String), Vec<ContainerUsage>> = HashMap::new();
    for (key, usage) in containers {
        pods.entry((key.namespace, key.pod))
            .or_default()
            .push(ContainerUsage {
                name: key.container,
                cpu: usage.cpu,
                memory: usage.memory,
            });
    }

    pods.into_iter()
        .map(|((namespace, name), containers)| PodUsage {
            namespace,
            name,
            containers,
        })
        .collect()
}

/// Join node CPU and memory results. Rows without a node name are dropped.
pub fn build_node_usage(cpu: &QueryResponse, memory: &QueryResponse) -> Vec<NodeUsage> {
    let mut nodes: HashMap<String, Usage> = HashMap::new();

    for (row, cores) in samples(cpu, MetricKind::NodeCpu) {
        let node = row.label(LABEL_NODE);
        if node.is_empty() {
            continue;
        }
        nodes.entry(node.to_string()).or_default().cpu = Some(CpuQuantity::from_cores(cores));
    }

    for (row, bytes) in samples(memory, MetricKind::NodeMemory) {
        let node = row.label(LABEL_NODE);
        if node.is_empty() {
            continue;
        }
        nodes.entry(node.to_string()).or_default().memory =
            Some(MemoryQuantity::from_sample(bytes));
    }

    nodes
        .into_iter()
        .map(|(name, usage)| NodeUsage {
            name,
            cpu: usage.cpu,
            memory: usage.memory,
        })
        .collect()
}
