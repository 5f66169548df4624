//! `metrics.k8s.io/v1beta1` rendering of a snapshot
//!
//! Consumers written against the metrics-server API can read these lists the
//! same way they read `kubectl get --raw /apis/metrics.k8s.io/v1beta1/pods`.

use chrono::SecondsFormat;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{CpuQuantity, MemoryQuantity, UsageSnapshot};

pub const METRICS_API_VERSION: &str = "metrics.k8s.io/v1beta1";

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";

/// Resource name to quantity, holding only observed resources
pub type ResourceList = BTreeMap<String, Quantity>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub name: String,
    pub usage: ResourceList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    pub timestamp: String,
    pub window: String,
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub metadata: ObjectMeta,
    pub timestamp: String,
    pub window: String,
    pub usage: ResourceList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetricsList {
    pub api_version: String,
    pub kind: String,
    pub metadata: ListMeta,
    pub items: Vec<PodMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetricsList {
    pub api_version: String,
    pub kind: String,
    pub metadata: ListMeta,
    pub items: Vec<NodeMetrics>,
}

fn resource_list(cpu: Option<CpuQuantity>, memory: Option<MemoryQuantity>) -> ResourceList {
    let mut usage = ResourceList::new();
    if let Some(cpu) = cpu {
        usage.insert(RESOURCE_CPU.to_string(), cpu.to_k8s());
    }
    if let Some(memory) = memory {
        usage.insert(RESOURCE_MEMORY.to_string(), memory.to_k8s());
    }
    usage
}

impl UsageSnapshot {
    fn rfc3339_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn to_pod_metrics_list(&self) -> PodMetricsList {
        let timestamp = self.rfc3339_timestamp();
        let items = self
            .pods
            .iter()
            .map(|pod| PodMetrics {
                metadata: ObjectMeta {
                    name: Some(pod.name.clone()),
                    namespace: Some(pod.namespace.clone()),
                    ..ObjectMeta::default()
                },
                timestamp: timestamp.clone(),
                window: self.window.clone(),
                containers: pod
                    .containers
                    .iter()
                    .map(|c| ContainerMetrics {
                        name: c.name.clone(),
                        usage: resource_list(c.cpu, c.memory),
                    })
                    .collect(),
            })
            .collect();

        PodMetricsList {
            api_version: METRICS_API_VERSION.to_string(),
            kind: "PodMetricsList".to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }

    pub fn to_node_metrics_list(&self) -> NodeMetricsList {
        let timestamp = self.rfc3339_timestamp();
        let items = self
            .nodes
            .iter()
            .map(|node| NodeMetrics {
                metadata: ObjectMeta {
                    name: Some(node.name.clone()),
                    ..ObjectMeta::default()
                },
                timestamp: timestamp.clone(),
                window: self.window.clone(),
                usage: resource_list(node.cpu, node.memory),
            })
            .collect();

        NodeMetricsList {
            api_version: METRICS_API_VERSION.to_string(),
            kind: "NodeMetricsList".to_string(),
            metadata: ListMeta::default(),
            items,
        }
    }
}
