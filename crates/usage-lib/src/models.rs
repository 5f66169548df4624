//! Core data models for usage snapshots

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use serde::{Deserialize, Serialize};
use std::fmt;

const KI: i64 = 1024;

/// Binary suffixes used when a byte count divides evenly, largest first
const BINARY_SUFFIXES: &[(i64, &str)] = &[
    (KI * KI * KI * KI, "Ti"),
    (KI * KI * KI, "Gi"),
    (KI * KI, "Mi"),
    (KI, "Ki"),
];

/// CPU usage in milli-cores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CpuQuantity(i64);

impl CpuQuantity {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Convert a cores-per-second rate, rounding to the nearest milli-core
    pub fn from_cores(cores: f64) -> Self {
        Self((cores * 1000.0).round() as i64)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn to_k8s(&self) -> K8sQuantity {
        K8sQuantity(self.to_string())
    }
}

impl fmt::Display for CpuQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

/// Memory usage in whole bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryQuantity(i64);

impl MemoryQuantity {
    pub fn from_bytes(bytes: i64) -> Self {
        Self(bytes)
    }

    /// Convert a sampled byte count, rounding to the nearest byte
    pub fn from_sample(bytes: f64) -> Self {
        Self(bytes.round() as i64)
    }

    pub fn bytes(&self) -> i64 {
        self.0
    }

    pub fn to_k8s(&self) -> K8sQuantity {
        K8sQuantity(self.to_string())
    }
}

impl fmt::Display for MemoryQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 != 0 {
            for (factor, suffix) in BINARY_SUFFIXES {
                if self.0 % factor == 0 {
                    return write!(f, "{}{}", self.0 / factor, suffix);
                }
            }
        }
        write!(f, "{}", self.0)
    }
}

/// Usage of a single container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuQuantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryQuantity>,
}

/// Usage of a pod, broken down per container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsage {
    pub fn container(&self, name: &str) -> Option<&ContainerUsage> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// Usage of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuQuantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryQuantity>,
}

/// Pod and node usage gathered in one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Rate window of the CPU queries, in Prometheus duration notation
    pub window: String,
    /// Endpoint the snapshot was read from
    pub endpoint: String,
    pub pods: Vec<PodUsage>,
    pub nodes: Vec<NodeUsage>,
}

impl UsageSnapshot {
    pub fn pod(&self, namespace: &str, name: &str) -> Option<&PodUsage> {
        self.pods
            .iter()
            .find(|p| p.namespace == namespace && p.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeUsage> {
        self.nodes.iter().find(|n| n.name == name)
    }
}
