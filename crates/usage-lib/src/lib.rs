//! Prometheus-backed resource usage for capacity planning
//!
//! This crate provides the core functionality for:
//! - Locating a Prometheus service in the cluster
//! - Querying it directly or through the API server's service proxy
//! - Folding container and node samples into pod and node usage
//! - Rendering the result in the metrics.k8s.io shape
//! - Structured logging and query metrics

pub mod aggregator;
pub mod error;
pub mod locator;
pub mod metrics_api;
pub mod models;
pub mod observability;
pub mod query;
pub mod sample;
pub mod source;

pub use error::{Result, UsageError};
pub use locator::{locate, BackendCandidate, Discovery, ServiceRecord, ServiceRegistry};
pub use models::*;
pub use observability::{SnapshotLogger, SourceMetrics};
pub use query::{Endpoint, QueryExecutor, QueryResponse, Transport};
pub use source::{MetricKind, ResolvedEndpoint, SourceConfig, UsageSource};
