//! Prometheus service discovery
//!
//! When no endpoint is configured, Services are searched cluster-wide with a
//! fixed, ordered list of label selectors used by the common Prometheus
//! distributions. The first usable match wins.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, ListParams};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::error::{Result, UsageError};
use crate::observability::SnapshotLogger;

/// Selectors tried in order
pub const PROMETHEUS_LABEL_SELECTORS: &[&str] = &[
    "app.kubernetes.io/name=prometheus",
    "app=kube-prometheus-stack-prometheus",
    "operated-prometheus=true",
];

/// Port preferred when a Service declares several
pub const DEFAULT_PROMETHEUS_PORT: i32 = 9090;

/// A Service as seen by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub namespace: String,
    pub name: String,
    pub ports: Vec<i32>,
}

impl From<&Service> for ServiceRecord {
    fn from(svc: &Service) -> Self {
        let ports = svc
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .map(|ports| ports.iter().map(|p| p.port).collect())
            .unwrap_or_default();

        Self {
            namespace: svc.metadata.namespace.clone().unwrap_or_default(),
            name: svc.metadata.name.clone().unwrap_or_default(),
            ports,
        }
    }
}

/// Lists Services matching a label selector across all namespaces
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn list_services(&self, selector: &str) -> Result<Vec<ServiceRecord>>;
}

#[async_trait]
impl ServiceRegistry for kube::Client {
    async fn list_services(&self, selector: &str) -> Result<Vec<ServiceRecord>> {
        let services: Api<Service> = Api::all(self.clone());
        let list = services
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(UsageError::ServiceLookup)?;

        Ok(list.items.iter().map(ServiceRecord::from).collect())
    }
}

/// A discovered backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCandidate {
    pub namespace: String,
    pub name: String,
    pub port: i32,
}

impl BackendCandidate {
    /// Build a candidate from a Service, or `None` if it declares no ports
    fn from_service(svc: ServiceRecord) -> Option<Self> {
        let port = if svc.ports.contains(&DEFAULT_PROMETHEUS_PORT) {
            DEFAULT_PROMETHEUS_PORT
        } else {
            *svc.ports.first()?
        };

        Some(Self {
            namespace: svc.namespace,
            name: svc.name,
            port,
        })
    }
}

impl fmt::Display for BackendCandidate {
    /// Rendered in the `namespace/service:port` form the proxy transport takes
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.port)
    }
}

/// Outcome of a successful discovery
#[derive(Debug, Clone)]
pub struct Discovery {
    candidates: Vec<BackendCandidate>,
}

impl Discovery {
    /// All valid candidates in selector-then-listing order
    pub fn candidates(&self) -> &[BackendCandidate] {
        &self.candidates
    }

    pub fn selected(&self) -> &BackendCandidate {
        &self.candidates[0]
    }

    /// Endpoint string for the selected candidate
    pub fn endpoint(&self) -> String {
        self.selected().to_string()
    }

    /// More than one Prometheus matched; the first was picked
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Find a Prometheus Service to query.
///
/// Selectors whose lookup fails are skipped. Fails with
/// [`UsageError::NotFound`] only when no selector yields a usable Service.
pub async fn locate(registry: &dyn ServiceRegistry) -> Result<Discovery> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for selector in PROMETHEUS_LABEL_SELECTORS {
        let services = match registry.list_services(selector).await {
            Ok(services) => services,
            Err(e) => {
                debug!(selector = %selector, error = %e, "Service lookup failed, skipping selector");
                continue;
            }
        };

        for svc in services {
            if !seen.insert((svc.namespace.clone(), svc.name.clone())) {
                continue;
            }
            match BackendCandidate::from_service(svc) {
                Some(candidate) => candidates.push(candidate),
                None => debug!(selector = %selector, "Ignoring Prometheus service without ports"),
            }
        }
    }

    if candidates.is_empty() {
        return Err(UsageError::NotFound {
            selectors: PROMETHEUS_LABEL_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        });
    }

    let discovery = Discovery { candidates };
    if discovery.is_ambiguous() {
        SnapshotLogger::default().log_ambiguous_backends(discovery.candidates());
    }

    Ok(discovery)
}
