pub mod discover;
pub mod nodes;
pub mod pods;
pub mod snapshot;

use anyhow::Result;
use usage_lib::{UsageSnapshot, UsageSource};

use crate::output::{print_info, print_warning};

/// Resolve the backend, tell the user how it was found, then query it
pub async fn fetch_snapshot(source: &UsageSource) -> Result<UsageSnapshot> {
    let resolved = source.resolve_endpoint().await?;

    if let Some(discovery) = &resolved.discovery {
        print_info(&format!("Discovered Prometheus at {}", discovery.endpoint()));
        if discovery.is_ambiguous() {
            print_warning(&format!(
                "{} Prometheus services matched; run `kusage discover` to list them",
                discovery.candidates().len()
            ));
        }
    }

    Ok(source.snapshot_at(&resolved).await?)
}
