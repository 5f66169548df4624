//! `kusage snapshot`

use anyhow::Result;
use usage_lib::UsageSource;

use crate::output::print_json;

/// Print the whole snapshot as JSON
pub async fn run(source: &UsageSource) -> Result<()> {
    let snapshot = super::fetch_snapshot(source).await?;
    print_json(&snapshot)
}
