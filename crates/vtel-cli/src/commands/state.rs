//! State command - read vehicle state resources

use anyhow::{Context, Result};
use vtel_client::{Resource, VehicleClient};

use crate::output::OutputContext;

/// Read one state resource, or the full snapshot when none is named
pub async fn state(
    client: &VehicleClient,
    vehicle_id: u64,
    resource: Option<Resource>,
    ctx: &OutputContext,
) -> Result<()> {
    match resource {
        Some(resource) => {
            let state = client
                .fetch_resource(resource, vehicle_id)
                .await
                .with_context(|| format!("Failed to read {}", resource))?;
            ctx.print_document(&state);
        }
        None => {
            let snapshot = client
                .fetch_all(vehicle_id)
                .await
                .context("Failed to read vehicle state")?;
            ctx.print_document(&snapshot);
        }
    }
    Ok(())
}
