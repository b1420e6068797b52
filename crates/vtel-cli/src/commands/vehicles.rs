//! Vehicles command - list the account's vehicles

use anyhow::Result;
use vtel_client::VehicleClient;

use crate::output::{or_dash, OutputContext, VehicleRow};

/// List all vehicles on the account
pub async fn vehicles(client: &VehicleClient, ctx: &OutputContext) -> Result<()> {
    let vehicles = client.list_vehicles().await?;

    let rows: Vec<VehicleRow> = vehicles
        .into_iter()
        .map(|v| VehicleRow {
            id: v.id.to_string(),
            vehicle_id: v.vehicle_id.to_string(),
            name: or_dash(v.display_name),
            vin: or_dash(v.vin),
            state: v.state.unwrap_or_else(|| "unknown".to_string()),
            tokens: v.tokens.len().to_string(),
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
