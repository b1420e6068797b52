//! Mobile command - check whether remote access is enabled

use anyhow::Result;
use vtel_client::VehicleClient;

use crate::output::OutputContext;

pub async fn mobile(client: &VehicleClient, vehicle_id: u64, ctx: &OutputContext) -> Result<()> {
    let enabled = client.mobile_enabled(vehicle_id).await?;

    ctx.print_kv(&[
        ("Vehicle", vehicle_id.to_string()),
        ("Mobile Enabled", enabled.to_string()),
    ]);
    Ok(())
}
