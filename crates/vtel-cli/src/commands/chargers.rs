//! Chargers command - nearby charging sites

use anyhow::Result;
use vtel_client::{GeoLocation, VehicleClient};

use crate::output::{ChargerRow, OutputContext};

/// List superchargers and destination chargers near the vehicle
pub async fn chargers(client: &VehicleClient, vehicle_id: u64, ctx: &OutputContext) -> Result<()> {
    let sites = client.nearby_charging_sites(vehicle_id).await?;

    let superchargers = sites.superchargers.into_iter().map(|s| ChargerRow {
        kind: "supercharger".to_string(),
        name: s.name,
        distance_miles: format!("{:.1}", s.distance_miles),
        stalls: if s.site_closed {
            "closed".to_string()
        } else {
            format!("{}/{}", s.available_stalls, s.total_stalls)
        },
        location: format_location(&s.location),
    });

    let destinations = sites.destination_charging.into_iter().map(|d| ChargerRow {
        kind: "destination".to_string(),
        name: d.name,
        distance_miles: format!("{:.1}", d.distance_miles),
        stalls: "-".to_string(),
        location: format_location(&d.location),
    });

    let rows: Vec<ChargerRow> = superchargers.chain(destinations).collect();
    ctx.print(&rows);
    Ok(())
}

fn format_location(location: &GeoLocation) -> String {
    format!("{:.5},{:.5}", location.lat, location.long)
}
