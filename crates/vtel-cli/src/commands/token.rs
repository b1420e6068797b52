//! Token command - authorize and show the issued token

use anyhow::Result;
use chrono::Utc;
use vtel_client::VehicleClient;

use crate::output::OutputContext;

/// Show the access token issued for the configured credential
pub async fn token(client: &VehicleClient, show: bool, ctx: &OutputContext) -> Result<()> {
    let token = client.token();
    let remaining = token.remaining_at(Utc::now());

    let mut pairs = vec![
        ("Token Type", token.token_type().to_string()),
        ("Issued At", token.issued_at().to_rfc3339()),
        ("Expires At", token.expires_at().to_rfc3339()),
        ("Expires In", format!("{}h", remaining.num_hours())),
        ("Near Expiry", token.is_near_expiry().to_string()),
    ];
    if show {
        pairs.push(("Access Token", token.access_token().to_string()));
    }

    ctx.print_kv(&pairs);
    Ok(())
}
