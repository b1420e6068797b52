//! Stream command - real-time vehicle telemetry

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vtel_client::streaming::STREAM_COLUMNS;
use vtel_client::{StreamError, StreamEvent, VehicleClient};

use crate::output::{or_dash, OutputContext, OutputFormat, StreamRow};

/// Stream telemetry for the vehicle with REST id `vehicle_id`
///
/// With `reconnect`, every disconnect is followed by a new connection using
/// the next streaming token until the tokens run out or Ctrl+C is pressed.
pub async fn stream(
    client: &VehicleClient,
    vehicle_id: u64,
    reconnect: bool,
    ctx: &OutputContext,
) -> Result<()> {
    let mut vehicles = client.list_vehicles().await?;
    let vehicle = vehicles
        .iter_mut()
        .find(|v| v.id == vehicle_id)
        .with_context(|| format!("Vehicle {} not found", vehicle_id))?;

    let mut stream = client.stream(vehicle);
    ctx.info(&format!(
        "Streaming vehicle {} ({} token(s) available)...",
        vehicle_id,
        stream.remaining_tokens()
    ));
    ctx.info("Press Ctrl+C to stop");

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    // For CSV, print header once
    if ctx.format == OutputFormat::Csv {
        let headers: Vec<&str> = std::iter::once("timestamp")
            .chain(STREAM_COLUMNS.iter().copied())
            .collect();
        println!("{}", headers.join(","));
    }

    'connect: while running.load(Ordering::SeqCst) {
        let mut session = match stream.connect().await {
            Ok(session) => session,
            Err(StreamError::TokensExhausted) => {
                ctx.warn("No streaming tokens left");
                break;
            }
            Err(e) if reconnect => {
                ctx.warn(&format!("Connection failed: {}", e));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        while running.load(Ordering::SeqCst) {
            tokio::select! {
                item = session.next() => {
                    match item {
                        Some(Ok(event)) => print_stream_event(&event, ctx),
                        Some(Err(e)) if e.is_terminal() => {
                            ctx.warn(&format!("Stream ended: {}", e));
                            if reconnect {
                                continue 'connect;
                            }
                            break 'connect;
                        }
                        Some(Err(e)) => ctx.warn(&format!("Skipped line: {}", e)),
                        None => break 'connect,
                    }
                }
                _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {
                    // Check running flag periodically
                }
            }
        }

        session.close();
    }

    ctx.success("Stream stopped");
    Ok(())
}

/// Print a telemetry event in the appropriate format
fn print_stream_event(event: &StreamEvent, ctx: &OutputContext) {
    match ctx.format {
        OutputFormat::Table => {
            let row = StreamRow {
                timestamp: or_dash(event.timestamp.map(|t| t.format("%H:%M:%S"))),
                speed: or_dash(event.speed),
                soc: or_dash(event.soc),
                power: or_dash(event.power),
                shift_state: or_dash(event.shift_state),
                range: or_dash(event.range),
                position: match (event.est_lat, event.est_lng) {
                    (Some(lat), Some(lng)) => format!("{:.5},{:.5}", lat, lng),
                    _ => "-".to_string(),
                },
            };
            // Simple inline display for streaming
            println!(
                "[{}] speed={} soc={}% power={} shift={} range={} pos={}",
                row.timestamp,
                row.speed,
                row.soc,
                row.power,
                row.shift_state,
                row.range,
                row.position
            );
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string(event) {
                println!("{}", json);
            }
        }
        OutputFormat::Csv => {
            println!("{}", event.to_line());
        }
    }
}
