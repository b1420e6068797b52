//! vtel - Command-line tool for vehicle state and telemetry
//!
//! Authorizes against the vehicle API, reads state resources and follows the
//! telemetry stream.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vtel_client::{Resource, VehicleClient};

use crate::config::{Config, CredentialConfig, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "vtel")]
#[command(author, version, about = "Vehicle state and telemetry CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Single server hosting the auth, REST and streaming endpoints
    #[arg(short, long, env = "VTEL_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "VTEL_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (falls back to the config file, then table)
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// OAuth client id
    #[arg(long, env = "VTEL_CLIENT_ID", hide_env_values = true, global = true)]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, env = "VTEL_CLIENT_SECRET", hide_env_values = true, global = true)]
    client_secret: Option<String>,

    /// Account email
    #[arg(long, env = "VTEL_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "VTEL_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List vehicles on the account
    Vehicles,

    /// Read vehicle state
    State {
        /// Vehicle REST id
        id: u64,

        /// Single resource: charge, climate, drive, gui, vehicle, service
        #[arg(short, long)]
        resource: Option<Resource>,
    },

    /// Show whether remote access is enabled
    Mobile {
        /// Vehicle REST id
        id: u64,
    },

    /// List nearby charging sites
    Chargers {
        /// Vehicle REST id
        id: u64,
    },

    /// Stream real-time telemetry
    Stream {
        /// Vehicle REST id
        id: u64,

        /// Reconnect with the next streaming token after each disconnect
        #[arg(long)]
        reconnect: bool,
    },

    /// Authorize and show token details
    Token {
        /// Also print the access token
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let credentials = CredentialConfig {
        client_id: cli.client_id.clone(),
        client_secret: cli.client_secret.clone(),
        email: cli.email.clone(),
        password: cli.password.clone(),
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.output.map(Into::into),
        cli.no_color,
        &credentials,
    );

    // Create output context
    let ctx = OutputContext::new(merged.output_format()?, merged.no_color, cli.quiet);

    let client = match create_client(&merged).await {
        Ok(client) => client,
        Err(e) => {
            ctx.error(&format!("{:#}", e));
            std::process::exit(1);
        }
    };

    // Execute command
    match &cli.command {
        Commands::Vehicles => {
            commands::vehicles(&client, &ctx).await?;
        }

        Commands::State { id, resource } => {
            commands::state(&client, *id, *resource, &ctx).await?;
        }

        Commands::Mobile { id } => {
            commands::mobile(&client, *id, &ctx).await?;
        }

        Commands::Chargers { id } => {
            commands::chargers(&client, *id, &ctx).await?;
        }

        Commands::Stream { id, reconnect } => {
            commands::stream(&client, *id, *reconnect, &ctx).await?;
        }

        Commands::Token { show } => {
            commands::token(&client, *show, &ctx).await?;
        }
    }

    Ok(())
}

/// Authorize and create a vehicle client
async fn create_client(merged: &MergedConfig) -> Result<VehicleClient> {
    let config = merged.client_config()?;
    let credential = merged.credentials.credential()?;
    VehicleClient::connect(config, credential)
        .await
        .context("Failed to authorize")
}

// Implement conversion for OutputFormat to string (for config merge)
impl From<OutputFormat> for &str {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}
