use skywatch_backend::config;
use skywatch_backend::logging;
use skywatch_backend::module::{render, FlightAggregator};

use anyhow::Result;
use clap::Parser;
use skywatch_common::OutputFormat;

#[derive(Parser, Debug)]
#[command(version, about, long_about = "list aircraft currently near a point, merged from OpenSky and FlightRadar24")]
pub struct Args {
    /// Latitude of the query point, degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude of the query point, degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Search radius in km, up to 500
    #[arg(short, long, default_value_t = 50.0)]
    pub radius: f64,

    /// json or text
    #[arg(short, long, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let (config, origin) = config::read_config(&args.config)?;

    // Initialize logging
    let _logging_guard = logging::init_logging(
        &config.log_dir,
        "skywatch",
        &config.log_level,
        config.log_retention_days,
    )?;

    if origin == config::ConfigOrigin::Defaults {
        tracing::warn!("Config file {} not found, using defaults", args.config);
    }

    tracing::info!(
        "Looking for flights within {} km of ({}, {})",
        args.radius,
        args.lat,
        args.lon
    );

    let aggregator = FlightAggregator::from_config(config)?;

    let result = match aggregator.get_nearby_flights(args.lat, args.lon, args.radius).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Rejected query: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "{} flights from {} at {}",
        result.flights.len(),
        result.source,
        result.timestamp
    );

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => println!("{}", render(&result.flights)),
    }

    Ok(())
}
