///! Public entry point: validate, fetch from every source, merge, sort

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use skywatch_common::{FlightRecord, NearbyFlights};
use thiserror::Error;
use tracing::{info, Instrument};

use super::merge::merge_flights;
use super::source::{FanOutLimits, FlightRadarSource, FlightSource, OpenSkySource, QueryPoint};
use crate::config::SkywatchConfig;

pub const MAX_RADIUS_KM: f64 = 500.0;

/// Rejected query parameters. Raised before any upstream request.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),

    #[error("radius {0} km is outside (0, 500]")]
    InvalidRadius(f64),
}

pub fn validate_query(lat: f64, lon: f64, radius_km: f64) -> Result<QueryPoint, QueryError> {
    // Written so NaN fails every check
    if !(-90.0..=90.0).contains(&lat) {
        return Err(QueryError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(QueryError::InvalidLongitude(lon));
    }
    if !(radius_km > 0.0 && radius_km <= MAX_RADIUS_KM) {
        return Err(QueryError::InvalidRadius(radius_km));
    }

    Ok(QueryPoint { lat, lon, radius_km })
}

/// Sort key treating non-finite distances as +infinity
fn sort_distance(record: &FlightRecord) -> f64 {
    if record.distance_km.is_finite() {
        record.distance_km
    } else {
        f64::INFINITY
    }
}

pub fn sort_by_distance(flights: &mut [FlightRecord]) {
    flights.sort_unstable_by(|a, b| {
        sort_distance(a)
            .partial_cmp(&sort_distance(b))
            .unwrap_or(Ordering::Equal)
    });
}

/// Queries its sources in parallel and reconciles their answers.
///
/// Source order is merge precedence: earlier sources win descriptive fields,
/// later sources win kinematics.
pub struct FlightAggregator {
    sources: Vec<Arc<dyn FlightSource>>,
}

impl FlightAggregator {
    pub fn new(sources: Vec<Arc<dyn FlightSource>>) -> Self {
        Self { sources }
    }

    /// Build the enabled sources described by `config`, primary first
    pub fn from_config(config: &SkywatchConfig) -> anyhow::Result<Self> {
        let limits = FanOutLimits::from(&config.enrichment);
        let mut sources: Vec<Arc<dyn FlightSource>> = Vec::new();

        if config.primary.enabled {
            sources.push(Arc::new(OpenSkySource::new(config.primary.clone(), limits)?));
        }
        if config.secondary.enabled {
            sources.push(Arc::new(FlightRadarSource::new(config.secondary.clone(), limits)?));
        }

        if sources.is_empty() {
            tracing::warn!("No flight sources enabled, every query will be empty");
        }

        Ok(Self::new(sources))
    }

    /// Source tag for results, e.g. "opensky+flightradar24"
    pub fn source_tag(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join("+")
    }

    pub async fn get_nearby_flights(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
    ) -> Result<NearbyFlights, QueryError> {
        let query = validate_query(lat, lon, radius_km)?;

        let span = tracing::info_span!(
            "nearby_flights",
            request_id = %uuid::Uuid::now_v7(),
            lat,
            lon,
            radius_km
        );

        let result = async move {
            let timestamp = Utc::now();
            let results = join_all(self.sources.iter().map(|source| source.fetch(query))).await;

            let fetched: usize = results.iter().map(Vec::len).sum();
            let mut flights = merge_flights(results.into_iter().flatten());
            sort_by_distance(&mut flights);

            info!("{} records from {} sources merged into {} flights", fetched, self.sources.len(), flights.len());

            NearbyFlights {
                flights,
                source: self.source_tag(),
                timestamp,
            }
        }
        .instrument(span)
        .await;

        Ok(result)
    }
}
