///! Upstream flight sources
///!
///! Each source turns its raw upstream records into [`FlightRecord`]s and
///! performs its own per-record enrichment lookups.

use async_trait::async_trait;
use skywatch_common::FlightRecord;

mod fan_out;
pub mod flightradar;
pub mod opensky;
#[cfg(test)]
mod stub_http;

pub use fan_out::{enrich_all, Enrichment, FanOutLimits};
pub use flightradar::FlightRadarSource;
pub use opensky::OpenSkySource;

/// Centre point and radius of one nearby-flights query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

/// A flight-tracking upstream.
///
/// `fetch` never fails: upstream errors are logged and yield an empty list.
#[async_trait]
pub trait FlightSource: Send + Sync {
    /// Short name used in the result's source tag
    fn name(&self) -> &'static str;

    async fn fetch(&self, query: QueryPoint) -> Vec<FlightRecord>;
}
