use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position of an aircraft
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Degrees, positive north
    pub latitude: f64,
    /// Degrees, positive east
    pub longitude: f64,
    /// Meters
    pub altitude: f64,
}

/// Speed and heading as reported by the source.
///
/// Speed is kept in the source's native unit (m/s for the state-vector feed,
/// knots for the live feed).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Motion {
    pub speed: f64,
    /// Degrees clockwise from true north
    pub heading: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AircraftInfo {
    /// ICAO type designator from the live feed, e.g. "B738"
    #[serde(rename = "type")]
    pub type_code: Option<String>,
    /// Model code from the flight detail lookup
    pub model: Option<String>,
    pub registration: Option<String>,
}

/// Departure or arrival airport
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AirportRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
}

impl AirportRef {
    /// Airport code, if present and non-empty
    pub fn code(&self) -> Option<&str> {
        non_empty(&self.id)
    }
}

/// One aircraft near the query point, after adaptation and merge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    /// Hex identity code (ICAO 24-bit address), the merge key
    pub identifier: String,
    pub callsign: String,
    pub position: Position,
    pub motion: Motion,
    pub distance_km: f64,
    pub airline: Option<String>,
    pub aircraft: AircraftInfo,
    pub origin: AirportRef,
    pub destination: AirportRef,
}

impl FlightRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Whether at least one end of the route is known
    pub fn has_route(&self) -> bool {
        self.origin.code().is_some() || self.destination.code().is_some()
    }
}

/// Rectangular search region, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

/// Result of a nearby-flights query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyFlights {
    /// Sorted by ascending distance from the query point
    pub flights: Vec<FlightRecord>,
    /// Upstream sources consulted, e.g. "opensky+flightradar24"
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// How a query result is presented to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Borrow the string inside `value` unless it is missing or empty
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
