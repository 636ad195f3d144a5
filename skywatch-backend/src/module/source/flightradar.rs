///! FlightRadar24 live feed source
///!
///! The zone feed answers with a JSONP-wrapped object whose array values are
///! live tracks keyed by flight id. Each track with a flight id is then
///! enriched from the per-flight detail endpoint (airline, model, airports).

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use skywatch_common::{non_empty, AirportRef, FlightRecord, Motion, Position};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{enrich_all, Enrichment, FanOutLimits, FlightSource, QueryPoint};
use crate::config::SecondaryConfig;
use crate::module::geo;

const FEET_TO_METERS: f64 = 0.3048;

/// Column positions in a feed track array
mod col {
    pub const ICAO24: usize = 0;
    pub const LATITUDE: usize = 1;
    pub const LONGITUDE: usize = 2;
    pub const HEADING: usize = 3;
    pub const ALTITUDE_FT: usize = 4;
    pub const SPEED_KT: usize = 5;
    pub const AIRCRAFT_TYPE: usize = 8;
    pub const REGISTRATION: usize = 9;
    pub const ORIGIN: usize = 11;
    pub const DESTINATION: usize = 12;
    pub const CALLSIGN: usize = 16;
    pub const AIRLINE: usize = 18;
}

fn jsonp_regex() -> &'static Regex {
    static JSONP: OnceLock<Regex> = OnceLock::new();
    JSONP.get_or_init(|| {
        Regex::new(r"(?s)^\s*[A-Za-z_$][\w$.]*\s*\((.*)\)\s*;?\s*$").expect("valid JSONP pattern")
    })
}

/// Strip a `callback( ... );` wrapper. Plain JSON is returned as is.
fn unwrap_jsonp(body: &str) -> &str {
    match jsonp_regex().captures(body).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => body.trim(),
    }
}

/// A live track from the zone feed
#[derive(Debug, Clone, PartialEq)]
struct Track {
    /// Feed key, used for the detail lookup
    flight_id: String,
    icao24: String,
    callsign: String,
    latitude: f64,
    longitude: f64,
    heading: f64,
    altitude_ft: f64,
    speed_kt: f64,
    aircraft_type: Option<String>,
    registration: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    airline: Option<String>,
}

impl Track {
    fn from_entry(flight_id: &str, row: &[Value]) -> Option<Self> {
        let text = |i: usize| {
            row.get(i)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let number = |i: usize| row.get(i).and_then(Value::as_f64);

        Some(Self {
            flight_id: flight_id.to_string(),
            icao24: text(col::ICAO24).unwrap_or_default().to_lowercase(),
            callsign: text(col::CALLSIGN).unwrap_or_default(),
            latitude: number(col::LATITUDE)?,
            longitude: number(col::LONGITUDE)?,
            heading: number(col::HEADING).unwrap_or(0.0),
            altitude_ft: number(col::ALTITUDE_FT).unwrap_or(0.0),
            speed_kt: number(col::SPEED_KT).unwrap_or(0.0),
            aircraft_type: text(col::AIRCRAFT_TYPE),
            registration: text(col::REGISTRATION),
            origin: text(col::ORIGIN),
            destination: text(col::DESTINATION),
            airline: text(col::AIRLINE),
        })
    }
}

/// Parse the (possibly JSONP-wrapped) zone feed into tracks.
///
/// Non-array members such as `full_count` and `version` are ignored.
fn parse_feed(body: &str) -> Result<Vec<Track>> {
    let feed: Map<String, Value> = serde_json::from_str(unwrap_jsonp(body))
        .context("Failed to deserialize FlightRadar24 feed JSON")?;

    Ok(feed
        .iter()
        .filter_map(|(key, value)| value.as_array().map(|row| (key, row)))
        .filter_map(|(key, row)| Track::from_entry(key, row))
        .collect())
}

/// Keep identified tracks within the radius, paired with their detail key
fn tracks_to_records(tracks: Vec<Track>, query: QueryPoint) -> Vec<(FlightRecord, Option<String>)> {
    tracks
        .into_iter()
        .filter(|t| !t.icao24.is_empty())
        .filter_map(|t| {
            let distance_km = geo::distance(query.lat, query.lon, t.latitude, t.longitude);
            if distance_km > query.radius_km {
                return None;
            }

            let mut record = FlightRecord::new(t.icao24);
            record.callsign = t.callsign;
            record.position = Position {
                latitude: t.latitude,
                longitude: t.longitude,
                altitude: t.altitude_ft * FEET_TO_METERS,
            };
            record.motion = Motion {
                speed: t.speed_kt,
                heading: t.heading,
            };
            record.distance_km = distance_km;
            record.airline = t.airline;
            record.aircraft.type_code = t.aircraft_type;
            record.aircraft.registration = t.registration;
            record.origin.id = t.origin;
            record.destination.id = t.destination;

            let key = Some(t.flight_id).filter(|id| !id.is_empty());
            Some((record, key))
        })
        .collect()
}

// ---- flight detail payload ----

#[derive(Debug, Default, Deserialize)]
struct CodePair {
    iata: Option<String>,
    icao: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelInfo {
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailAircraft {
    model: Option<ModelInfo>,
    registration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailAirline {
    name: Option<String>,
    code: Option<CodePair>,
}

#[derive(Debug, Default, Deserialize)]
struct CountryInfo {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AirportPosition {
    country: Option<CountryInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct DetailAirport {
    name: Option<String>,
    code: Option<CodePair>,
    position: Option<AirportPosition>,
}

impl DetailAirport {
    fn into_ref(self) -> AirportRef {
        let (iata, icao) = self.code.map(|c| (c.iata, c.icao)).unwrap_or_default();
        let id = non_empty(&iata).or(non_empty(&icao)).map(str::to_string);

        AirportRef {
            id,
            name: self.name,
            country: self.position.and_then(|p| p.country).and_then(|c| c.name),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DetailAirports {
    origin: Option<DetailAirport>,
    destination: Option<DetailAirport>,
}

#[derive(Debug, Default, Deserialize)]
struct FlightDetail {
    aircraft: Option<DetailAircraft>,
    airline: Option<DetailAirline>,
    airport: Option<DetailAirports>,
}

/// Overwrite `slot` only with a non-empty value
fn set_if_present(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *slot = Some(value);
    }
}

fn merge_airport(slot: &mut AirportRef, detail: Option<DetailAirport>) {
    if let Some(detail) = detail {
        let detail = detail.into_ref();
        set_if_present(&mut slot.id, detail.id);
        set_if_present(&mut slot.name, detail.name);
        set_if_present(&mut slot.country, detail.country);
    }
}

impl Enrichment for FlightDetail {
    fn apply(self, record: &mut FlightRecord) {
        if let Some(airline) = self.airline {
            let icao = airline.code.and_then(|c| c.icao);
            set_if_present(&mut record.airline, icao.filter(|c| !c.is_empty()).or(airline.name));
        }

        if let Some(aircraft) = self.aircraft {
            set_if_present(&mut record.aircraft.model, aircraft.model.and_then(|m| m.code));
            set_if_present(&mut record.aircraft.registration, aircraft.registration);
        }

        if let Some(airport) = self.airport {
            merge_airport(&mut record.origin, airport.origin);
            merge_airport(&mut record.destination, airport.destination);
        }
    }
}

fn parse_detail(json: &str) -> Result<FlightDetail> {
    serde_json::from_str(json).context("Failed to deserialize FlightRadar24 flight detail JSON")
}

pub struct FlightRadarSource {
    client: Client,
    config: SecondaryConfig,
    limits: FanOutLimits,
}

impl FlightRadarSource {
    pub fn new(config: SecondaryConfig, limits: FanOutLimits) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 skywatch/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config, limits })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context(format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP error {} for {}", response.status(), url));
        }

        response
            .text()
            .await
            .context("Failed to read FlightRadar24 response body")
    }

    async fn lookup_detail(&self, flight_id: String) -> Result<FlightDetail> {
        let url = format!("{}?flight={}", self.config.detail_url, flight_id);
        let body = self.get_text(&url).await?;
        parse_detail(&body)
    }

    async fn try_fetch(&self, query: QueryPoint) -> Result<Vec<FlightRecord>> {
        let bbox = geo::bounding_box(query.lat, query.lon, query.radius_km);
        let url = format!(
            "{}?bounds={:.4},{:.4},{:.4},{:.4}&faa=1&satellite=1&mlat=1&flarm=1&adsb=1&gnd=0&air=1&vehicles=0&estimated=1&gliders=0&stats=0&callback=jsonp",
            self.config.feed_url,
            bbox.north,
            bbox.south,
            bbox.west,
            bbox.east
        );

        debug!("Fetching FlightRadar24 feed from {}", url);
        let body = self.get_text(&url).await?;
        let tracks = parse_feed(&body)?;
        let total = tracks.len();

        let keyed = tracks_to_records(tracks, query);
        debug!(
            "FlightRadar24: {} tracks in box, {} within {} km",
            total,
            keyed.len(),
            query.radius_km
        );

        let enriched = enrich_all(keyed, self.limits, |flight_id| self.lookup_detail(flight_id)).await;

        Ok(enriched.into_iter().filter(FlightRecord::has_route).collect())
    }
}

#[async_trait]
impl FlightSource for FlightRadarSource {
    fn name(&self) -> &'static str {
        "flightradar24"
    }

    async fn fetch(&self, query: QueryPoint) -> Vec<FlightRecord> {
        match self.try_fetch(query).await {
            Ok(records) => {
                info!("FlightRadar24 returned {} flights with known routes", records.len());
                records
            }
            Err(e) => {
                warn!("FlightRadar24 fetch failed: {:#}", e);
                Vec::new()
            }
        }
    }
}
