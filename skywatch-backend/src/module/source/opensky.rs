///! OpenSky Network state-vector source
///!
///! Fetches all state vectors inside the query box, keeps those within the
///! radius, then looks up each aircraft's recent route (departure/arrival
///! airport) from the flight history endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use skywatch_common::{non_empty, FlightRecord, Motion, Position};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{enrich_all, Enrichment, FanOutLimits, FlightSource, QueryPoint};
use crate::config::PrimaryConfig;
use crate::module::geo;

/// Column positions in an OpenSky state vector array
mod col {
    pub const ICAO24: usize = 0;
    pub const CALLSIGN: usize = 1;
    pub const LONGITUDE: usize = 5;
    pub const LATITUDE: usize = 6;
    pub const BARO_ALTITUDE: usize = 7;
    pub const VELOCITY: usize = 9;
    pub const TRUE_TRACK: usize = 10;
    pub const GEO_ALTITUDE: usize = 13;
}

#[derive(Debug, Deserialize)]
struct StatesResponse {
    /// `null` when nothing is inside the box
    states: Option<Vec<Vec<Value>>>,
}

/// One state vector, reduced to the fields we use
#[derive(Debug, Clone, PartialEq)]
struct StateVector {
    icao24: String,
    callsign: String,
    latitude: f64,
    longitude: f64,
    /// Meters; barometric, falling back to geometric
    altitude: f64,
    /// m/s
    velocity: f64,
    true_track: f64,
}

impl StateVector {
    /// `None` for rows without a position
    fn from_row(row: &[Value]) -> Option<Self> {
        let text = |i: usize| row.get(i).and_then(Value::as_str).map(str::trim).unwrap_or_default();
        let number = |i: usize| row.get(i).and_then(Value::as_f64);

        Some(Self {
            icao24: text(col::ICAO24).to_lowercase(),
            callsign: text(col::CALLSIGN).to_string(),
            latitude: number(col::LATITUDE)?,
            longitude: number(col::LONGITUDE)?,
            altitude: number(col::BARO_ALTITUDE)
                .or_else(|| number(col::GEO_ALTITUDE))
                .unwrap_or(0.0),
            velocity: number(col::VELOCITY).unwrap_or(0.0),
            true_track: number(col::TRUE_TRACK).unwrap_or(0.0),
        })
    }
}

fn parse_states(json: &str) -> Result<Vec<StateVector>> {
    let resp: StatesResponse =
        serde_json::from_str(json).context("Failed to deserialize OpenSky states JSON")?;

    Ok(resp
        .states
        .unwrap_or_default()
        .iter()
        .filter_map(|row| StateVector::from_row(row))
        .collect())
}

/// Keep identified states within the radius and turn them into records
fn states_to_records(states: Vec<StateVector>, query: QueryPoint) -> Vec<FlightRecord> {
    states
        .into_iter()
        .filter(|s| !s.icao24.is_empty())
        .filter_map(|s| {
            let distance_km = geo::distance(query.lat, query.lon, s.latitude, s.longitude);
            if distance_km > query.radius_km {
                return None;
            }

            let mut record = FlightRecord::new(s.icao24);
            record.callsign = s.callsign;
            record.position = Position {
                latitude: s.latitude,
                longitude: s.longitude,
                altitude: s.altitude,
            };
            record.motion = Motion {
                speed: s.velocity,
                heading: s.true_track,
            };
            record.distance_km = distance_km;
            Some(record)
        })
        .collect()
}

/// One entry of the flight history for an aircraft
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightHistory {
    est_departure_airport: Option<String>,
    est_arrival_airport: Option<String>,
    #[serde(default)]
    last_seen: i64,
}

/// Departure/arrival airports of an aircraft's latest flight
#[derive(Debug, Clone, Default, PartialEq)]
struct RouteInfo {
    departure: Option<String>,
    arrival: Option<String>,
}

impl Enrichment for RouteInfo {
    fn apply(self, record: &mut FlightRecord) {
        record.origin.id = self.departure;
        record.destination.id = self.arrival;
    }
}

fn parse_route(json: &str) -> Result<RouteInfo> {
    let history: Vec<FlightHistory> =
        serde_json::from_str(json).context("Failed to deserialize OpenSky flight history JSON")?;

    let route = history
        .into_iter()
        .max_by_key(|f| f.last_seen)
        .map(|f| RouteInfo {
            departure: non_empty(&f.est_departure_airport).map(str::to_string),
            arrival: non_empty(&f.est_arrival_airport).map(str::to_string),
        })
        .unwrap_or_default();

    Ok(route)
}

pub struct OpenSkySource {
    client: Client,
    config: PrimaryConfig,
    limits: FanOutLimits,
}

impl OpenSkySource {
    pub fn new(config: PrimaryConfig, limits: FanOutLimits) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("skywatch/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config, limits })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let mut request = self.client.get(url);
        if let Some((user, pass)) = self.config.credentials() {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .context(format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP error {} for {}", response.status(), url));
        }

        response
            .text()
            .await
            .context("Failed to read OpenSky response body")
    }

    async fn lookup_route(&self, icao24: String, begin: i64, end: i64) -> Result<RouteInfo> {
        let url = format!(
            "{}/flights/aircraft?icao24={}&begin={}&end={}",
            self.base_url(),
            icao24,
            begin,
            end
        );
        let body = self.get_text(&url).await?;
        parse_route(&body)
    }

    async fn try_fetch(&self, query: QueryPoint) -> Result<Vec<FlightRecord>> {
        let bbox = geo::bounding_box(query.lat, query.lon, query.radius_km);
        let url = format!(
            "{}/states/all?lamin={}&lomin={}&lamax={}&lomax={}",
            self.base_url(),
            bbox.south,
            bbox.west,
            bbox.north,
            bbox.east
        );

        debug!("Fetching OpenSky states from {}", url);
        let body = self.get_text(&url).await?;
        let states = parse_states(&body)?;
        let total = states.len();

        let records = states_to_records(states, query);
        debug!("OpenSky: {} states in box, {} within {} km", total, records.len(), query.radius_km);

        let end = Utc::now().timestamp();
        let begin = end - self.config.route_window_hours * 3600;

        let keyed = records
            .into_iter()
            .map(|r| {
                let key = Some(r.identifier.clone());
                (r, key)
            })
            .collect();

        let enriched = enrich_all(keyed, self.limits, |icao24| self.lookup_route(icao24, begin, end)).await;

        Ok(enriched.into_iter().filter(FlightRecord::has_route).collect())
    }
}

#[async_trait]
impl FlightSource for OpenSkySource {
    fn name(&self) -> &'static str {
        "opensky"
    }

    async fn fetch(&self, query: QueryPoint) -> Vec<FlightRecord> {
        match self.try_fetch(query).await {
            Ok(records) => {
                info!("OpenSky returned {} flights with known routes", records.len());
                records
            }
            Err(e) => {
                warn!("OpenSky fetch failed: {:#}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::source::stub_http::StubServer;

    const WARSAW: QueryPoint = QueryPoint {
        lat: 52.2297,
        lon: 21.0122,
        radius_km: 50.0,
    };

    const STATES_JSON: &str = r#"{"time":1760600000,"states":[
        ["48ae21","LOT3HN  ","Poland",1760599990,1760599995,20.98,52.17,3200.4,false,180.5,273.2,-5.2,null,3250.1,"2431",false,0],
        ["","NOID    ","Poland",1760599990,1760599995,21.00,52.20,1000.0,false,100.0,90.0,0.0,null,null,null,false,0],
        ["3c6444","DLH1AB  ","Germany",1760599990,1760599995,13.40,52.52,11000.0,false,230.0,80.0,0.0,null,11100.0,"1000",false,0],
        ["4b1805","SWR2TW  ","Switzerland",null,1760599995,null,null,null,true,0.0,null,null,null,null,null,false,0],
        ["471f8d","WZZ9VA  ","Hungary",1760599990,1760599995,21.10,52.30,null,false,150.0,45.0,0.0,null,1500.0,null,false,0]
    ]}"#;

    #[test]
    fn test_parse_states_skips_rows_without_position() {
        let states = parse_states(STATES_JSON).unwrap();
        assert_eq!(states.len(), 4);

        let lot = &states[0];
        assert_eq!(lot.icao24, "48ae21");
        assert_eq!(lot.callsign, "LOT3HN");
        assert_eq!(lot.altitude, 3200.4);
        assert_eq!(lot.velocity, 180.5);
        assert_eq!(lot.true_track, 273.2);

        // Barometric altitude missing, geometric used instead
        assert_eq!(states[3].altitude, 1500.0);
    }

    #[test]
    fn test_parse_states_null_states() {
        let states = parse_states(r#"{"time":1760600000,"states":null}"#).unwrap();
        assert!(states.is_empty());
    }

    #[test]
    fn test_parse_states_malformed() {
        assert!(parse_states("<html>503</html>").is_err());
    }

    #[test]
    fn test_states_to_records_filters_radius_and_identity() {
        let states = parse_states(STATES_JSON).unwrap();
        let records = states_to_records(states, WARSAW);

        // Berlin is out of range and the anonymous state is dropped
        let ids: Vec<_> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, ["48ae21", "471f8d"]);

        for r in &records {
            assert!(r.distance_km <= WARSAW.radius_km);
            let expected = geo::distance(WARSAW.lat, WARSAW.lon, r.position.latitude, r.position.longitude);
            assert_eq!(r.distance_km, expected);
            assert!(!r.has_route());
        }
    }

    #[test]
    fn test_parse_route_takes_latest_flight() {
        let json = r#"[
            {"icao24":"48ae21","firstSeen":1760500000,"estDepartureAirport":"EPKK","lastSeen":1760503000,"estArrivalAirport":"EPWA","callsign":"LOT3HN  "},
            {"icao24":"48ae21","firstSeen":1760590000,"estDepartureAirport":"EPWA","lastSeen":1760599000,"estArrivalAirport":null,"callsign":"LOT3HN  "}
        ]"#;
        let route = parse_route(json).unwrap();
        assert_eq!(route.departure.as_deref(), Some("EPWA"));
        assert_eq!(route.arrival, None);
    }

    #[test]
    fn test_parse_route_empty_history() {
        assert_eq!(parse_route("[]").unwrap(), RouteInfo::default());
    }

    #[test]
    fn test_route_applies_to_record() {
        let mut record = FlightRecord::new("48ae21");
        RouteInfo {
            departure: Some("EPWA".to_string()),
            arrival: Some("KJFK".to_string()),
        }
        .apply(&mut record);

        assert_eq!(record.origin.code(), Some("EPWA"));
        assert_eq!(record.destination.code(), Some("KJFK"));
        assert!(record.has_route());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_yields_empty() {
        let config = PrimaryConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let source = OpenSkySource::new(config, FanOutLimits::default()).unwrap();
        assert!(source.fetch(WARSAW).await.is_empty());
    }

    fn stub_routes(target: &str) -> (u16, String) {
        if target.starts_with("/states/all?") {
            (200, STATES_JSON.to_string())
        } else if target.contains("icao24=48ae21") {
            let history = r#"[{"icao24":"48ae21","estDepartureAirport":"EPWA","estArrivalAirport":"KJFK","lastSeen":1760599000}]"#;
            (200, history.to_string())
        } else if target.contains("icao24=471f8d") {
            (200, "[]".to_string())
        } else {
            (404, String::new())
        }
    }

    fn stub_source(base_url: &str, username: Option<&str>, password: Option<&str>) -> OpenSkySource {
        let config = PrimaryConfig {
            base_url: base_url.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            timeout_secs: 5,
            ..Default::default()
        };
        OpenSkySource::new(config, FanOutLimits::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_emits_only_routed_flights() {
        let server = StubServer::start(stub_routes).await;
        let source = stub_source(&server.base_url, None, None);

        let flights = source.fetch(WARSAW).await;

        let routes: Vec<_> = flights
            .iter()
            .map(|f| (f.identifier.as_str(), f.origin.code(), f.destination.code()))
            .collect();
        assert_eq!(routes, [("48ae21", Some("EPWA"), Some("KJFK"))]);
        assert_eq!(flights[0].callsign, "LOT3HN");

        // One states request, one history lookup per in-radius aircraft
        let states = server.requests_to("/states/all");
        assert_eq!(states.len(), 1);
        assert!(states[0].contains("lamin=") && states[0].contains("lomax="));
        assert_eq!(server.requests_to("/flights/aircraft").len(), 2);
        assert!(server
            .requests()
            .iter()
            .all(|head| !head.to_lowercase().contains("authorization:")));
    }

    #[tokio::test]
    async fn test_fetch_sends_basic_auth_when_configured() {
        let server = StubServer::start(stub_routes).await;
        let source = stub_source(&server.base_url, Some("alice"), Some("secret"));

        assert_eq!(source.fetch(WARSAW).await.len(), 1);

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        for head in requests {
            // base64("alice:secret")
            assert!(head.contains("YWxpY2U6c2VjcmV0"), "missing credentials in {}", head);
        }
    }

    #[tokio::test]
    async fn test_fetch_upstream_error_status_yields_empty() {
        let server = StubServer::start(|_: &str| (503, "busy".to_string())).await;
        let source = stub_source(&server.base_url, None, None);

        assert!(source.fetch(WARSAW).await.is_empty());
        assert_eq!(server.requests_to("/flights/aircraft").len(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires network connection
    async fn test_fetch_live() {
        let source = OpenSkySource::new(PrimaryConfig::default(), FanOutLimits::default()).unwrap();
        let flights = source.fetch(WARSAW).await;
        assert!(flights.iter().all(|f| f.has_route() && !f.identifier.is_empty()));
    }
}
