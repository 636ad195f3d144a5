///! Plain-text report of nearby flights

use std::collections::BTreeMap;

use skywatch_common::{non_empty, AirportRef, FlightRecord};

use super::lookup::{aircraft_model_name, airline_name, airport_name};

pub const EMPTY_REPORT: &str = "No flights to display.";

/// "✈︎" with the text-presentation selector
const ROUTE_MARK: &str = "\u{2708}\u{FE0E}";
const UNKNOWN_AIRCRAFT: &str = "Unknown Aircraft Type";
const UNKNOWN_AIRPORT: &str = "Unknown airport";
const MISSING_CODE: &str = "N/A";

// Column widths for the numeric lines
const LABEL_WIDTH: usize = 10;
const VALUE_WIDTH: usize = 8;

fn aircraft_line(flight: &FlightRecord) -> String {
    let description = non_empty(&flight.aircraft.model)
        .and_then(aircraft_model_name)
        .or_else(|| non_empty(&flight.aircraft.type_code))
        .unwrap_or(UNKNOWN_AIRCRAFT);

    match non_empty(&flight.aircraft.registration) {
        Some(registration) => format!("{} ({})", description, registration),
        None => description.to_string(),
    }
}

fn route_line(flight: &FlightRecord) -> String {
    format!(
        "{} {} \u{2192} {}",
        ROUTE_MARK,
        flight.origin.code().unwrap_or(MISSING_CODE),
        flight.destination.code().unwrap_or(MISSING_CODE)
    )
}

fn measure(label: &str, value: String, unit: &str) -> String {
    format!("{:<lw$}{:>vw$} {}", label, value, unit, lw = LABEL_WIDTH, vw = VALUE_WIDTH)
}

fn flight_block(flight: &FlightRecord) -> String {
    let mut lines = vec![
        aircraft_line(flight),
        route_line(flight),
        format!(
            "{}   {}",
            measure("Distance:", format!("{:.2}", flight.distance_km), "km"),
            measure("Altitude:", format!("{:.0}", flight.position.altitude), "m")
        ),
        format!(
            "{}   {}",
            measure("Speed:", format!("{:.0}", flight.motion.speed), "kt"),
            measure("Heading:", format!("{:.0}", flight.motion.heading), "\u{B0}")
        ),
    ];

    if let Some(code) = non_empty(&flight.airline) {
        lines.push(format!("Airline: {}", airline_name(code).unwrap_or(code)));
    }

    lines.join("\n")
}

/// Every referenced airport code with the best name we know for it
fn airport_directory(flights: &[FlightRecord]) -> BTreeMap<String, String> {
    let mut directory: BTreeMap<String, String> = BTreeMap::new();

    let airports = flights.iter().flat_map(|f| [&f.origin, &f.destination]);
    for airport in airports {
        let Some(code) = airport.code() else {
            continue;
        };
        let name = known_airport_name(code, airport);
        let entry = directory.entry(code.to_string()).or_insert_with(|| name.to_string());
        if entry.as_str() == UNKNOWN_AIRPORT && name != UNKNOWN_AIRPORT {
            *entry = name.to_string();
        }
    }

    directory
}

fn known_airport_name<'a>(code: &str, airport: &'a AirportRef) -> &'a str {
    airport_name(code)
        .or_else(|| non_empty(&airport.name))
        .unwrap_or(UNKNOWN_AIRPORT)
}

/// Render `flights` (already distance-sorted) as a text report
pub fn render(flights: &[FlightRecord]) -> String {
    if flights.is_empty() {
        return EMPTY_REPORT.to_string();
    }

    let blocks: Vec<String> = flights.iter().map(flight_block).collect();

    let directory = airport_directory(flights)
        .into_iter()
        .map(|(code, name)| format!("{} - {}", code, name))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n\nAirports:\n{}", blocks.join("\n\n"), directory)
}
