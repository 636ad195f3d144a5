///! Static code-to-name tables used by the text renderer

use std::collections::HashMap;
use std::sync::OnceLock;

const AIRCRAFT_TYPES_JSON: &str = include_str!("../../resources/aircraft_types.json");
const AIRLINES_JSON: &str = include_str!("../../resources/airlines.json");
const AIRPORTS_JSON: &str = include_str!("../../resources/airports.json");

type NameTable = HashMap<String, String>;

fn load_table(name: &str, json: &str) -> NameTable {
    match serde_json::from_str(json) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!("Failed to parse {} table: {}", name, e);
            HashMap::new()
        }
    }
}

fn aircraft_types() -> &'static NameTable {
    static TABLE: OnceLock<NameTable> = OnceLock::new();
    TABLE.get_or_init(|| load_table("aircraft type", AIRCRAFT_TYPES_JSON))
}

fn airlines() -> &'static NameTable {
    static TABLE: OnceLock<NameTable> = OnceLock::new();
    TABLE.get_or_init(|| load_table("airline", AIRLINES_JSON))
}

fn airports() -> &'static NameTable {
    static TABLE: OnceLock<NameTable> = OnceLock::new();
    TABLE.get_or_init(|| load_table("airport", AIRPORTS_JSON))
}

/// Full model name for an ICAO type designator, e.g. "B738"
pub fn aircraft_model_name(code: &str) -> Option<&'static str> {
    aircraft_types().get(&code.trim().to_uppercase()).map(String::as_str)
}

/// Airline name for an ICAO airline code, e.g. "LOT"
pub fn airline_name(code: &str) -> Option<&'static str> {
    airlines().get(&code.trim().to_uppercase()).map(String::as_str)
}

/// Airport name for an IATA or ICAO code
pub fn airport_name(code: &str) -> Option<&'static str> {
    airports().get(&code.trim().to_uppercase()).map(String::as_str)
}
