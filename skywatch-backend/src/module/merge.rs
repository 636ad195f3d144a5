///! Identity-based merge of flight records from several sources

use indexmap::IndexMap;
use skywatch_common::{AirportRef, FlightRecord};

/// Take `incoming` only when `current` is missing or empty
fn keep_first(current: &mut Option<String>, incoming: Option<String>) {
    if current.as_deref().is_none_or(str::is_empty) {
        if let Some(value) = incoming.filter(|v| !v.is_empty()) {
            *current = Some(value);
        }
    }
}

fn keep_first_airport(current: &mut AirportRef, incoming: AirportRef) {
    keep_first(&mut current.id, incoming.id);
    keep_first(&mut current.name, incoming.name);
    keep_first(&mut current.country, incoming.country);
}

/// Fold a later record for the same aircraft into the accepted one.
///
/// Kinematics come from the later record. Descriptive fields keep the first
/// non-empty value seen, field by field.
fn combine(existing: &mut FlightRecord, incoming: FlightRecord) {
    existing.position = incoming.position;
    existing.motion = incoming.motion;
    existing.distance_km = incoming.distance_km;

    if existing.callsign.is_empty() {
        existing.callsign = incoming.callsign;
    }
    keep_first(&mut existing.airline, incoming.airline);
    keep_first(&mut existing.aircraft.type_code, incoming.aircraft.type_code);
    keep_first(&mut existing.aircraft.model, incoming.aircraft.model);
    keep_first(&mut existing.aircraft.registration, incoming.aircraft.registration);
    keep_first_airport(&mut existing.origin, incoming.origin);
    keep_first_airport(&mut existing.destination, incoming.destination);
}

/// Merge records in precedence order (earlier sources first).
///
/// Records without an identifier are skipped. The first record of an
/// aircraft is only accepted if it knows part of its route; later records of
/// an accepted aircraft are combined into it. Output is in first-seen order.
pub fn merge_flights(records: impl IntoIterator<Item = FlightRecord>) -> Vec<FlightRecord> {
    let mut accepted: IndexMap<String, FlightRecord> = IndexMap::new();

    for record in records {
        if record.identifier.is_empty() {
            continue;
        }

        match accepted.get_mut(&record.identifier) {
            Some(existing) => combine(existing, record),
            None if record.has_route() => {
                accepted.insert(record.identifier.clone(), record);
            }
            None => {}
        }
    }

    accepted.into_values().collect()
}
