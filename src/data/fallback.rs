//! Synthetic "popular flights" catalogue
//!
//! Used whenever the live provider is unavailable or has nothing to offer.
//! The catalogue is fixed; only the travel dates move, so the offers always
//! look current. Outbound flights leave 30 days after "now" and return a week
//! later.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::{Map, Value};

use super::{FlightEndpoint, FlightOffer, Itinerary, Price, Segment};

/// Days from "now" to the outbound flight
pub const OUTBOUND_OFFSET_DAYS: i64 = 30;

/// Days from "now" to the return flight
pub const RETURN_OFFSET_DAYS: i64 = 37;

/// Value of the `source` field on every synthetic offer
pub const FALLBACK_SOURCE: &str = "FALLBACK";

const ORIGIN: &str = "LHR";
const CURRENCY: &str = "GBP";

/// One leg of a catalogue route: local times, flight number, duration and
/// whether the arrival lands on the next day
struct Leg {
    number: &'static str,
    departs: &'static str,
    arrives: &'static str,
    overnight: bool,
    duration: &'static str,
}

struct Route {
    destination: &'static str,
    carrier: &'static str,
    total: &'static str,
    outbound: Leg,
    inbound: Leg,
}

const ROUTES: [Route; 6] = [
    Route {
        destination: "CDG",
        carrier: "AF",
        total: "89.00",
        outbound: Leg { number: "1081", departs: "07:15", arrives: "09:30", overnight: false, duration: "PT1H15M" },
        inbound: Leg { number: "1680", departs: "18:45", arrives: "19:05", overnight: false, duration: "PT1H20M" },
    },
    Route {
        destination: "BCN",
        carrier: "BA",
        total: "112.00",
        outbound: Leg { number: "478", departs: "07:30", arrives: "10:40", overnight: false, duration: "PT2H10M" },
        inbound: Leg { number: "479", departs: "11:35", arrives: "12:55", overnight: false, duration: "PT2H20M" },
    },
    Route {
        destination: "FCO",
        carrier: "AZ",
        total: "134.00",
        outbound: Leg { number: "203", departs: "09:40", arrives: "13:15", overnight: false, duration: "PT2H35M" },
        inbound: Leg { number: "204", departs: "14:30", arrives: "16:20", overnight: false, duration: "PT2H50M" },
    },
    Route {
        destination: "JFK",
        carrier: "BA",
        total: "389.00",
        outbound: Leg { number: "117", departs: "08:25", arrives: "11:15", overnight: false, duration: "PT7H50M" },
        inbound: Leg { number: "112", departs: "18:30", arrives: "06:40", overnight: true, duration: "PT7H10M" },
    },
    Route {
        destination: "DXB",
        carrier: "EK",
        total: "445.00",
        outbound: Leg { number: "2", departs: "14:30", arrives: "00:40", overnight: true, duration: "PT7H10M" },
        inbound: Leg { number: "1", departs: "07:45", arrives: "11:50", overnight: false, duration: "PT8H05M" },
    },
    Route {
        destination: "BKK",
        carrier: "TG",
        total: "489.00",
        outbound: Leg { number: "917", departs: "12:20", arrives: "06:10", overnight: true, duration: "PT11H50M" },
        inbound: Leg { number: "916", departs: "00:30", arrives: "06:45", overnight: false, duration: "PT13H15M" },
    },
];

/// Builds the fallback catalogue relative to `now`
///
/// Pure: the same `now` always yields the same offers.
pub fn fallback_offers(now: DateTime<Utc>) -> Vec<FlightOffer> {
    let today = now.date_naive();
    let outbound_date = today + Duration::days(OUTBOUND_OFFSET_DAYS);
    let return_date = today + Duration::days(RETURN_OFFSET_DAYS);

    ROUTES
        .iter()
        .enumerate()
        .map(|(i, route)| {
            let mut extra = Map::new();
            extra.insert("type".to_string(), Value::from("flight-offer"));
            extra.insert("source".to_string(), Value::from(FALLBACK_SOURCE));

            FlightOffer {
                id: format!("fallback-{}", i + 1),
                price: Price {
                    total: route.total.to_string(),
                    currency: CURRENCY.to_string(),
                },
                itineraries: vec![
                    itinerary(route.carrier, &route.outbound, ORIGIN, route.destination, outbound_date),
                    itinerary(route.carrier, &route.inbound, route.destination, ORIGIN, return_date),
                ],
                extra,
            }
        })
        .collect()
}

/// Whether an offer came from the synthetic catalogue
pub fn is_fallback(offer: &FlightOffer) -> bool {
    offer.extra.get("source").and_then(Value::as_str) == Some(FALLBACK_SOURCE)
}

fn itinerary(carrier: &str, leg: &Leg, from: &str, to: &str, date: NaiveDate) -> Itinerary {
    let arrival_date = if leg.overnight {
        date + Duration::days(1)
    } else {
        date
    };

    Itinerary {
        duration: Some(leg.duration.to_string()),
        segments: vec![Segment {
            departure: FlightEndpoint {
                iata_code: from.to_string(),
                at: local_time(date, leg.departs),
            },
            arrival: FlightEndpoint {
                iata_code: to.to_string(),
                at: local_time(arrival_date, leg.arrives),
            },
            carrier_code: carrier.to_string(),
            number: leg.number.to_string(),
        }],
    }
}

fn local_time(date: NaiveDate, hhmm: &str) -> String {
    format!("{}T{}:00", date.format("%Y-%m-%d"), hhmm)
}
