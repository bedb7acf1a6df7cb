//! Core data models for popular flights
//!
//! This module contains the flight offer types shared by the provider client,
//! the fallback catalogue and the cache. Offers follow the flight-data
//! provider's schema; fields this crate does not interpret are carried along
//! untouched in `extra`.

pub mod amadeus;
pub mod fallback;
pub mod provider;

pub use amadeus::{AmadeusClient, AmadeusConfig};
pub use fallback::fallback_offers;
pub use provider::{OfferProvider, ProviderError, ProviderQuery};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Price of an offer as sent by the provider
///
/// `total` stays a decimal string so no precision is lost between the
/// provider and whatever displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub total: String,
    pub currency: String,
}

/// Departure or arrival point of a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightEndpoint {
    /// IATA airport or city code (e.g. "LHR")
    #[serde(rename = "iataCode")]
    pub iata_code: String,
    /// Local date or date-time string, in whatever precision the source has
    pub at: String,
}

/// A single flight leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub departure: FlightEndpoint,
    pub arrival: FlightEndpoint,
    #[serde(rename = "carrierCode")]
    pub carrier_code: String,
    pub number: String,
}

/// One direction of travel, made of one or more segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub segments: Vec<Segment>,
}

/// A flight offer
///
/// The cache never looks inside an offer; it stores and returns the record
/// verbatim. Unknown provider fields are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOffer {
    pub id: String,
    pub price: Price,
    pub itineraries: Vec<Itinerary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlightOffer {
    /// Whether the offer has the minimum shape callers rely on for display:
    /// an id, a priced total with currency, and at least one itinerary where
    /// every itinerary has at least one segment.
    pub fn is_well_formed(&self) -> bool {
        !self.id.is_empty()
            && !self.price.total.is_empty()
            && !self.price.currency.is_empty()
            && !self.itineraries.is_empty()
            && self.itineraries.iter().all(|it| !it.segments.is_empty())
    }

    /// The first departure of the offer, if any
    pub fn departure(&self) -> Option<&FlightEndpoint> {
        self.itineraries
            .first()
            .and_then(|it| it.segments.first())
            .map(|seg| &seg.departure)
    }

    /// The arrival of the outbound itinerary's last segment, if any
    pub fn destination(&self) -> Option<&FlightEndpoint> {
        self.itineraries
            .first()
            .and_then(|it| it.segments.last())
            .map(|seg| &seg.arrival)
    }
}
