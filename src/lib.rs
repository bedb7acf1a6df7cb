//! popflights library
//!
//! A cache gateway for "popular flights" offers: fresh results come from a
//! JSON file cache, misses go to the Amadeus API, and a synthetic catalogue
//! stands in whenever the provider has nothing usable.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod gateway;
pub mod rate_limit;

pub use cache::{CacheEntry, CacheStore, JsonFileStore, PersistenceError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use data::{FlightOffer, OfferProvider, ProviderError, ProviderQuery};
pub use gateway::{CacheGateway, CacheStatus, FallbackPolicy, GatewayError, OfferSource, Offers};
