//! Flight cache gateway
//!
//! Serves the "popular flights" list. A fresh cache entry is returned as-is;
//! a missing or stale one is regenerated from the live provider, or from the
//! fallback catalogue when the provider has nothing usable, and written back
//! before it is returned.
//!
//! Whether provider and cache-write failures are masked or surfaced is a
//! `FallbackPolicy` chosen by the caller. Cache-read failures are always
//! treated as a miss.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{is_fresh, CacheEntry, CacheStore, PersistenceError};
use crate::clock::Clock;
use crate::data::{fallback_offers, FlightOffer, OfferProvider, ProviderError, ProviderQuery};
use crate::rate_limit::{CallGuard, GuardDecision};

/// Cache key of the popular-flights list
pub const DEFAULT_CACHE_KEY: &str = "popular_flights";

/// How long a generation stays fresh
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// What to do when the provider or the cache write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Serve the fallback catalogue and log; the caller never sees an error.
    /// Only suitable for display-only data.
    #[default]
    Mask,
    /// Return the error to the caller
    Propagate,
}

/// Errors surfaced under `FallbackPolicy::Propagate`
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("flight provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("failed to persist offers: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("flight provider returned no usable offers")]
    EmptyResult,
}

/// Where a batch of offers came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSource {
    Cache,
    Provider,
    Fallback,
}

impl fmt::Display for OfferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferSource::Cache => "cache",
            OfferSource::Provider => "provider",
            OfferSource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Offers together with their origin
#[derive(Debug, Clone)]
pub struct Offers {
    pub offers: Vec<FlightOffer>,
    pub source: OfferSource,
}

/// State of the cache slot, without regenerating anything
#[derive(Debug, Clone, PartialEq)]
pub enum CacheStatus {
    Absent,
    Fresh {
        created_at: DateTime<Utc>,
        age: Duration,
        offers: usize,
    },
    Stale {
        created_at: DateTime<Utc>,
        age: Duration,
        offers: usize,
    },
    /// The slot exists but cannot be read; the next request regenerates it
    Unreadable { reason: String },
}

/// Memoizes provider results behind a TTL
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
    provider: Arc<dyn OfferProvider>,
    clock: Arc<dyn Clock>,
    guard: CallGuard,
    key: String,
    ttl: Duration,
    query: ProviderQuery,
    policy: FallbackPolicy,
}

impl CacheGateway {
    /// Creates a gateway for the popular-flights key with a 24 hour TTL,
    /// the default provider query, masking policy and no call guard
    pub fn new(
        store: Arc<dyn CacheStore>,
        provider: Arc<dyn OfferProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            guard: CallGuard::disabled(),
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl: Duration::hours(DEFAULT_TTL_HOURS),
            query: ProviderQuery::default(),
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_query(mut self, query: ProviderQuery) -> Self {
        self.query = query;
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Returns the popular-flights offers
    ///
    /// Under `FallbackPolicy::Mask` this never fails and never returns an
    /// empty list.
    pub async fn get_offers(&self) -> Result<Vec<FlightOffer>, GatewayError> {
        self.fetch().await.map(|o| o.offers)
    }

    /// Like `get_offers`, also reporting where the offers came from
    pub async fn fetch(&self) -> Result<Offers, GatewayError> {
        let now = self.clock.now();

        if let Some(entry) = self.read_entry() {
            if self.is_servable(&entry, now) {
                tracing::debug!(
                    key = %self.key,
                    age_secs = entry.age(now).num_seconds(),
                    offers = entry.payload.len(),
                    "serving cached offers"
                );
                return Ok(Offers {
                    offers: entry.payload,
                    source: OfferSource::Cache,
                });
            }
            tracing::info!(
                key = %self.key,
                age_secs = entry.age(now).num_seconds(),
                same_query = entry.answers(&self.query),
                "cached offers are stale"
            );
        }

        self.regenerate(now).await
    }

    /// Regenerates and persists the offers regardless of freshness
    pub async fn refresh(&self) -> Result<Offers, GatewayError> {
        let now = self.clock.now();
        self.regenerate(now).await
    }

    /// Reports the cache slot state without touching the provider
    ///
    /// An entry written for a different provider query reports as stale.
    pub fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        match self.store.read(&self.key) {
            Err(e) => CacheStatus::Unreadable {
                reason: e.to_string(),
            },
            Ok(None) => CacheStatus::Absent,
            Ok(Some(entry)) => {
                let age = entry.age(now);
                let offers = entry.payload.len();
                if self.is_servable(&entry, now) {
                    CacheStatus::Fresh {
                        created_at: entry.created_at,
                        age,
                        offers,
                    }
                } else {
                    CacheStatus::Stale {
                        created_at: entry.created_at,
                        age,
                        offers,
                    }
                }
            }
        }
    }

    /// Fresh, and produced for this gateway's query
    fn is_servable(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        is_fresh(entry, now, self.ttl) && entry.answers(&self.query)
    }

    /// Reads the cache slot; unreadable entries count as absent
    fn read_entry(&self) -> Option<CacheEntry> {
        match self.store.read(&self.key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    async fn regenerate(&self, now: DateTime<Utc>) -> Result<Offers, GatewayError> {
        let (offers, source) = match self.call_provider(now).await {
            Ok(offers) => {
                let received = offers.len();
                let usable: Vec<FlightOffer> =
                    offers.into_iter().filter(FlightOffer::is_well_formed).collect();
                if usable.len() < received {
                    tracing::warn!(
                        dropped = received - usable.len(),
                        "dropping malformed provider offers"
                    );
                }

                if usable.is_empty() {
                    if self.policy == FallbackPolicy::Propagate {
                        return Err(GatewayError::EmptyResult);
                    }
                    tracing::warn!(key = %self.key, "provider returned no usable offers, serving fallback");
                    (fallback_offers(now), OfferSource::Fallback)
                } else {
                    (usable, OfferSource::Provider)
                }
            }
            Err(e) => {
                if self.policy == FallbackPolicy::Propagate {
                    return Err(e.into());
                }
                tracing::warn!(key = %self.key, error = %e, "provider failed, serving fallback");
                (fallback_offers(now), OfferSource::Fallback)
            }
        };

        let entry = CacheEntry::new(offers, now).for_query(self.query.clone());
        match self.store.write(&self.key, &entry) {
            Ok(()) => {
                tracing::info!(key = %self.key, offers = entry.payload.len(), %source, "cached new offers");
            }
            Err(e) if self.policy == FallbackPolicy::Propagate => return Err(e.into()),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to write offer cache");
            }
        }

        Ok(Offers {
            offers: entry.payload,
            source,
        })
    }

    async fn call_provider(&self, now: DateTime<Utc>) -> Result<Vec<FlightOffer>, ProviderError> {
        match self.guard.check_and_record(now) {
            Ok(GuardDecision::Allowed) => {}
            Ok(GuardDecision::Denied { calls, limit }) => {
                tracing::warn!(calls, limit, "provider call limit reached");
                return Err(ProviderError::RateLimited);
            }
            Err(e) => {
                tracing::warn!(error = %e, "call guard unavailable, allowing provider call");
            }
        }

        self.provider.search(&self.query).await
    }
}
