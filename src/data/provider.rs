//! The live flight-data provider seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::FlightOffer;

/// Fixed request shape sent to the provider on a cache miss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuery {
    /// IATA origin code (airport or city)
    pub origin: String,
    /// Upper bound on the total price, in the provider's currency
    pub max_price: u32,
}

impl Default for ProviderQuery {
    fn default() -> Self {
        Self {
            origin: "LON".to_string(),
            max_price: 500,
        }
    }
}

/// Errors that can occur when querying the flight-data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API credentials were configured
    #[error("provider credentials are not configured")]
    MissingCredentials,

    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse the provider response
    #[error("failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The local call guard refused the call
    #[error("provider call limit reached")]
    RateLimited,
}

/// Source of live flight offers
#[async_trait]
pub trait OfferProvider: Send + Sync {
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<FlightOffer>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query_is_popular_flights_from_london() {
        let q = ProviderQuery::default();
        assert_eq!(q.origin, "LON");
        assert_eq!(q.max_price, 500);
    }

    #[test]
    fn test_status_error_display() {
        let err = ProviderError::Status {
            status: 401,
            body: "invalid_client".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid_client"));
    }
}
