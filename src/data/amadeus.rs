//! Amadeus Self-Service API client
//!
//! Fetches cheapest-destination rows from the Flight Inspiration Search
//! endpoint and maps them into round-trip `FlightOffer`s. Authenticates with
//! the OAuth2 client-credentials grant and keeps the access token in memory
//! until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::provider::{OfferProvider, ProviderError, ProviderQuery};
use super::{FlightEndpoint, FlightOffer, Itinerary, Price, Segment};

/// Base URL of the Amadeus test environment
pub const DEFAULT_BASE_URL: &str = "https://test.api.amadeus.com";

/// Default per-request timeout
const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Tokens are refreshed this long before the provider says they expire
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Currency assumed when the response carries no `meta.currency`
const DEFAULT_CURRENCY: &str = "EUR";

/// Amadeus client configuration
#[derive(Debug, Clone)]
pub struct AmadeusConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: String,
    pub timeout: std::time::Duration,
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Response from the flight-destinations endpoint
#[derive(Debug, Deserialize)]
struct DestinationsResponse {
    #[serde(default)]
    data: Vec<DestinationRecord>,
    #[serde(default)]
    meta: Option<DestinationsMeta>,
}

#[derive(Debug, Deserialize)]
struct DestinationsMeta {
    currency: Option<String>,
}

/// A single cheapest-destination row
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinationRecord {
    origin: String,
    destination: String,
    departure_date: String,
    #[serde(default)]
    return_date: Option<String>,
    price: DestinationPrice,
}

#[derive(Debug, Deserialize)]
struct DestinationPrice {
    total: String,
}

/// Client for the Amadeus flight-data API
#[derive(Debug)]
pub struct AmadeusClient {
    http_client: Client,
    config: AmadeusConfig,
    token: Mutex<Option<AccessToken>>,
}

impl AmadeusClient {
    /// Creates a client; the HTTP client gets the configured timeout
    pub fn new(config: AmadeusConfig) -> Result<Self, ProviderError> {
        let http_client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http_client,
            config,
            token: Mutex::new(None),
        })
    }

    /// Whether both halves of the API credentials are present
    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.config.client_id.as_deref().filter(|s| !s.is_empty())?;
        let secret = self.config.client_secret.as_deref().filter(|s| !s.is_empty())?;
        Some((id, secret))
    }

    /// Returns a valid access token, requesting a new one if needed
    async fn access_token(&self) -> Result<String, ProviderError> {
        let (client_id, client_secret) =
            self.credentials().ok_or(ProviderError::MissingCredentials)?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("requesting Amadeus access token");

        let url = format!("{}/v1/security/oauth2/token", self.config.base_url);
        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await?;
        let text = checked_body(response).await?;
        let token_response: TokenResponse = serde_json::from_str(&text)?;

        let token = parse_token(token_response, Utc::now());
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Fetches cheapest destinations from `query.origin` under `query.max_price`
    async fn fetch_destinations(&self, query: &ProviderQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let token = self.access_token().await?;

        let url = format!("{}/v1/shopping/flight-destinations", self.config.base_url);
        let max_price = query.max_price.to_string();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[("origin", query.origin.as_str()), ("maxPrice", max_price.as_str())])
            .send()
            .await?;
        let text = checked_body(response).await?;

        parse_destinations(&text)
    }
}

#[async_trait]
impl OfferProvider for AmadeusClient {
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        tracing::debug!(origin = %query.origin, max_price = query.max_price, "querying Amadeus");
        self.fetch_destinations(query).await
    }
}

/// Reads the body, turning non-success statuses into `ProviderError::Status`
async fn checked_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn parse_token(response: TokenResponse, now: DateTime<Utc>) -> AccessToken {
    let lifetime = (response.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0);
    AccessToken {
        value: response.access_token,
        expires_at: now + Duration::seconds(lifetime),
    }
}

/// Parses a flight-destinations response body into offers
fn parse_destinations(body: &str) -> Result<Vec<FlightOffer>, ProviderError> {
    let response: DestinationsResponse = serde_json::from_str(body)?;
    let currency = response
        .meta
        .and_then(|m| m.currency)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    Ok(response
        .data
        .into_iter()
        .map(|record| record_to_offer(record, &currency))
        .collect())
}

/// Maps a destination row to a round-trip offer
///
/// The inspiration endpoint only reports dates, so segment times carry the
/// date alone and carrier details are left empty.
fn record_to_offer(record: DestinationRecord, currency: &str) -> FlightOffer {
    let id = format!("{}-{}-{}", record.origin, record.destination, record.departure_date);

    let mut itineraries = vec![Itinerary {
        duration: None,
        segments: vec![Segment {
            departure: FlightEndpoint {
                iata_code: record.origin.clone(),
                at: record.departure_date.clone(),
            },
            arrival: FlightEndpoint {
                iata_code: record.destination.clone(),
                at: record.departure_date.clone(),
            },
            carrier_code: String::new(),
            number: String::new(),
        }],
    }];

    if let Some(return_date) = &record.return_date {
        itineraries.push(Itinerary {
            duration: None,
            segments: vec![Segment {
                departure: FlightEndpoint {
                    iata_code: record.destination.clone(),
                    at: return_date.clone(),
                },
                arrival: FlightEndpoint {
                    iata_code: record.origin.clone(),
                    at: return_date.clone(),
                },
                carrier_code: String::new(),
                number: String::new(),
            }],
        });
    }

    let mut extra = Map::new();
    extra.insert("type".to_string(), Value::from("flight-destination"));
    extra.insert("source".to_string(), Value::from("AMADEUS"));

    FlightOffer {
        id,
        price: Price {
            total: record.price.total,
            currency: currency.to_string(),
        },
        itineraries,
        extra,
    }
}
