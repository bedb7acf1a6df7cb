//! Application configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. Command-line flags (applied by the binary after loading)
//! 2. Environment variables (POPFLIGHTS_*)
//! 3. TOML config file (`--config` or POPFLIGHTS_CONFIG_FILE)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::amadeus::DEFAULT_BASE_URL;
use crate::data::{AmadeusConfig, ProviderQuery};
use crate::gateway::{FallbackPolicy, DEFAULT_CACHE_KEY, DEFAULT_TTL_HOURS};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "POPFLIGHTS_";

/// Environment variable naming a TOML config file
pub const CONFIG_FILE_ENV: &str = "POPFLIGHTS_CONFIG_FILE";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Amadeus API key. Set via POPFLIGHTS_AMADEUS_CLIENT_ID.
    #[serde(default)]
    pub amadeus_client_id: Option<String>,

    /// Amadeus API secret. Set via POPFLIGHTS_AMADEUS_CLIENT_SECRET.
    #[serde(default)]
    pub amadeus_client_secret: Option<String>,

    #[serde(default = "default_base_url")]
    pub amadeus_base_url: String,

    /// Provider request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache directory; the platform cache dir when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Name of the cache slot (file stem).
    #[serde(default = "default_cache_key")]
    pub cache_key: String,

    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,

    /// IATA origin sent to the provider.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Price ceiling sent to the provider.
    #[serde(default = "default_max_price")]
    pub max_price: u32,

    /// Surface provider and cache-write errors instead of serving fallback data.
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub rate_limit_enabled: bool,

    /// Provider calls allowed per UTC day when the limiter is enabled.
    #[serde(default = "default_rate_limit_daily")]
    pub rate_limit_daily: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}

fn default_ttl_hours() -> u32 {
    DEFAULT_TTL_HOURS as u32
}

fn default_origin() -> String {
    ProviderQuery::default().origin
}

fn default_max_price() -> u32 {
    ProviderQuery::default().max_price
}

fn default_rate_limit_daily() -> u32 {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            amadeus_client_id: None,
            amadeus_client_secret: None,
            amadeus_base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            cache_dir: None,
            cache_key: default_cache_key(),
            ttl_hours: default_ttl_hours(),
            origin: default_origin(),
            max_price: default_max_price(),
            strict: false,
            rate_limit_enabled: false,
            rate_limit_daily: default_rate_limit_daily(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment.
    ///
    /// `config_file` wins over POPFLIGHTS_CONFIG_FILE when both are given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be parsed or validation fails.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_file))
    }

    /// The layered sources `load` extracts from.
    ///
    /// POPFLIGHTS_CONFIG_FILE only selects the file; it is not a field.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config_file"]))
    }

    /// Extract and validate from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_hours == 0 {
            return Err(invalid("ttl_hours", "must be greater than 0"));
        }
        if self.cache_key.is_empty() {
            return Err(invalid("cache_key", "must not be empty"));
        }
        if self
            .cache_key
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '.')
        {
            return Err(invalid("cache_key", "must not contain path separators or dots"));
        }
        if self.origin.trim().is_empty() {
            return Err(invalid("origin", "must not be empty"));
        }
        if self.max_price == 0 {
            return Err(invalid("max_price", "must be greater than 0"));
        }
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.amadeus_client_id.is_some() != self.amadeus_client_secret.is_some() {
            tracing::warn!("only one of amadeus_client_id / amadeus_client_secret is set; live search disabled");
        }
        Ok(())
    }

    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.ttl_hours))
    }

    pub fn policy(&self) -> FallbackPolicy {
        if self.strict {
            FallbackPolicy::Propagate
        } else {
            FallbackPolicy::Mask
        }
    }

    pub fn query(&self) -> ProviderQuery {
        ProviderQuery {
            origin: self.origin.trim().to_uppercase(),
            max_price: self.max_price,
        }
    }

    pub fn amadeus(&self) -> AmadeusConfig {
        AmadeusConfig {
            client_id: self.amadeus_client_id.clone(),
            client_secret: self.amadeus_client_secret.clone(),
            base_url: self.amadeus_base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout(),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_key, "popular_flights");
        assert_eq!(config.ttl_hours, 24);
        assert_eq!(config.origin, "LON");
        assert_eq!(config.max_price, 500);
        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.amadeus_base_url, "https://test.api.amadeus.com");
        assert!(config.cache_dir.is_none());
        assert!(!config.strict);
        assert!(!config.rate_limit_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = from_toml(
            r#"
            origin = "man"
            max_price = 250
            ttl_hours = 6
            strict = true
            cache_dir = "/var/cache/popflights"
            "#,
        )
        .unwrap();

        assert_eq!(config.query().origin, "MAN");
        assert_eq!(config.query().max_price, 250);
        assert_eq!(config.ttl(), chrono::Duration::hours(6));
        assert_eq!(config.policy(), FallbackPolicy::Propagate);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/popflights")));
        // Untouched fields keep their defaults
        assert_eq!(config.cache_key, "popular_flights");
    }

    #[test]
    fn test_zero_ttl_is_rejected() {
        let result = from_toml("ttl_hours = 0");
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ttl_hours"));
    }

    #[test]
    fn test_cache_key_with_path_is_rejected() {
        let result = from_toml(r#"cache_key = "../etc/passwd""#);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_key"));
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(from_toml("timeout_ms = 50").is_err());
        assert!(from_toml("timeout_ms = 400000").is_err());
        assert!(from_toml("timeout_ms = 2500").is_ok());
    }

    #[test]
    fn test_wrong_type_fails_to_load() {
        let result = from_toml(r#"max_price = "cheap""#);
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }

    #[test]
    fn test_amadeus_config_strips_trailing_slash() {
        let config = AppConfig {
            amadeus_base_url: "https://api.amadeus.com/".into(),
            amadeus_client_id: Some("id".into()),
            amadeus_client_secret: Some("secret".into()),
            timeout_ms: 1500,
            ..Default::default()
        };
        let amadeus = config.amadeus();
        assert_eq!(amadeus.base_url, "https://api.amadeus.com");
        assert_eq!(amadeus.timeout, Duration::from_millis(1500));
        assert_eq!(amadeus.client_id.as_deref(), Some("id"));
    }

    #[test]
    fn test_env_overrides_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("popflights.toml", "max_price = 250\nstrict = false\norigin = \"EDI\"\n")?;
            jail.set_env(CONFIG_FILE_ENV, "popflights.toml");
            jail.set_env("POPFLIGHTS_MAX_PRICE", "120");
            jail.set_env("POPFLIGHTS_STRICT", "true");

            let config = AppConfig::load(None).map_err(|e| e.to_string())?;

            assert_eq!(config.max_price, 120);
            assert!(config.strict);
            // The file was read; env left origin alone
            assert_eq!(config.origin, "EDI");
            assert!(AppConfig::figment(None).find_value("config_file").is_err());
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_wins_over_config_file_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("env.toml", "cache_key = \"from_env\"\n")?;
            jail.create_file("flag.toml", "cache_key = \"from_flag\"\n")?;
            jail.set_env(CONFIG_FILE_ENV, "env.toml");

            let config = AppConfig::load(Some(Path::new("flag.toml"))).map_err(|e| e.to_string())?;

            assert_eq!(config.cache_key, "from_flag");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("POPFLIGHTS_TTL_HOURS", "0");

            let result = AppConfig::load(None);

            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "ttl_hours"));
            Ok(())
        });
    }

    #[test]
    fn test_policy_defaults_to_mask() {
        assert_eq!(AppConfig::default().policy(), FallbackPolicy::Mask);
    }
}
