//! Command-line interface for popflights
//!
//! Parses arguments with clap, folds flag overrides into the loaded
//! configuration and formats gateway results for the terminal.

use std::path::PathBuf;

use chrono::Duration;
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::AppConfig;
use crate::data::fallback::is_fallback;
use crate::data::FlightOffer;
use crate::gateway::CacheStatus;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The origin is not a three-letter IATA code
    #[error("Invalid origin: '{0}'. Expected a three-letter IATA code such as LON or MAN")]
    InvalidOrigin(String),
}

/// popflights - cached popular flights with a fallback catalogue
#[derive(Parser, Debug)]
#[command(name = "popflights")]
#[command(about = "Cached popular-flights offers from the Amadeus API")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file (overrides POPFLIGHTS_CONFIG_FILE)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the offer cache
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Origin to search from, e.g. LON
    #[arg(long, value_name = "IATA", value_parser = parse_origin, global = true)]
    pub origin: Option<String>,

    /// Fail on provider or cache errors instead of serving fallback offers
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print popular flights, from the cache when it is fresh (default)
    Offers {
        /// Print offers as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether the cache is absent, fresh or stale
    Status,
    /// Regenerate the cache now, regardless of freshness
    Refresh {
        /// Print offers as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the fallback catalogue as it would be generated now
    Fallback {
        /// Print offers as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// The subcommand to run; `offers` when none was given
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Offers { json: false })
    }

    /// Applies flag overrides on top of the loaded configuration
    pub fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(origin) = &self.origin {
            config.origin = origin.clone();
        }
        if self.strict {
            config.strict = true;
        }
        config
    }
}

/// Parses an origin argument into an upper-case IATA code.
///
/// # Returns
/// * `Ok(String)` for three ASCII letters, in any case
/// * `Err(CliError::InvalidOrigin)` otherwise
pub fn parse_origin(s: &str) -> Result<String, CliError> {
    let code = s.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(CliError::InvalidOrigin(s.to_string()))
    }
}

/// Formats offers as one line each: id, route, dates, price
pub fn format_offers(offers: &[FlightOffer]) -> String {
    let mut out = String::new();
    for offer in offers {
        let from = offer.departure().map(|e| e.iata_code.as_str()).unwrap_or("?");
        let to = offer.destination().map(|e| e.iata_code.as_str()).unwrap_or("?");
        let out_date = offer.departure().map(|e| date_part(&e.at)).unwrap_or("?");
        let dates = match offer.itineraries.get(1).and_then(|it| it.segments.first()) {
            Some(back) => format!("{} / {}", out_date, date_part(&back.departure.at)),
            None => out_date.to_string(),
        };
        let marker = if is_fallback(offer) { "  (example)" } else { "" };

        out.push_str(&format!(
            "{:<22} {} -> {}  {:<23}  {} {}{}\n",
            offer.id, from, to, dates, offer.price.currency, offer.price.total, marker
        ));
    }
    out
}

/// Formats the cache state for `status`
pub fn format_status(key: &str, status: &CacheStatus) -> String {
    match status {
        CacheStatus::Absent => format!("{}: absent", key),
        CacheStatus::Fresh {
            created_at,
            age,
            offers,
        } => format!(
            "{}: fresh ({} old, {} offers, created {})",
            key,
            format_age(*age),
            offers,
            created_at.to_rfc3339()
        ),
        CacheStatus::Stale {
            created_at,
            age,
            offers,
        } => format!(
            "{}: stale ({} old, {} offers, created {})",
            key,
            format_age(*age),
            offers,
            created_at.to_rfc3339()
        ),
        CacheStatus::Unreadable { reason } => {
            format!("{}: unreadable ({}); the next request regenerates it", key, reason)
        }
    }
}

/// Formats an age as `1d 02h 05m`, `3h 07m` or `12m`
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, (minutes % 1440) / 60, minutes % 60);
    if days > 0 {
        format!("{}d {:02}h {:02}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

fn date_part(at: &str) -> &str {
    at.split('T').next().unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fallback_offers;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_origin_uppercases() {
        assert_eq!(parse_origin("lon").unwrap(), "LON");
        assert_eq!(parse_origin("MAN").unwrap(), "MAN");
        assert_eq!(parse_origin(" edi ").unwrap(), "EDI");
    }

    #[test]
    fn test_parse_origin_invalid() {
        for bad in ["", "LO", "LOND", "L0N", "🛫🛫🛫"] {
            let err = parse_origin(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid origin"), "{}", bad);
        }
    }

    #[test]
    fn test_cli_parse_no_args_defaults_to_offers() {
        let cli = Cli::parse_from(["popflights"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.command(), Command::Offers { json: false });
        assert!(!cli.strict);
    }

    #[test]
    fn test_cli_parse_subcommands() {
        let cli = Cli::parse_from(["popflights", "offers", "--json"]);
        assert_eq!(cli.command(), Command::Offers { json: true });

        let cli = Cli::parse_from(["popflights", "status"]);
        assert_eq!(cli.command(), Command::Status);

        let cli = Cli::parse_from(["popflights", "refresh"]);
        assert_eq!(cli.command(), Command::Refresh { json: false });

        let cli = Cli::parse_from(["popflights", "fallback", "--json"]);
        assert_eq!(cli.command(), Command::Fallback { json: true });
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["popflights", "offers", "--strict", "--origin", "man"]);
        assert!(cli.strict);
        assert_eq!(cli.origin.as_deref(), Some("MAN"));
    }

    #[test]
    fn test_cli_rejects_bad_origin() {
        let result = Cli::try_parse_from(["popflights", "--origin", "london"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "popflights",
            "--cache-dir",
            "/tmp/pf",
            "--origin",
            "edi",
            "--strict",
        ]);
        let config = cli.apply_overrides(AppConfig::default());

        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/pf")));
        assert_eq!(config.origin, "EDI");
        assert!(config.strict);
    }

    #[test]
    fn test_apply_overrides_keeps_config_without_flags() {
        let base = AppConfig {
            strict: true,
            origin: "MAN".into(),
            ..Default::default()
        };
        let config = Cli::parse_from(["popflights"]).apply_overrides(base);
        assert!(config.strict);
        assert_eq!(config.origin, "MAN");
    }

    #[test]
    fn test_format_offers_lists_route_dates_and_price() {
        let offers = fallback_offers(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let text = format_offers(&offers);

        assert_eq!(text.lines().count(), offers.len());
        let first = text.lines().next().unwrap();
        assert!(first.contains("LHR -> CDG"));
        assert!(first.contains("2024-01-31 / 2024-02-07"));
        assert!(first.contains("GBP 89.00"));
        assert!(first.contains("(example)"));
    }

    #[test]
    fn test_format_status() {
        assert_eq!(format_status("k", &CacheStatus::Absent), "k: absent");

        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let text = format_status(
            "popular_flights",
            &CacheStatus::Stale {
                created_at,
                age: Duration::hours(26) + Duration::minutes(5),
                offers: 6,
            },
        );
        assert!(text.starts_with("popular_flights: stale"));
        assert!(text.contains("1d 02h 05m"));
        assert!(text.contains("6 offers"));

        let text = format_status(
            "popular_flights",
            &CacheStatus::Unreadable {
                reason: "cache record is corrupt".to_string(),
            },
        );
        assert!(text.starts_with("popular_flights: unreadable"));
        assert!(text.contains("corrupt"));
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::minutes(12)), "12m");
        assert_eq!(format_age(Duration::minutes(187)), "3h 07m");
        assert_eq!(format_age(Duration::seconds(-30)), "0m");
    }
}
