//! Daily cap on live provider calls
//!
//! The call count is kept in a small JSON file next to the offer cache so it
//! survives restarts. The guard ships disabled; a disabled guard allows every
//! call and never touches the filesystem.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::cache::PersistenceError;

/// File name of the persisted counter inside the cache directory
pub const COUNTER_FILE: &str = "provider_calls.json";

/// Persisted call counter for one UTC day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CallCounter {
    day: NaiveDate,
    calls: u32,
}

/// Outcome of asking the guard for a provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    Denied { calls: u32, limit: u32 },
}

/// Guards provider calls with a per-day limit
#[derive(Debug, Clone)]
pub struct CallGuard {
    enabled: bool,
    daily_limit: u32,
    path: PathBuf,
}

impl CallGuard {
    /// A guard that allows everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            daily_limit: 0,
            path: PathBuf::new(),
        }
    }

    /// An active guard storing its counter at `path`
    pub fn new(path: impl Into<PathBuf>, daily_limit: u32) -> Self {
        Self {
            enabled: true,
            daily_limit,
            path: path.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Records a call at `now` if today's budget allows it
    ///
    /// Denied calls are not counted. The load and store are not atomic across
    /// processes: concurrent callers can each record the same count, so the
    /// cap may be exceeded by the number of simultaneous misses.
    pub fn check_and_record(&self, now: DateTime<Utc>) -> Result<GuardDecision, PersistenceError> {
        if !self.enabled {
            return Ok(GuardDecision::Allowed);
        }

        let today = now.date_naive();
        let mut counter = self.load(today);

        if counter.calls >= self.daily_limit {
            return Ok(GuardDecision::Denied {
                calls: counter.calls,
                limit: self.daily_limit,
            });
        }

        counter.calls += 1;
        self.store(&counter)?;
        Ok(GuardDecision::Allowed)
    }

    /// Calls recorded so far on the UTC day of `now`
    pub fn calls_today(&self, now: DateTime<Utc>) -> u32 {
        if !self.enabled {
            return 0;
        }
        self.load(now.date_naive()).calls
    }

    /// Loads the counter for `today`; a missing, unreadable or outdated file
    /// starts a fresh count
    fn load(&self, today: NaiveDate) -> CallCounter {
        let fresh = CallCounter {
            day: today,
            calls: 0,
        };

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(error = %e, path = %self.path.display(), "unreadable call counter, starting over");
                }
                return fresh;
            }
        };

        match serde_json::from_str::<CallCounter>(&content) {
            Ok(counter) if counter.day == today => counter,
            Ok(_) => fresh,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "corrupt call counter, starting over");
                fresh
            }
        }
    }

    fn store(&self, counter: &CallCounter) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string(counter).map_err(PersistenceError::Encode)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
