//! Cache store for persisting flight offers to disk
//!
//! Provides the `CacheStore` seam used by the gateway and a `JsonFileStore`
//! that keeps one JSON file per cache key.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::data::{FlightOffer, ProviderQuery};

/// A persisted generation of offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The offers, in the order they were produced
    pub payload: Vec<FlightOffer>,
    /// When this generation was produced
    pub created_at: DateTime<Utc>,
    /// The provider query this generation answers; `None` for entries
    /// written without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<ProviderQuery>,
}

impl CacheEntry {
    pub fn new(payload: Vec<FlightOffer>, created_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            created_at,
            query: None,
        }
    }

    /// Tags the entry with the query it answers
    pub fn for_query(mut self, query: ProviderQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// Whether the entry was produced for `query`. Untagged entries answer
    /// no query.
    pub fn answers(&self, query: &ProviderQuery) -> bool {
        self.query.as_ref() == Some(query)
    }

    /// Age of the entry at `now`. Negative when `created_at` is ahead of `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Whether `entry` is still fresh at `now` for the given TTL
///
/// An entry stamped in the future (clock skew between writers) has a
/// negative age and counts as fresh.
pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, ttl: Duration) -> bool {
    entry.age(now) < ttl
}

/// Errors from reading or writing persisted state
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem operation failed
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The stored record could not be parsed
    #[error("cache record is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// The record could not be encoded
    #[error("failed to encode cache record: {0}")]
    Encode(#[source] serde_json::Error),

    /// No cache directory could be determined for this platform
    #[error("no cache directory available on this platform")]
    NoCacheDir,
}

/// Durable key/value storage for cache entries
///
/// `write` must replace the previous entry as a whole: a concurrent or
/// subsequent `read` sees either the old entry or the new one, never a mix.
pub trait CacheStore: Send + Sync {
    /// Returns `Ok(None)` when no entry exists for `key`
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, PersistenceError>;

    fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), PersistenceError>;
}

/// Stores each cache entry as `<dir>/<key>.json`
///
/// Writes land in a temporary file inside the cache directory which is then
/// renamed over the target, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store in the platform cache directory
    ///
    /// Uses `~/.cache/popflights/` on Linux, or the equivalent on other
    /// platforms. Returns `None` if no home directory can be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "popflights")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Uses `cache_dir` if given, the platform default otherwise
    pub fn resolve(cache_dir: Option<&Path>) -> Result<Self, PersistenceError> {
        match cache_dir {
            Some(dir) => Ok(Self::with_dir(dir)),
            None => Self::new().ok_or(PersistenceError::NoCacheDir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the cache file for the given key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}

impl CacheStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, PersistenceError> {
        let content = match fs::read_to_string(self.path_for(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry = serde_json::from_str(&content).map_err(PersistenceError::Corrupt)?;
        Ok(Some(entry))
    }

    fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), PersistenceError> {
        self.ensure_dir()?;

        let json = serde_json::to_string_pretty(entry).map_err(PersistenceError::Encode)?;

        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fallback_offers;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonFileStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = JsonFileStore::with_dir(temp_dir.path());
        (store, temp_dir)
    }

    fn jan_first() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn sample_entry() -> CacheEntry {
        CacheEntry::new(fallback_offers(jan_first()), jan_first())
    }

    #[test]
    fn test_write_creates_file_in_cache_directory() {
        let (store, temp_dir) = create_test_store();

        store
            .write("popular_flights", &sample_entry())
            .expect("Write should succeed");

        let expected_path = temp_dir.path().join("popular_flights.json");
        assert!(expected_path.exists(), "Cache file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("\"payload\""));
        assert!(content.contains("\"created_at\""));
        assert!(content.contains("\"itineraries\""));
    }

    #[test]
    fn test_read_returns_none_for_missing_key() {
        let (store, _temp_dir) = create_test_store();

        let result = store.read("nonexistent_key").expect("Missing key is not an error");

        assert!(result.is_none(), "Should return None for missing key");
    }

    #[test]
    fn test_read_returns_written_entry() {
        let (store, _temp_dir) = create_test_store();
        let entry = sample_entry();

        store.write("popular_flights", &entry).expect("Write should succeed");
        let read = store
            .read("popular_flights")
            .expect("Read should succeed")
            .expect("Entry should exist");

        assert_eq!(read, entry);
    }

    #[test]
    fn test_read_corrupt_file_is_an_error() {
        let (store, temp_dir) = create_test_store();
        fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();

        let result = store.read("broken");

        assert!(matches!(result, Err(PersistenceError::Corrupt(_))));
    }

    #[test]
    fn test_write_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache").join("dir");
        let store = JsonFileStore::with_dir(nested_path.clone());

        store
            .write("nested_key", &sample_entry())
            .expect("Write should succeed");

        assert!(nested_path.exists(), "Nested directory should be created");
        assert!(nested_path.join("nested_key.json").exists());
    }

    #[test]
    fn test_overwrite_replaces_whole_entry() {
        let (store, temp_dir) = create_test_store();
        let first = sample_entry();
        let mut second = CacheEntry::new(
            fallback_offers(jan_first() + Duration::days(3)),
            jan_first() + Duration::days(3),
        );
        second.payload.truncate(2);

        store.write("overwrite_key", &first).expect("First write should succeed");
        store.write("overwrite_key", &second).expect("Second write should succeed");

        let read = store.read("overwrite_key").unwrap().unwrap();
        assert_eq!(read, second, "Cache should contain only the latest entry");

        // No temp files are left behind next to the entry
        let files: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_write_into_unwritable_location_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // A regular file where the directory should be
        let store = JsonFileStore::with_dir(blocker.join("cache"));

        let result = store.write("k", &sample_entry());

        assert!(matches!(result, Err(PersistenceError::Io(_))));
    }

    #[test]
    fn test_is_fresh_boundaries() {
        let entry = CacheEntry::new(Vec::new(), jan_first());
        let ttl = Duration::hours(24);

        assert!(is_fresh(&entry, jan_first(), ttl));
        assert!(is_fresh(&entry, jan_first() + Duration::hours(23), ttl));
        assert!(!is_fresh(&entry, jan_first() + Duration::hours(24), ttl));
        assert!(!is_fresh(&entry, jan_first() + Duration::days(2), ttl));
    }

    #[test]
    fn test_entry_answers_only_its_own_query() {
        let london = ProviderQuery::default();
        let manchester = ProviderQuery {
            origin: "MAN".to_string(),
            max_price: 500,
        };
        let entry = CacheEntry::new(Vec::new(), jan_first()).for_query(london.clone());

        assert!(entry.answers(&london));
        assert!(!entry.answers(&manchester));
        assert!(!CacheEntry::new(Vec::new(), jan_first()).answers(&london));
    }

    #[test]
    fn test_query_survives_write_and_read() {
        let (store, _temp_dir) = create_test_store();
        let entry = sample_entry().for_query(ProviderQuery::default());

        store.write("tagged", &entry).unwrap();

        let read = store.read("tagged").unwrap().unwrap();
        assert_eq!(read.query, Some(ProviderQuery::default()));
    }

    #[test]
    fn test_entry_from_the_future_is_fresh() {
        let entry = CacheEntry::new(Vec::new(), jan_first() + Duration::hours(1));
        assert!(is_fresh(&entry, jan_first(), Duration::hours(24)));
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(store) = JsonFileStore::new() {
            let path_str = store.dir().to_string_lossy();
            assert!(path_str.contains("popflights"));
        }
        // Passes if new() returns None (e.g., no home directory in CI)
    }
}
