// On-disk JSON cache with a fixed time-to-live.
//
// One file per cache key under a configured directory. Freshness is judged
// from the file's modification time against a clock that can be swapped out
// in tests. Reading is best-effort: a missing, stale or unreadable entry is a
// miss. Writing is best-effort too: a failed write is logged and the freshly
// fetched value is still handed back.
//
// Writes go to a temporary sibling and are renamed into place, so a reader
// never sees a half-written entry.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The real wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Age of an entry modified at `modified`, as seen at `now`.
///
/// A modification time in the future (clock skew) counts as age zero.
pub fn entry_age(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// An entry is fresh while its age is strictly below the TTL.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    entry_age(modified, now) < ttl
}

/// Longest key used as-is for a file name. `store` adds a dot prefix and a
/// `.json.tmp` suffix, and common file systems cap names at 255 bytes.
pub const MAX_KEY_LEN: usize = 200;

/// Hex characters of the SHA-256 digest appended to shortened keys.
const DIGEST_HEX_LEN: usize = 32;

/// Build a deterministic cache key from an endpoint name, a keyword set and
/// query parameters. Keyword order does not matter.
///
/// Components are escaped so the key is a safe file name and distinct
/// inputs never collapse onto the same key, also on case-insensitive file
/// systems. Keys longer than [`MAX_KEY_LEN`] keep a readable prefix and end
/// in a digest of the full key.
pub fn cache_key<S: AsRef<str>>(kind: &str, keywords: &[String], params: &[S]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut parts = vec![escape_component(kind)];
    parts.push(
        sorted
            .iter()
            .map(|k| escape_component(k))
            .collect::<Vec<_>>()
            .join("+"),
    );
    parts.extend(params.iter().map(|p| escape_component(p.as_ref())));
    shorten_key(parts.join("_"))
}

fn shorten_key(key: String) -> String {
    if key.len() <= MAX_KEY_LEN {
        return key;
    }

    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    // Escaped keys are pure ASCII, so any byte index is a char boundary
    let prefix = &key[..MAX_KEY_LEN - DIGEST_HEX_LEN - 1];
    format!("{prefix}~{}", &digest[..DIGEST_HEX_LEN])
}

/// Lower-case letters, digits, `-` and `.` pass through. Every other byte,
/// upper-case letters included, becomes `%XX`.
fn escape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// A listing row for `DiskCache::entries`.
#[derive(Debug, Clone)]
pub struct CacheEntryInfo {
    pub key: String,
    pub path: PathBuf,
    pub age: Duration,
    pub fresh: bool,
    pub size_bytes: u64,
}

/// File-per-key JSON cache with a fixed TTL.
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(dir, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Whether an entry exists for `key` and is younger than the TTL.
    pub fn is_entry_fresh(&self, key: &str) -> bool {
        std::fs::metadata(self.path_for(key))
            .and_then(|m| m.modified())
            .map(|modified| is_fresh(modified, self.clock.now(), self.ttl))
            .unwrap_or(false)
    }

    /// Read a fresh entry. Absent, stale and unreadable entries are all `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);

        let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => {
                debug!(key = key, "Cache miss");
                return None;
            }
        };

        let age = entry_age(modified, self.clock.now());
        if age >= self.ttl {
            debug!(key = key, age_secs = age.as_secs(), "Cache entry stale");
            return None;
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(CacheError::from)
            .and_then(|json| serde_json::from_str::<T>(&json).map_err(CacheError::from));

        match parsed {
            Ok(value) => {
                info!(key = key, "Loaded from cache");
                Some(value)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Failed to load cache entry, refetching");
                None
            }
        }
    }

    /// Write an entry, replacing any previous one.
    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let json = serde_json::to_string_pretty(value)?;

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;

        debug!(key = key, "Cached");
        Ok(())
    }

    /// Return the fresh cached value for `key`, or run `fetch`, persist its
    /// result, and return that.
    ///
    /// The cache is always consulted before `fetch` runs, and a successful
    /// fetch is written before it is returned. Fetch errors pass through
    /// and leave any existing entry untouched.
    pub async fn load_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.load::<T>(key) {
            return Ok(cached);
        }

        let value = fetch().await?;

        if let Err(e) = self.store(key, &value) {
            warn!(key = key, error = %e, "Failed to write cache entry");
        }

        Ok(value)
    }

    /// List all entries with their age and freshness, newest first.
    pub fn entries(&self) -> Result<Vec<CacheEntryInfo>, CacheError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .filter(|k| !k.starts_with('.'))
            else {
                continue;
            };

            let meta = entry.metadata()?;
            let age = entry_age(meta.modified()?, now);
            entries.push(CacheEntryInfo {
                key: key.to_string(),
                path: path.clone(),
                age,
                fresh: age < self.ttl,
                size_bytes: meta.len(),
            });
        }

        entries.sort_by_key(|e| e.age);
        Ok(entries)
    }
}
