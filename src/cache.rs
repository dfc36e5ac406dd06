use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::summarize::{SummaryData, SummaryOptions};

/// Most entries the store will hold; inserting beyond this evicts the entry
/// with the earliest creation timestamp.
pub const CACHE_CAPACITY: usize = 10;

/// Entries older than this are treated as a miss even if still on disk.
pub const CACHE_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub summary: SummaryData,
    pub created_at: DateTime<Utc>,
    pub ttl_hours: i64,
}

/// Content-fingerprint keyed summary cache, persisted as JSON so cached
/// summaries survive across sessions. Writes are last-writer-wins: key
/// identity implies input identity, so no merge is needed.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: HashMap<String, CacheEntry>,
}

impl CacheStore {
    /// Loads the cache from `path`; a missing file is an empty cache.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(contents) => {
                let file: CacheFile = serde_json::from_str(&contents)
                    .with_context(|| format!("parse cache file: {}", path.display()))?;
                file.entries
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read cache file: {}", path.display()));
            }
        };

        Ok(Self {
            path: path.to_owned(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached summary, treating expired entries as absent.
    pub fn get(&self, key: &str) -> Option<&SummaryData> {
        let entry = self.entries.get(key)?;
        if is_expired(entry, Utc::now()) {
            return None;
        }
        Some(&entry.summary)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a summary, evicting expired entries first and then the oldest
    /// entry if the store is still at capacity.
    pub fn put(&mut self, key: String, summary: SummaryData) {
        self.evict_expired();

        if !self.entries.contains_key(&key) && self.entries.len() >= CACHE_CAPACITY {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(key = %oldest, "cache at capacity; evicting oldest entry");
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                summary,
                created_at: Utc::now(),
                ttl_hours: CACHE_TTL_HOURS,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn evict_expired(&mut self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| !is_expired(entry, now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Writes the store back to disk, creating parent directories as needed.
    pub fn persist(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create cache dir: {}", parent.display()))?;
        }

        let file = CacheFile {
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("serialize cache")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write cache file: {}", self.path.display()))?;
        Ok(())
    }
}

fn is_expired(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    now - entry.created_at > Duration::hours(entry.ttl_hours)
}

/// Deterministic cache key: hash of the normalized processed content plus
/// the canonical serialization of the options. `force_regenerate` is
/// excluded so a forced run overwrites the same entry.
pub fn fingerprint(processed_content: &str, options: &SummaryOptions) -> String {
    let normalized = processed_content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    use sha2::Digest as _;
    let mut hasher = sha2::Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(options.canonical_key().as_bytes());
    hex::encode(hasher.finalize())
}

fn open_from_args(args: crate::cli::CacheArgs) -> anyhow::Result<CacheStore> {
    let mut settings =
        crate::config::Settings::load(args.settings.as_deref()).context("load settings")?;
    if let Some(path) = args.cache {
        settings.cache_path = path;
    }
    CacheStore::load(&settings.cache_path).context("load summary cache")
}

#[derive(Debug, Serialize)]
struct CacheStats {
    path: PathBuf,
    entries: usize,
    capacity: usize,
    ttl_hours: i64,
}

pub fn run(command: crate::cli::CacheCommand) -> anyhow::Result<()> {
    match command {
        crate::cli::CacheCommand::Clear(args) => {
            let mut store = open_from_args(args)?;
            let removed = store.len();
            store.clear();
            store.persist().context("persist cache")?;
            tracing::info!(removed, "summary cache cleared");
        }
        crate::cli::CacheCommand::Stats(args) => {
            let mut store = open_from_args(args)?;
            store.evict_expired();

            let stats = CacheStats {
                path: store.path.clone(),
                entries: store.len(),
                capacity: CACHE_CAPACITY,
                ttl_hours: CACHE_TTL_HOURS,
            };
            let json = serde_json::to_string_pretty(&stats).context("serialize cache stats")?;
            println!("{json}");
        }
    }
    Ok(())
}
