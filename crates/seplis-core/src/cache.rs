use moka::future::Cache;
use seplis_config::CacheConfig;
use seplis_models::{EntityKind, RemoteRecord};
use std::time::Duration;

/// What a cached lookup was keyed by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    Id { kind: EntityKind, id: String },
    Search { kind: EntityKind, title: String },
    Episode { series_id: String, query: String },
}

impl LookupKey {
    pub fn id(kind: EntityKind, id: &str) -> Self {
        Self::Id { kind, id: id.to_string() }
    }

    /// Search keys are case-insensitive
    pub fn search(kind: EntityKind, title: &str) -> Self {
        Self::Search {
            kind,
            title: title.trim().to_lowercase(),
        }
    }

    pub fn episode(series_id: &str, query: &str) -> Self {
        Self::Episode {
            series_id: series_id.to_string(),
            query: query.to_string(),
        }
    }
}

/// Memoised remote lookups, bounded in size and age
///
/// A cached `None` records that the server answered but had no match, so the
/// same miss is not asked for again until the entry expires.
#[derive(Clone)]
pub struct LookupCache {
    records: Cache<LookupKey, Option<RemoteRecord>>,
}

impl LookupCache {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let records = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { records }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.lookup_ttl_seconds),
            config.lookup_max_entries,
        )
    }

    /// `Some(cached)` on a hit, `None` on a miss
    pub async fn get(&self, key: &LookupKey) -> Option<Option<RemoteRecord>> {
        self.records.get(key).await
    }

    pub async fn insert(&self, key: LookupKey, record: Option<RemoteRecord>) {
        self.records.insert(key, record).await;
    }

    pub fn clear(&self) {
        self.records.invalidate_all();
    }
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
