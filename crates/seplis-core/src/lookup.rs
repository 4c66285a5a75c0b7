use crate::cache::{LookupCache, LookupKey};
use crate::episode::EpisodeQuery;
use chrono::NaiveDate;
use seplis_models::{EntityKind, RemoteRecord};
use seplis_sources::{api, SeplisApi, SourceError};
use std::sync::Arc;
use tracing::debug;

/// Provider keys of `externals` that are copied to the top level of a record
pub const EXTERNAL_PROVIDERS: [&str; 4] = ["imdb", "themoviedb", "thetvdb", "tvmaze"];

/// Resolves sparse identifiers to canonical Seplis records
///
/// Combines the API with a [`LookupCache`]. Misses and non-success statuses
/// come back as `Ok(None)`; only transport failures are errors.
pub struct LookupResolver {
    api: Arc<dyn SeplisApi>,
    cache: LookupCache,
}

impl LookupResolver {
    pub fn new(api: Arc<dyn SeplisApi>, cache: LookupCache) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &dyn SeplisApi {
        self.api.as_ref()
    }

    /// Fetch by Seplis id, consulting the cache first
    ///
    /// Only found records are cached; a failed fetch is retried next time.
    pub async fn resolve_by_external_id(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<RemoteRecord>, SourceError> {
        let key = LookupKey::id(kind, id);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(kind = %kind, id = id, "Lookup cache hit");
            return Ok(cached);
        }

        let record = api::fetch_by_id(self.api(), kind, id).await?;
        if let Some(record) = &record {
            self.cache.insert(key, Some(record.clone())).await;
        }
        Ok(record)
    }

    /// Search by title and take the first result in API order
    pub async fn resolve_by_title_search(
        &self,
        kind: EntityKind,
        title: &str,
    ) -> Result<Option<RemoteRecord>, SourceError> {
        let key = LookupKey::search(kind, title);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(kind = %kind, title = title, "Lookup cache hit");
            return Ok(cached);
        }

        let Some(results) = api::search(self.api(), kind, title).await? else {
            return Ok(None);
        };
        let first = results.into_iter().next();
        self.cache.insert(key, first.clone()).await;
        Ok(first)
    }

    /// First episode of a series matching `query`
    pub async fn find_episode(
        &self,
        series_id: &str,
        query: &EpisodeQuery,
    ) -> Result<Option<RemoteRecord>, SourceError> {
        let key = LookupKey::episode(series_id, &query.cache_key());
        if let Some(cached) = self.cache.get(&key).await {
            debug!(series_id = series_id, query = ?query, "Lookup cache hit");
            return Ok(cached);
        }

        let Some(episodes) = api::episodes(self.api(), series_id, &query.params()).await? else {
            return Ok(None);
        };
        let first = episodes.into_iter().next();
        self.cache.insert(key, first.clone()).await;
        Ok(first)
    }
}

/// Year of an ISO-ish date (`1999-07-01`, `1999-07-01T00:00:00Z`, `1999`)
pub fn parse_year(date: &str) -> Option<i32> {
    let head = date.get(..4)?;
    if head.chars().all(|c| c.is_ascii_digit()) {
        head.parse().ok()
    } else {
        None
    }
}

pub fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()
}

/// Year from the record's release date (movies) or premiere date (series)
pub fn derive_year(record: &RemoteRecord) -> Option<i32> {
    ["release_date", "premiered"]
        .iter()
        .find_map(|field| record.str_field(field).and_then(parse_year))
}

/// `Title (Year)`, unless there is no year or the title already contains it
pub fn display_title(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) if !title.contains(&year.to_string()) => format!("{} ({})", title, year),
        _ => title.to_string(),
    }
}

/// Add the derived fields projection relies on
///
/// `year`, `display_title`, and each external provider id at the top level.
pub fn enrich(record: &mut RemoteRecord) {
    let year = derive_year(record);
    if let Some(year) = year {
        record.inject("year", year);
    }
    if let Some(title) = record.title().map(|t| display_title(t, year)) {
        record.inject("display_title", title);
    }
    for provider in EXTERNAL_PROVIDERS {
        if let Some(value) = record.external(provider).cloned() {
            record.inject(provider, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seplis_sources::fake::FakeApi;
    use serde_json::json;

    fn resolver(api: &Arc<FakeApi>) -> LookupResolver {
        LookupResolver::new(api.clone(), LookupCache::default())
    }

    fn record(value: serde_json::Value) -> RemoteRecord {
        RemoteRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_derive_year() {
        assert_eq!(derive_year(&record(json!({"release_date": "1999-07-01"}))), Some(1999));
        assert_eq!(derive_year(&record(json!({"premiered": "2004-09-22"}))), Some(2004));
        assert_eq!(derive_year(&record(json!({"release_date": null}))), None);
        assert_eq!(derive_year(&record(json!({"release_date": "soon"}))), None);
        assert_eq!(derive_year(&record(json!({}))), None);
    }

    #[test]
    fn test_display_title() {
        assert_eq!(display_title("Example", Some(1999)), "Example (1999)");
        assert_eq!(display_title("Example 1999", Some(1999)), "Example 1999");
        assert_eq!(display_title("Example", None), "Example");
    }

    #[test]
    fn test_enrich() {
        let mut movie = record(json!({
            "id": 1,
            "title": "Example",
            "release_date": "1999-07-01",
            "externals": {"imdb": "tt0000001", "themoviedb": "55", "thetvdb": null}
        }));
        enrich(&mut movie);
        assert_eq!(movie.get("year"), Some(&json!(1999)));
        assert_eq!(movie.str_field("display_title"), Some("Example (1999)"));
        assert_eq!(movie.str_field("title"), Some("Example"));
        assert_eq!(movie.str_field("imdb"), Some("tt0000001"));
        assert_eq!(movie.str_field("themoviedb"), Some("55"));
        assert_eq!(movie.get("thetvdb"), None);
    }

    #[tokio::test]
    async fn test_by_id_uses_cache() {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/movies/1", &[], json!({"id": 1, "title": "Example"}));
        let resolver = resolver(&api);

        for _ in 0..3 {
            let found = resolver.resolve_by_external_id(EntityKind::Movie, "1").await.unwrap();
            assert_eq!(found.unwrap().title(), Some("Example"));
        }
        assert_eq!(api.count("/2/movies/1"), 1);
    }

    #[tokio::test]
    async fn test_by_id_error_status_is_not_cached() {
        let api = Arc::new(FakeApi::new());
        api.respond_status("/2/series/4", &[], 502);
        let resolver = resolver(&api);

        assert!(resolver.resolve_by_external_id(EntityKind::Series, "4").await.unwrap().is_none());
        assert!(resolver.resolve_by_external_id(EntityKind::Series, "4").await.unwrap().is_none());
        assert_eq!(api.count("/2/series/4"), 2);
    }

    #[tokio::test]
    async fn test_title_search_takes_first_result() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "/2/search",
            &[("title", "Example 1999"), ("type", "movie")],
            json!([{"id": 2, "title": "Example"}, {"id": 3, "title": "Example II"}]),
        );
        let resolver = resolver(&api);

        let found = resolver
            .resolve_by_title_search(EntityKind::Movie, "Example 1999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_search_is_cached_miss() {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/search", &[("title", "Nothing"), ("type", "series")], json!([]));
        let resolver = resolver(&api);

        assert!(resolver.resolve_by_title_search(EntityKind::Series, "Nothing").await.unwrap().is_none());
        assert!(resolver.resolve_by_title_search(EntityKind::Series, "Nothing").await.unwrap().is_none());
        assert_eq!(api.count("/2/search"), 1);
    }

    #[tokio::test]
    async fn test_find_episode() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "/2/series/7/episodes",
            &[("season", "2"), ("episode", "5")],
            json!({"items": [{"number": 17, "season": 2, "episode": 5}]}),
        );
        let resolver = resolver(&api);

        let query = EpisodeQuery::SeasonEpisode { season: 2, episode: 5 };
        let episode = resolver.find_episode("7", &query).await.unwrap().unwrap();
        assert_eq!(episode.i64_field("number"), Some(17));
        resolver.find_episode("7", &query).await.unwrap();
        assert_eq!(api.count("/2/series/7/episodes"), 1);
    }
}
