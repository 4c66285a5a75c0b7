use crate::episode::EpisodeScheme;
use crate::lookup::{derive_year, display_title, parse_date};
use futures::TryStreamExt;
use moka::future::Cache;
use seplis_config::{CacheConfig, InputConfig, ListKind};
use seplis_models::{EntityKind, Entry, FieldValue, RemoteRecord};
use seplis_sources::{api, walk, SeplisApi, SourceError, DEFAULT_PAGE_SIZE};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

type Converter = fn(&RemoteRecord) -> Option<Entry>;

/// Produces task entries from the configured Seplis lists
///
/// Results are memoised per input configuration for a short time, so tasks
/// sharing an input within the same minute fetch it once.
pub struct InputRunner {
    api: Arc<dyn SeplisApi>,
    cache: Cache<String, Vec<Entry>>,
    page_size: u32,
}

impl InputRunner {
    pub fn new(api: Arc<dyn SeplisApi>, ttl: Duration) -> Self {
        Self {
            api,
            cache: Cache::builder().time_to_live(ttl).build(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn from_config(api: Arc<dyn SeplisApi>, config: &CacheConfig) -> Self {
        Self::new(api, Duration::from_secs(config.input_ttl_seconds))
    }

    /// Fetch every entry of one input
    ///
    /// Any failure aborts the whole input; a partial list is never returned.
    pub async fn fetch(&self, input: &InputConfig) -> Result<Vec<Entry>, SourceError> {
        let key = input.cache_key();
        if let Some(entries) = self.cache.get(&key).await {
            debug!(input = input.name(), "Input cache hit");
            return Ok(entries);
        }

        let entries = match input {
            InputConfig::SeplisList { kind, urls } => {
                let convert: Converter = match kind {
                    ListKind::Movies => movie_to_entry,
                    ListKind::Series => series_to_entry,
                };
                let paths = urls.iter().map(|url| url.trim().to_string()).collect();
                self.collect(paths, convert).await?
            }
            InputConfig::SeplisSeriesFollowing { usernames } => {
                let user_ids = self.resolve_users(usernames).await?;
                let paths = user_ids.iter().map(|id| api::series_following_path(id)).collect();
                self.collect(paths, series_to_entry).await?
            }
            InputConfig::SeplisMoviesStared { usernames } => {
                let user_ids = self.resolve_users(usernames).await?;
                let paths = user_ids.iter().map(|id| api::movies_stared_path(id)).collect();
                self.collect(paths, movie_to_entry).await?
            }
            InputConfig::SeplisSeriesFollowingMissingEpisodes { play_servers } => {
                let paths = play_servers
                    .iter()
                    .map(|id| api::missing_episodes_path(id))
                    .collect();
                self.collect(paths, series_to_entry).await?
            }
        };

        info!(input = input.name(), entries = entries.len(), "Input produced entries");
        self.cache.insert(key, entries.clone()).await;
        Ok(entries)
    }

    /// Every username is resolved before any list is fetched
    async fn resolve_users(&self, usernames: &[String]) -> Result<Vec<String>, SourceError> {
        let mut user_ids = Vec::with_capacity(usernames.len());
        for username in usernames {
            let id = api::find_user_id(self.api.as_ref(), username)
                .await?
                .ok_or_else(|| SourceError::Config(format!("Unknown user: {}", username)))?;
            debug!(username = %username, user_id = %id, "Resolved user");
            user_ids.push(id);
        }
        Ok(user_ids)
    }

    /// Walk each path in order, keeping the first entry per display title
    async fn collect(&self, paths: Vec<String>, convert: Converter) -> Result<Vec<Entry>, SourceError> {
        let mut titles = HashSet::new();
        let mut entries = Vec::new();
        for path in paths {
            let mut records = Box::pin(walk(self.api.as_ref(), path, self.page_size));
            while let Some(record) = records.try_next().await? {
                let Some(entry) = convert(&record) else {
                    continue;
                };
                let Some(title) = entry.title() else {
                    continue;
                };
                if !titles.insert(title.to_string()) {
                    debug!(title = title, "Skipping duplicate");
                    continue;
                }
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

fn external(record: &RemoteRecord, provider: &str) -> Option<FieldValue> {
    record.external(provider).and_then(FieldValue::from_json)
}

/// Movie list item to entry; `None` for records without a title
pub fn movie_to_entry(movie: &RemoteRecord) -> Option<Entry> {
    let name = movie.title()?;
    let year = derive_year(movie);
    let title = display_title(name, year);

    let mut entry = Entry::with_title(title.clone());
    if let Some(id) = movie.id() {
        entry.set("url", api::site_url(EntityKind::Movie, &id));
    }
    entry.set_opt("seplis_movie_id", movie.get("id").and_then(FieldValue::from_json));
    entry.set("seplis_title", title);
    if let Some(released) = movie.str_field("release_date").and_then(parse_date) {
        entry.set("tmdb_released", released);
        entry.set("seplis_release_date", released);
    }
    entry.set("movie_name", name);
    entry.set_opt("movie_year", year);
    entry.set_opt("imdb_id", external(movie, "imdb"));
    entry.set_opt("tmdb_id", external(movie, "themoviedb"));
    Some(entry)
}

/// Series list item to entry; `None` for records without a title
pub fn series_to_entry(series: &RemoteRecord) -> Option<Entry> {
    let name = series.title()?;
    let title = display_title(name, derive_year(series));

    let mut entry = Entry::with_title(title.clone());
    let alternate = series.alternative_titles();
    if !alternate.is_empty() {
        entry.set("alternate_name", alternate);
    }
    if let Some(id) = series.id() {
        entry.set("url", api::site_url(EntityKind::Series, &id));
    }
    entry.set_opt("seplis_series_id", series.get("id").and_then(FieldValue::from_json));
    entry.set("seplis_title", title);
    entry.set("series_name", name);
    entry.set_opt("imdb_id", external(series, "imdb"));
    entry.set_opt("tvmaze_id", external(series, "tvmaze"));
    entry.set_opt("tvdb_id", external(series, "thetvdb"));
    entry.set_opt("tmdb_id", external(series, "themoviedb"));
    if let Some(scheme) = series
        .i64_field("episode_type")
        .and_then(EpisodeScheme::from_episode_type)
    {
        entry.set("identified_by", scheme.as_str());
    }
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seplis_sources::fake::FakeApi;
    use serde_json::json;

    fn runner(api: &Arc<FakeApi>) -> InputRunner {
        InputRunner::new(api.clone(), Duration::from_secs(60))
    }

    fn record(value: serde_json::Value) -> RemoteRecord {
        RemoteRecord::from_value(value).unwrap()
    }

    fn single_page(items: serde_json::Value) -> serde_json::Value {
        json!({"items": items, "cursor": null})
    }

    #[test]
    fn test_movie_to_entry() {
        let movie = record(json!({
            "id": 12,
            "title": "Example",
            "release_date": "1999-07-01",
            "externals": {"imdb": "tt0000012", "themoviedb": 120}
        }));
        let entry = movie_to_entry(&movie).unwrap();
        assert_eq!(entry.title(), Some("Example (1999)"));
        assert_eq!(entry.get_str("url"), Some("https://seplis.net/movies/12"));
        assert_eq!(entry.get_eager("seplis_movie_id"), Some(&FieldValue::Integer(12)));
        assert_eq!(entry.get_str("movie_name"), Some("Example"));
        assert_eq!(entry.get_eager("movie_year"), Some(&FieldValue::Integer(1999)));
        assert_eq!(
            entry.get_eager("tmdb_released").and_then(FieldValue::as_date),
            chrono::NaiveDate::from_ymd_opt(1999, 7, 1)
        );
        assert_eq!(entry.get_eager("tmdb_id"), Some(&FieldValue::Integer(120)));
    }

    #[test]
    fn test_series_to_entry() {
        let series = record(json!({
            "id": 7,
            "title": "Example 2004",
            "premiered": "2004-09-22",
            "alternative_titles": ["", "Example US"],
            "externals": {"thetvdb": 70, "tvmaze": null},
            "episode_type": 2
        }));
        let entry = series_to_entry(&series).unwrap();
        assert_eq!(entry.title(), Some("Example 2004"));
        assert_eq!(entry.get_eager("alternate_name"), Some(&FieldValue::from(vec!["Example US".to_string()])));
        assert_eq!(entry.get_str("url"), Some("https://seplis.net/series/7"));
        assert_eq!(entry.get_str("identified_by"), Some("ep"));
        assert_eq!(entry.get_eager("tvdb_id"), Some(&FieldValue::Integer(70)));
        assert!(!entry.contains("tvmaze_id"));
    }

    #[test]
    fn test_untitled_records_are_dropped() {
        assert!(movie_to_entry(&record(json!({"id": 1, "title": ""}))).is_none());
        assert!(series_to_entry(&record(json!({"id": 1, "title": null}))).is_none());
    }

    #[tokio::test]
    async fn test_series_following() {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/users", &[("username", "alice")], json!([{"id": 1}]));
        api.respond(
            "/2/users/1/series-following",
            &[("per_page", "100")],
            single_page(json!([
                {"id": 7, "title": "Example", "premiered": "1999-01-01", "episode_type": 1},
                {"id": 8, "title": "", "premiered": null}
            ])),
        );

        let input = InputConfig::SeplisSeriesFollowing { usernames: vec!["alice".to_string()] };
        let entries = runner(&api).fetch(&input).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title(), Some("Example (1999)"));
        assert_eq!(entries[0].get_str("identified_by"), Some("sequence"));
    }

    #[tokio::test]
    async fn test_unknown_user_fails_before_fetching_lists() {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/users", &[("username", "alice")], json!([{"id": 1}]));
        api.respond("/2/users", &[("username", "nobody")], json!([]));
        api.respond("/2/users/1/movies-stared", &[("per_page", "100")], single_page(json!([])));

        let input = InputConfig::SeplisMoviesStared {
            usernames: vec!["alice".to_string(), "nobody".to_string()],
        };
        let err = runner(&api).fetch(&input).await.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Unknown user: nobody"));
        assert_eq!(api.count("/2/users/1/"), 0);
    }

    #[tokio::test]
    async fn test_duplicates_across_pages_and_lists() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "/2/lists/a",
            &[("per_page", "100")],
            json!({"items": [{"id": 1, "title": "Example", "release_date": "1999-01-01"}], "cursor": "B"}),
        );
        api.respond(
            "/2/lists/a",
            &[("per_page", "100"), ("cursor", "B")],
            single_page(json!([
                {"id": 2, "title": "Example (1999)", "release_date": "1999-05-05"},
                {"id": 3, "title": "Other", "release_date": null}
            ])),
        );
        api.respond(
            "/2/lists/b",
            &[("per_page", "100")],
            single_page(json!([{"id": 4, "title": "Other"}, {"id": 5, "title": "Third"}])),
        );

        let input = InputConfig::SeplisList {
            kind: ListKind::Movies,
            urls: vec!["/2/lists/a".to_string(), "/2/lists/b".to_string()],
        };
        let entries = runner(&api).fetch(&input).await.unwrap();
        let titles: Vec<&str> = entries.iter().filter_map(Entry::title).collect();
        assert_eq!(titles, vec!["Example (1999)", "Other", "Third"]);
        assert_eq!(entries[0].get_eager("seplis_movie_id"), Some(&FieldValue::Integer(1)));
    }

    #[tokio::test]
    async fn test_missing_episodes_and_input_cache() {
        let api = Arc::new(FakeApi::new());
        api.respond(
            "/2/play-servers/abc/user-series-following-missing-episodes",
            &[("per_page", "100")],
            single_page(json!([{"id": 7, "title": "Example"}])),
        );
        let runner = runner(&api);
        let input = InputConfig::SeplisSeriesFollowingMissingEpisodes {
            play_servers: vec!["abc".to_string()],
        };

        assert_eq!(runner.fetch(&input).await.unwrap().len(), 1);
        assert_eq!(runner.fetch(&input).await.unwrap().len(), 1);
        assert_eq!(api.count("/2/play-servers/abc"), 1);
    }

    #[tokio::test]
    async fn test_list_error_aborts_input() {
        let api = Arc::new(FakeApi::new());
        api.respond_status("/2/lists/a", &[("per_page", "100")], 500);

        let input = InputConfig::SeplisList {
            kind: ListKind::Series,
            urls: vec!["/2/lists/a".to_string()],
        };
        let err = runner(&api).fetch(&input).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 500, .. }));
    }
}
