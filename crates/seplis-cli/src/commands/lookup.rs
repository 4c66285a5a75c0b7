use super::config::load_config_or_default;
use crate::output::{fields_table, Output, OutputFormat};
use chrono::NaiveDate;
use clap::ValueEnum;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use seplis_config::LookupKind;
use seplis_core::{LookupCache, LookupResolver, SeplisLookup};
use seplis_models::Entry;
use seplis_sources::SeplisClient;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LookupTarget {
    Movie,
    Series,
}

/// A one-off lookup from the command line
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub kind: LookupTarget,
    pub title: String,
    pub year: Option<i32>,
    pub id: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub number: Option<i64>,
    pub date: Option<NaiveDate>,
}

impl LookupRequest {
    pub fn lookup_kind(&self) -> LookupKind {
        match self.kind {
            LookupTarget::Movie => LookupKind::Movie,
            LookupTarget::Series => LookupKind::Series,
        }
    }

    /// Build the entry a parsed task entry would look like
    pub fn to_entry(&self) -> Entry {
        let mut entry = Entry::with_title(self.title.clone());
        match self.kind {
            LookupTarget::Movie => {
                entry.set("movie_name", self.title.clone());
                entry.set_opt("movie_year", self.year);
                entry.set_opt("seplis_movie_id", self.id.clone());
            }
            LookupTarget::Series => {
                entry.set("series_name", self.title.clone());
                entry.set_opt("series_year", self.year);
                entry.set_opt("seplis_series_id", self.id.clone());
                if let (Some(season), Some(episode)) = (self.season, self.episode) {
                    entry.set("series_id_type", "ep");
                    entry.set("series_season", season);
                    entry.set("series_episode", episode);
                } else if let Some(number) = self.number {
                    entry.set("series_id_type", "sequence");
                    entry.set("series_id", number);
                } else if let Some(date) = self.date {
                    entry.set("series_id_type", "date");
                    entry.set("series_date", date);
                }
            }
        }
        entry
    }
}

/// Resolve every lookup field of the request's entry
///
/// The second value is true only when Seplis returned a record. The Seplis
/// id given with `--id` is eager input, so the projected title decides.
pub async fn resolve_request(resolver: Arc<LookupResolver>, request: &LookupRequest) -> (Entry, bool) {
    let mut entry = request.to_entry();
    SeplisLookup::new(resolver, request.lookup_kind()).attach(&mut entry);
    entry.resolve_all().await;
    let found = entry.get_eager("seplis_title").is_some();
    (entry, found)
}

pub async fn run_lookup(config_path: Option<PathBuf>, request: LookupRequest, output: &Output) -> Result<()> {
    let config = load_config_or_default(config_path)?;
    let client = SeplisClient::new(&config.api)
        .map_err(|e| eyre!("Failed to create Seplis client: {}", e))?;
    let resolver = Arc::new(LookupResolver::new(
        Arc::new(client),
        LookupCache::from_config(&config.cache),
    ));

    let (entry, found) = resolve_request(resolver, &request).await;
    match output.format() {
        OutputFormat::Human => {
            if found {
                output.success(format!("Found '{}'", entry.get_str("seplis_title").unwrap_or(&request.title)));
            } else {
                output.warn(format!("No Seplis match for '{}'", request.title));
            }
            output.table(&fields_table(&entry));
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&serde_json::json!({"found": found, "entry": entry}));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seplis_models::FieldValue;
    use seplis_sources::fake::FakeApi;
    use serde_json::json;

    fn resolver(api: &Arc<FakeApi>) -> Arc<LookupResolver> {
        Arc::new(LookupResolver::new(api.clone(), LookupCache::default()))
    }

    fn request(kind: LookupTarget) -> LookupRequest {
        LookupRequest {
            kind,
            title: "Example".to_string(),
            year: Some(1999),
            id: None,
            season: None,
            episode: None,
            number: None,
            date: None,
        }
    }

    #[test]
    fn test_movie_entry() {
        let entry = request(LookupTarget::Movie).to_entry();
        assert_eq!(entry.get_str("movie_name"), Some("Example"));
        assert_eq!(entry.get_eager("movie_year"), Some(&FieldValue::Integer(1999)));
        assert!(!entry.contains("series_name"));
    }

    #[test]
    fn test_series_episode_entry() {
        let mut req = request(LookupTarget::Series);
        req.season = Some(2);
        req.episode = Some(5);
        req.id = Some("7".to_string());
        let entry = req.to_entry();
        assert_eq!(entry.get_str("series_id_type"), Some("ep"));
        assert_eq!(entry.get_eager("series_season"), Some(&FieldValue::Integer(2)));
        assert_eq!(entry.get_str("seplis_series_id"), Some("7"));

        let mut req = request(LookupTarget::Series);
        req.date = NaiveDate::from_ymd_opt(2021, 3, 4);
        assert_eq!(req.to_entry().get_str("series_id_type"), Some("date"));
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let api = Arc::new(FakeApi::new());
        api.respond_status("/2/movies/999", &[], 404);
        let mut req = request(LookupTarget::Movie);
        req.id = Some("999".to_string());

        let (entry, found) = resolve_request(resolver(&api), &req).await;
        assert!(!found);
        assert_eq!(entry.get_str("seplis_movie_id"), Some("999"));
        assert_eq!(entry.get_eager("seplis_title"), None);
        assert_eq!(api.count("/2/movies/999"), 1);
    }

    #[tokio::test]
    async fn test_id_lookup_found() {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/movies/2", &[], json!({"id": 2, "title": "Example", "release_date": "1999-07-01"}));
        let mut req = request(LookupTarget::Movie);
        req.id = Some("2".to_string());

        let (entry, found) = resolve_request(resolver(&api), &req).await;
        assert!(found);
        assert_eq!(entry.get_str("seplis_title"), Some("Example (1999)"));
    }
}
