use crate::episode::{episode_label, EpisodeQuery, EpisodeScheme};
use crate::field_map::{local_fields, project_fields, FieldMap, EPISODE_MAP, MOVIE_MAP, SERIES_MAP};
use crate::lookup::{enrich, LookupResolver};
use async_trait::async_trait;
use seplis_config::LookupKind;
use seplis_models::{Entry, EntityKind, LazyResolver};
use std::sync::Arc;
use tracing::debug;

/// Movie or series lookup bound to an entry's lazy fields
///
/// Uses the eager Seplis id when the entry has one, otherwise searches for
/// `"{name} {year}"`.
struct RecordLookup {
    resolver: Arc<LookupResolver>,
    kind: EntityKind,
    id_field: &'static str,
    name_field: &'static str,
    year_field: &'static str,
    map: &'static FieldMap,
}

impl RecordLookup {
    fn movie(resolver: Arc<LookupResolver>) -> Self {
        Self {
            resolver,
            kind: EntityKind::Movie,
            id_field: "seplis_movie_id",
            name_field: "movie_name",
            year_field: "movie_year",
            map: MOVIE_MAP,
        }
    }

    fn series(resolver: Arc<LookupResolver>) -> Self {
        Self {
            resolver,
            kind: EntityKind::Series,
            id_field: "seplis_series_id",
            name_field: "series_name",
            year_field: "series_year",
            map: SERIES_MAP,
        }
    }

    fn search_query(&self, entry: &Entry) -> Option<String> {
        let name = entry.get_str(self.name_field)?;
        Some(match entry.get_eager(self.year_field) {
            Some(year) => format!("{} {}", name, year),
            None => name.to_string(),
        })
    }
}

#[async_trait]
impl LazyResolver for RecordLookup {
    fn name(&self) -> &str {
        match self.kind {
            EntityKind::Movie => "seplis_movie_lookup",
            EntityKind::Series => "seplis_series_lookup",
        }
    }

    async fn resolve(&self, entry: &mut Entry) -> anyhow::Result<()> {
        let record = match entry.get_eager(self.id_field).map(|id| id.to_string()) {
            Some(id) => self.resolver.resolve_by_external_id(self.kind, &id).await?,
            None => {
                let Some(query) = self.search_query(entry) else {
                    debug!(kind = %self.kind, "Entry has no {}, skipping lookup", self.name_field);
                    return Ok(());
                };
                self.resolver.resolve_by_title_search(self.kind, &query).await?
            }
        };

        let Some(mut record) = record else {
            debug!(kind = %self.kind, title = ?entry.title(), "No Seplis match");
            return Ok(());
        };
        enrich(&mut record);
        let written = project_fields(entry, self.map, &record);
        debug!(kind = %self.kind, title = ?entry.title(), fields = written, "Seplis lookup done");
        Ok(())
    }
}

/// Episode lookup; reads `seplis_series_id`, forcing the series group if needed
struct EpisodeLookup {
    resolver: Arc<LookupResolver>,
}

#[async_trait]
impl LazyResolver for EpisodeLookup {
    fn name(&self) -> &str {
        "seplis_episode_lookup"
    }

    async fn resolve(&self, entry: &mut Entry) -> anyhow::Result<()> {
        let Some(query) = EpisodeQuery::from_entry(entry) else {
            debug!(title = ?entry.title(), "Unsupported episode identification, skipping");
            return Ok(());
        };
        let Some(series_id) = entry.get("seplis_series_id").await.map(|id| id.to_string()) else {
            debug!(title = ?entry.title(), "Series not found, skipping episode lookup");
            return Ok(());
        };

        let Some(mut episode) = self.resolver.find_episode(&series_id, &query).await? else {
            debug!(series_id = %series_id, query = ?query, "No matching episode");
            return Ok(());
        };
        if let Some(label) = episode_label(query.scheme(), &episode) {
            episode.inject("label", label);
        }
        project_fields(entry, EPISODE_MAP, &episode);
        Ok(())
    }
}

/// Attaches lazy Seplis lookups to entries
///
/// Nothing is fetched here; the lookups run the first time one of their
/// fields is read.
pub struct SeplisLookup {
    kind: LookupKind,
    record: Arc<dyn LazyResolver>,
    episode: Arc<dyn LazyResolver>,
}

impl SeplisLookup {
    pub fn new(resolver: Arc<LookupResolver>, kind: LookupKind) -> Self {
        let record: Arc<dyn LazyResolver> = match kind {
            LookupKind::Movie => Arc::new(RecordLookup::movie(resolver.clone())),
            LookupKind::Series => Arc::new(RecordLookup::series(resolver.clone())),
        };
        Self {
            kind,
            record,
            episode: Arc::new(EpisodeLookup { resolver }),
        }
    }

    /// Bind the lookup fields on one entry; false when the entry is skipped
    pub fn attach(&self, entry: &mut Entry) -> bool {
        match self.kind {
            LookupKind::Movie => {
                if entry.get_str("movie_name").is_none() {
                    debug!(title = ?entry.title(), "No movie_name, skipping Seplis lookup");
                    return false;
                }
                entry.add_lazy_fields(self.record.clone(), &local_fields(MOVIE_MAP));
            }
            LookupKind::Series => {
                if entry.get_str("series_name").is_none() {
                    debug!(title = ?entry.title(), "No series_name, skipping Seplis lookup");
                    return false;
                }
                entry.add_lazy_fields(self.record.clone(), &local_fields(SERIES_MAP));
                let episodic = entry
                    .get_str("series_id_type")
                    .and_then(EpisodeScheme::parse)
                    .is_some();
                if episodic {
                    entry.add_lazy_fields(self.episode.clone(), &local_fields(EPISODE_MAP));
                }
            }
        }
        true
    }

    /// Returns how many entries got lookups attached
    pub fn attach_all(&self, entries: &mut [Entry]) -> usize {
        entries
            .iter_mut()
            .map(|entry| self.attach(entry))
            .filter(|attached| *attached)
            .count()
    }
}
