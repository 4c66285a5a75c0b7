use seplis_models::{Entry, FieldValue, RemoteRecord};

/// Local entry field ← remote record field
pub type FieldMap = [(&'static str, &'static str)];

pub const SERIES_MAP: &FieldMap = &[
    ("seplis_series_id", "id"),
    ("seplis_title", "display_title"),
    ("seplis_year", "year"),
    ("series_year", "year"),
    ("seplis_externals", "externals"),
    ("alternate_name", "alternative_titles"),
    ("imdb_id", "imdb"),
    ("tvdb_id", "thetvdb"),
    ("tmdb_id", "themoviedb"),
    ("tvmaze_id", "tvmaze"),
];

pub const MOVIE_MAP: &FieldMap = &[
    ("seplis_movie_id", "id"),
    ("seplis_title", "display_title"),
    ("seplis_year", "year"),
    ("seplis_release_date", "release_date"),
    ("seplis_externals", "externals"),
    ("imdb_id", "imdb"),
    ("tmdb_id", "themoviedb"),
    // Generic fields every movie lookup fills
    ("movie_name", "title"),
    ("movie_year", "year"),
];

pub const EPISODE_MAP: &FieldMap = &[
    ("seplis_ep_id", "label"),
    ("seplis_ep_title", "title"),
    ("seplis_ep_air_date", "air_date"),
    ("seplis_ep_number", "number"),
    ("seplis_ep_season", "season"),
    ("seplis_ep_episode", "episode"),
];

/// Names of the local fields a map produces
pub fn local_fields(map: &FieldMap) -> Vec<&'static str> {
    map.iter().map(|(local, _)| *local).collect()
}

/// Copy mapped remote fields onto the entry
///
/// Remote fields that are absent or null are skipped, leaving whatever the
/// entry already had. Returns the number of fields written.
pub fn project_fields(entry: &mut Entry, map: &FieldMap, record: &RemoteRecord) -> usize {
    let mut written = 0;
    for (local, remote) in map {
        if let Some(value) = record.get(remote).and_then(FieldValue::from_json) {
            entry.set(local, value);
            written += 1;
        }
    }
    written
}
