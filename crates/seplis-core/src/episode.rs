use crate::lookup::parse_date;
use chrono::NaiveDate;
use seplis_models::{Entry, FieldValue, RemoteRecord};

/// How a series numbers its episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeScheme {
    /// Absolute episode number
    Sequence,
    /// Season and episode pair
    SeasonEpisode,
    /// Air date
    AirDate,
}

impl EpisodeScheme {
    /// Parse an entry's `series_id_type` (`sequence`, `ep` or `date`)
    pub fn parse(id_type: &str) -> Option<Self> {
        match id_type {
            "sequence" => Some(Self::Sequence),
            "ep" => Some(Self::SeasonEpisode),
            "date" => Some(Self::AirDate),
            _ => None,
        }
    }

    /// Map the API's numeric `episode_type` of a series
    pub fn from_episode_type(episode_type: i64) -> Option<Self> {
        match episode_type {
            1 => Some(Self::Sequence),
            2 => Some(Self::SeasonEpisode),
            3 => Some(Self::AirDate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::SeasonEpisode => "ep",
            Self::AirDate => "date",
        }
    }
}

/// Structured episode query for `/2/series/{id}/episodes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeQuery {
    Number(i64),
    SeasonEpisode { season: i64, episode: i64 },
    AirDate(NaiveDate),
}

impl EpisodeQuery {
    /// Build the query from the entry's parsed series fields
    ///
    /// `None` when the scheme is unknown or the fields it needs are missing;
    /// the episode lookup is then skipped.
    pub fn from_entry(entry: &Entry) -> Option<Self> {
        let scheme = entry.get_str("series_id_type").and_then(EpisodeScheme::parse)?;
        match scheme {
            EpisodeScheme::Sequence => {
                let number = entry.get_eager("series_id").and_then(FieldValue::as_i64)?;
                Some(Self::Number(number))
            }
            EpisodeScheme::SeasonEpisode => {
                let season = entry.get_eager("series_season").and_then(FieldValue::as_i64)?;
                let episode = entry.get_eager("series_episode").and_then(FieldValue::as_i64)?;
                Some(Self::SeasonEpisode { season, episode })
            }
            EpisodeScheme::AirDate => {
                let date = entry.get_eager("series_date").and_then(FieldValue::as_date)?;
                Some(Self::AirDate(date))
            }
        }
    }

    pub fn scheme(&self) -> EpisodeScheme {
        match self {
            Self::Number(_) => EpisodeScheme::Sequence,
            Self::SeasonEpisode { .. } => EpisodeScheme::SeasonEpisode,
            Self::AirDate(_) => EpisodeScheme::AirDate,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Number(number) => vec![("number", number.to_string())],
            Self::SeasonEpisode { season, episode } => vec![
                ("season", season.to_string()),
                ("episode", episode.to_string()),
            ],
            Self::AirDate(date) => vec![("air_date", date.format("%Y-%m-%d").to_string())],
        }
    }

    pub fn cache_key(&self) -> String {
        self.params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Human readable identifier of a fetched episode under `scheme`
///
/// `12` for sequence numbering, `S02E05` for season/episode, `2021-03-04`
/// for air dates.
pub fn episode_label(scheme: EpisodeScheme, episode: &RemoteRecord) -> Option<String> {
    match scheme {
        EpisodeScheme::Sequence => episode.i64_field("number").map(|n| n.to_string()),
        EpisodeScheme::SeasonEpisode => {
            let season = episode.i64_field("season")?;
            let number = episode.i64_field("episode")?;
            Some(format!("S{:02}E{:02}", season, number))
        }
        EpisodeScheme::AirDate => episode
            .str_field("air_date")
            .and_then(parse_date)
            .map(|d| d.format("%Y-%m-%d").to_string()),
    }
}
