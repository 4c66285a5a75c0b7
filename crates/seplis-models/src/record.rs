use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of remote entity a lookup targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    Series,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Series => "series",
        }
    }

    /// REST collection holding this kind (`/2/{collection}/{id}`)
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Movie => "movies",
            EntityKind::Series => "series",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movie, series or episode object as returned by the API
///
/// Kept as the raw JSON object: projection works on remote field names, and
/// only derived fields (year, display title, flattened externals) are ever
/// added after the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRecord(Map<String, Value>);

impl RemoteRecord {
    /// Wrap a JSON value; anything but an object is rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Non-null value of a remote field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn i64_field(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// Title, treating an empty string as missing
    pub fn title(&self) -> Option<&str> {
        self.str_field("title").filter(|t| !t.is_empty())
    }

    /// The remote id rendered as text (ids are integers on the wire)
    pub fn id(&self) -> Option<String> {
        match self.get("id")? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// External provider id (`imdb`, `themoviedb`, `thetvdb`, ...)
    pub fn external(&self, provider: &str) -> Option<&Value> {
        self.get("externals")
            .and_then(Value::as_object)
            .and_then(|externals| externals.get(provider))
            .filter(|v| !v.is_null())
    }

    /// Non-empty alternative titles
    pub fn alternative_titles(&self) -> Vec<String> {
        self.get("alternative_titles")
            .and_then(Value::as_array)
            .map(|titles| {
                titles
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Add a derived field
    pub fn inject(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }
}
