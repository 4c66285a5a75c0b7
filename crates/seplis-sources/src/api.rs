use crate::error::SourceError;
use crate::traits::SeplisApi;
use seplis_models::{EntityKind, RemoteRecord};
use serde_json::Value;
use tracing::debug;

/// Public site, used for entry urls
pub const SITE_URL: &str = "https://seplis.net";

pub fn record_path(kind: EntityKind, id: &str) -> String {
    format!("/2/{}/{}", kind.collection(), urlencoding::encode(id))
}

pub fn episodes_path(series_id: &str) -> String {
    format!("/2/series/{}/episodes", urlencoding::encode(series_id))
}

pub fn series_following_path(user_id: &str) -> String {
    format!("/2/users/{}/series-following", urlencoding::encode(user_id))
}

pub fn movies_stared_path(user_id: &str) -> String {
    format!("/2/users/{}/movies-stared", urlencoding::encode(user_id))
}

pub fn missing_episodes_path(play_server_id: &str) -> String {
    format!(
        "/2/play-servers/{}/user-series-following-missing-episodes",
        urlencoding::encode(play_server_id)
    )
}

/// Link to the record on the public site
pub fn site_url(kind: EntityKind, id: &str) -> String {
    format!("{}/{}/{}", SITE_URL, kind.collection(), id)
}

fn records_from(path: &str, value: Value) -> Result<Vec<RemoteRecord>, SourceError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(SourceError::decode(path, "expected a list of records")),
        },
        _ => return Err(SourceError::decode(path, "expected a list of records")),
    };
    // Anything that is not an object cannot be a record.
    Ok(items.into_iter().filter_map(RemoteRecord::from_value).collect())
}

/// Fetch one record by its Seplis id; a non-success status is a miss
pub async fn fetch_by_id(
    api: &dyn SeplisApi,
    kind: EntityKind,
    id: &str,
) -> Result<Option<RemoteRecord>, SourceError> {
    let path = record_path(kind, id);
    let response = api.get(&path, &[]).await?;
    let Some(body) = response.into_success() else {
        debug!(kind = %kind, id = id, "No {} with id {}", kind, id);
        return Ok(None);
    };
    RemoteRecord::from_value(body)
        .map(Some)
        .ok_or_else(|| SourceError::decode(&path, "expected an object"))
}

/// Title search, results in API order
///
/// `Ok(None)` when the server answered with a non-success status, so callers
/// can tell "no results" from "no answer".
pub async fn search(
    api: &dyn SeplisApi,
    kind: EntityKind,
    title: &str,
) -> Result<Option<Vec<RemoteRecord>>, SourceError> {
    let path = "/2/search";
    let query = [("title", title.to_string()), ("type", kind.as_str().to_string())];
    match api.get(path, &query).await?.into_success() {
        Some(body) => records_from(path, body).map(Some),
        None => Ok(None),
    }
}

/// Episodes of a series matching structured query parameters
pub async fn episodes(
    api: &dyn SeplisApi,
    series_id: &str,
    query: &[(&str, String)],
) -> Result<Option<Vec<RemoteRecord>>, SourceError> {
    let path = episodes_path(series_id);
    match api.get(&path, query).await?.into_success() {
        Some(body) => records_from(&path, body).map(Some),
        None => Ok(None),
    }
}

/// Resolve a username to a user id
///
/// The user list is required by the calling task, so a non-success status
/// is an error. `Ok(None)` means the user does not exist.
pub async fn find_user_id(api: &dyn SeplisApi, username: &str) -> Result<Option<String>, SourceError> {
    let path = "/2/users";
    let body = api
        .get(path, &[("username", username.to_string())])
        .await?
        .require(path)?;
    let users = records_from(path, body)?;
    Ok(users.first().and_then(RemoteRecord::id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeApi;
    use serde_json::json;

    #[test]
    fn test_paths() {
        assert_eq!(record_path(EntityKind::Movie, "12"), "/2/movies/12");
        assert_eq!(record_path(EntityKind::Series, "3"), "/2/series/3");
        assert_eq!(episodes_path("3"), "/2/series/3/episodes");
        assert_eq!(
            missing_episodes_path("abc def"),
            "/2/play-servers/abc%20def/user-series-following-missing-episodes"
        );
        assert_eq!(site_url(EntityKind::Movie, "12"), "https://seplis.net/movies/12");
    }

    #[tokio::test]
    async fn test_fetch_by_id_miss_on_error_status() {
        let api = FakeApi::new();
        api.respond("/2/movies/1", &[], json!({"id": 1, "title": "Example"}));
        api.respond_status("/2/movies/2", &[], 500);

        let found = fetch_by_id(&api, EntityKind::Movie, "1").await.unwrap();
        assert_eq!(found.unwrap().title(), Some("Example"));
        assert!(fetch_by_id(&api, EntityKind::Movie, "2").await.unwrap().is_none());
        assert!(fetch_by_id(&api, EntityKind::Movie, "3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_keeps_api_order() {
        let api = FakeApi::new();
        api.respond(
            "/2/search",
            &[("title", "Example"), ("type", "series")],
            json!([{"id": 2, "title": "Example 2"}, {"id": 1, "title": "Example"}]),
        );

        api.respond("/2/search", &[("title", "Nothing"), ("type", "series")], json!([]));

        let results = search(&api, EntityKind::Series, "Example").await.unwrap().unwrap();
        let ids: Vec<String> = results.iter().filter_map(RemoteRecord::id).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(search(&api, EntityKind::Series, "Nothing").await.unwrap(), Some(vec![]));
        assert_eq!(search(&api, EntityKind::Movie, "Example").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_episodes_accepts_paged_body() {
        let api = FakeApi::new();
        api.respond(
            "/2/series/5/episodes",
            &[("number", "12")],
            json!({"items": [{"number": 12, "title": "Twelve"}], "cursor": null}),
        );
        let found = episodes(&api, "5", &[("number", "12".to_string())]).await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].i64_field("number"), Some(12));
    }

    #[tokio::test]
    async fn test_find_user_id() {
        let api = FakeApi::new();
        api.respond("/2/users", &[("username", "alice")], json!([{"id": 9, "username": "alice"}]));
        api.respond("/2/users", &[("username", "nobody")], json!([]));
        api.respond_status("/2/users", &[("username", "broken")], 503);

        assert_eq!(find_user_id(&api, "alice").await.unwrap().as_deref(), Some("9"));
        assert_eq!(find_user_id(&api, "nobody").await.unwrap(), None);
        assert!(matches!(
            find_user_id(&api, "broken").await,
            Err(SourceError::Status { status: 503, .. })
        ));
    }
}
