use crate::error::SourceError;
use crate::traits::SeplisApi;
use futures::stream::{self, Stream, TryStreamExt};
use seplis_models::RemoteRecord;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

struct WalkState {
    cursor: Option<String>,
    seen: HashSet<String>,
    finished: bool,
    pages: usize,
}

/// Drain a cursor-paginated collection
///
/// Pages are requested one at a time, each with the cursor returned by the
/// previous page, until the server returns no cursor. A cursor that comes
/// back a second time ends the walk with [`SourceError::Protocol`]. Any
/// non-success status is an error: list endpoints are required data.
pub fn walk<'a>(
    api: &'a dyn SeplisApi,
    path: String,
    per_page: u32,
) -> impl Stream<Item = Result<RemoteRecord, SourceError>> + Send + 'a {
    let initial = WalkState {
        cursor: None,
        seen: HashSet::new(),
        finished: false,
        pages: 0,
    };

    stream::try_unfold(initial, move |mut state| {
        let path = path.clone();
        async move {
            if state.finished {
                debug!(path = %path, pages = state.pages, "Pagination finished");
                return Ok(None);
            }

            let mut query = vec![("per_page", per_page.to_string())];
            if let Some(cursor) = &state.cursor {
                query.push(("cursor", cursor.clone()));
            }

            let body = api.get(&path, &query).await?.require(&path)?;
            let page: PageBody =
                serde_json::from_value(body).map_err(|e| SourceError::decode(&path, e.to_string()))?;
            state.pages += 1;

            match page.cursor.filter(|c| !c.is_empty()) {
                None => state.finished = true,
                Some(next) => {
                    if !state.seen.insert(next.clone()) {
                        return Err(SourceError::Protocol(format!(
                            "{} returned cursor {:?} twice",
                            path, next
                        )));
                    }
                    state.cursor = Some(next);
                }
            }

            let records: Vec<RemoteRecord> = page
                .items
                .into_iter()
                .filter_map(RemoteRecord::from_value)
                .collect();
            Ok(Some((records, state)))
        }
    })
    .map_ok(|records| stream::iter(records.into_iter().map(Ok::<RemoteRecord, SourceError>)))
    .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeApi;
    use serde_json::json;

    const PATH: &str = "/2/users/1/movies-stared";

    async fn collect(api: &FakeApi) -> Result<Vec<String>, SourceError> {
        let records: Vec<RemoteRecord> = walk(api, PATH.to_string(), 2).try_collect().await?;
        Ok(records.iter().filter_map(|r| r.title().map(str::to_string)).collect())
    }

    #[tokio::test]
    async fn test_walks_every_page_once() {
        let api = FakeApi::new();
        api.respond(PATH, &[("per_page", "2")], json!({"items": [{"title": "a"}, {"title": "b"}], "cursor": "A"}));
        api.respond(PATH, &[("per_page", "2"), ("cursor", "A")], json!({"items": [{"title": "c"}, {"title": "d"}], "cursor": "B"}));
        api.respond(PATH, &[("per_page", "2"), ("cursor", "B")], json!({"items": [{"title": "e"}], "cursor": null}));

        let titles = collect(&api).await.unwrap();
        assert_eq!(titles, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(api.count(PATH), 3);
    }

    #[tokio::test]
    async fn test_missing_cursor_ends_walk() {
        let api = FakeApi::new();
        api.respond(PATH, &[("per_page", "2")], json!({"items": [{"title": "only"}]}));

        assert_eq!(collect(&api).await.unwrap(), vec!["only"]);
        assert_eq!(api.count(PATH), 1);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_an_error() {
        let api = FakeApi::new();
        api.respond(PATH, &[("per_page", "2")], json!({"items": [{"title": "a"}], "cursor": "A"}));
        api.respond(PATH, &[("per_page", "2"), ("cursor", "A")], json!({"items": [{"title": "b"}], "cursor": "A"}));

        let result = collect(&api).await;
        assert!(matches!(result, Err(SourceError::Protocol(_))));
        assert_eq!(api.count(PATH), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let api = FakeApi::new();
        api.respond_status(PATH, &[("per_page", "2")], 500);

        assert!(matches!(
            collect(&api).await,
            Err(SourceError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_records_stream_lazily() {
        let api = FakeApi::new();
        api.respond(PATH, &[("per_page", "2")], json!({"items": [{"title": "a"}], "cursor": "A"}));
        api.respond(PATH, &[("per_page", "2"), ("cursor", "A")], json!({"items": [{"title": "b"}], "cursor": null}));

        let mut records = Box::pin(walk(&api, PATH.to_string(), 2));
        let first = records.try_next().await.unwrap().unwrap();
        assert_eq!(first.title(), Some("a"));
        assert_eq!(api.count(PATH), 1);
    }
}
