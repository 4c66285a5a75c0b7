use crate::cache::LookupCache;
use crate::clean_target::{CleanReport, CleanTarget};
use crate::inputs::InputRunner;
use crate::lookup::LookupResolver;
use crate::resolvers::SeplisLookup;
use anyhow::{Context, Result};
use seplis_config::{CacheConfig, TaskConfig};
use seplis_models::Entry;
use seplis_sources::SeplisApi;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOptions {
    /// Report what clean_target would delete without deleting
    pub dry_run: bool,
}

pub struct TaskResult {
    pub name: String,
    pub entries: Vec<Entry>,
    /// Entries that got lazy lookups attached
    pub lookups_attached: usize,
    pub cleaned: Option<CleanReport>,
    pub duration: Duration,
}

/// Runs configured tasks: inputs, then lookups, then clean_target
///
/// The lookup and input caches live as long as the runner, so several tasks
/// run by one runner share them.
pub struct TaskRunner {
    inputs: InputRunner,
    resolver: Arc<LookupResolver>,
}

impl TaskRunner {
    pub fn new(api: Arc<dyn SeplisApi>, cache: &CacheConfig) -> Self {
        let resolver = Arc::new(LookupResolver::new(api.clone(), LookupCache::from_config(cache)));
        Self {
            inputs: InputRunner::from_config(api, cache),
            resolver,
        }
    }

    #[instrument(skip(self, task, options), fields(task = %task.name))]
    pub async fn run(&self, task: &TaskConfig, options: &RunOptions) -> Result<TaskResult> {
        let start = Instant::now();
        info!("Running task");

        let mut entries = Vec::new();
        for input in &task.inputs {
            let produced = self
                .inputs
                .fetch(input)
                .await
                .with_context(|| format!("Task '{}': input {} failed", task.name, input.name()))?;
            entries.extend(produced);
        }

        let lookups_attached = match task.lookup {
            Some(kind) => SeplisLookup::new(self.resolver.clone(), kind).attach_all(&mut entries),
            None => 0,
        };

        let cleaned = match task.clean_target.as_ref().and_then(CleanTarget::from_config) {
            Some(target) => Some(
                target
                    .run(&mut entries, options.dry_run)
                    .await
                    .with_context(|| format!("Task '{}': clean_target failed", task.name))?,
            ),
            None => None,
        };

        let duration = start.elapsed();
        info!(
            entries = entries.len(),
            lookups = lookups_attached,
            duration_ms = duration.as_millis() as u64,
            "Task finished"
        );
        Ok(TaskResult {
            name: task.name.clone(),
            entries,
            lookups_attached,
            cleaned,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seplis_config::{CleanTargetConfig, InputConfig, LookupKind};
    use seplis_models::FieldValue;
    use seplis_sources::fake::FakeApi;
    use serde_json::json;
    use tempfile::TempDir;

    fn task(inputs: Vec<InputConfig>) -> TaskConfig {
        TaskConfig {
            name: "test".to_string(),
            inputs,
            lookup: None,
            clean_target: None,
        }
    }

    fn movies_api() -> Arc<FakeApi> {
        let api = Arc::new(FakeApi::new());
        api.respond("/2/users", &[("username", "alice")], json!([{"id": 1}]));
        api.respond(
            "/2/users/1/movies-stared",
            &[("per_page", "100")],
            json!({"items": [{"id": 2, "title": "Example", "release_date": "1999-07-01"}], "cursor": null}),
        );
        api
    }

    #[tokio::test]
    async fn test_inputs_then_lookup() {
        let api = movies_api();
        api.respond("/2/movies/2", &[], json!({"id": 2, "title": "Example", "externals": {"imdb": "tt2"}}));
        let runner = TaskRunner::new(api.clone(), &CacheConfig::default());

        let mut config = task(vec![InputConfig::SeplisMoviesStared { usernames: vec!["alice".to_string()] }]);
        config.lookup = Some(LookupKind::Movie);

        let mut result = runner.run(&config, &RunOptions::default()).await.unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.lookups_attached, 1);
        assert!(result.entries[0].is_lazy("imdb_id"));
        assert_eq!(api.count("/2/movies/2"), 0);

        let imdb = result.entries[0].get("imdb_id").await;
        assert_eq!(imdb, Some(FieldValue::from("tt2")));
        assert_eq!(api.count("/2/movies/2"), 1);
    }

    #[tokio::test]
    async fn test_failed_input_aborts_task() {
        let api = movies_api();
        api.respond("/2/users", &[("username", "nobody")], json!([]));
        let runner = TaskRunner::new(api.clone(), &CacheConfig::default());
        let config = task(vec![
            InputConfig::SeplisMoviesStared { usernames: vec!["alice".to_string()] },
            InputConfig::SeplisSeriesFollowing { usernames: vec!["nobody".to_string()] },
        ]);

        let err = runner.run(&config, &RunOptions::default()).await.err().unwrap();
        assert!(format!("{:#}", err).contains("Unknown user: nobody"));
    }

    #[tokio::test]
    async fn test_clean_target_after_inputs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Example (1999).mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("Other.mkv"), b"x").unwrap();

        let runner = TaskRunner::new(movies_api(), &CacheConfig::default());
        let mut config = task(vec![InputConfig::SeplisMoviesStared { usernames: vec!["alice".to_string()] }]);
        config.clean_target = Some(CleanTargetConfig {
            location: dir.path().display().to_string(),
            remove: "{title}".to_string(),
        });

        let result = runner.run(&config, &RunOptions { dry_run: true }).await.unwrap();
        assert_eq!(result.cleaned.as_ref().unwrap().matched.len(), 1);
        assert!(dir.path().join("Example (1999).mkv").exists());

        let result = runner.run(&config, &RunOptions::default()).await.unwrap();
        assert_eq!(result.cleaned.unwrap().removed, 1);
        assert!(!dir.path().join("Example (1999).mkv").exists());
        assert!(dir.path().join("Other.mkv").exists());
    }
}
