use super::config::load_config;
use super::progress::TaskProgress;
use crate::output::{entries_table, Output, OutputFormat};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use seplis_config::TaskConfig;
use seplis_core::{RunOptions, TaskRunner};
use seplis_sources::SeplisClient;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_tasks(
    config_path: Option<PathBuf>,
    names: Vec<String>,
    resolve: bool,
    dry_run: bool,
    output: &Output,
) -> Result<()> {
    tracing::debug!("Run command started");
    let config = load_config(config_path)?;

    let tasks: Vec<&TaskConfig> = if names.is_empty() {
        config.tasks.iter().collect()
    } else {
        names
            .iter()
            .map(|name| config.task(name).ok_or_else(|| eyre!("Unknown task: {}", name)))
            .collect::<Result<_>>()?
    };
    if tasks.is_empty() {
        output.warn("No tasks configured");
        return Ok(());
    }

    let client = SeplisClient::new(&config.api)
        .map_err(|e| eyre!("Failed to create Seplis client: {}", e))?;
    let runner = TaskRunner::new(Arc::new(client), &config.cache);
    let options = RunOptions { dry_run };

    let progress = TaskProgress::new(tasks.len(), output.format() == OutputFormat::Human);
    let mut summaries = Vec::new();
    for task in tasks {
        progress.start(&task.name);
        let mut result = runner
            .run(task, &options)
            .await
            .map_err(|e| eyre!("Task '{}' failed: {:#}", task.name, e))?;
        if resolve {
            for entry in result.entries.iter_mut() {
                entry.resolve_all().await;
            }
        }
        progress.finish_task();

        match output.format() {
            OutputFormat::Human => progress.suspend(|| {
                output.success(format!(
                    "Task '{}': {} entries in {:?}",
                    result.name,
                    result.entries.len(),
                    result.duration
                ));
                if !result.entries.is_empty() {
                    output.table(&entries_table(&result.entries));
                }
                if let Some(report) = &result.cleaned {
                    let verb = if dry_run { "Would clean" } else { "Cleaned" };
                    output.info(format!("{} {} file(s)", verb, report.matched.len()));
                    if report.failed > 0 {
                        output.warn(format!("{} file(s) could not be removed", report.failed));
                    }
                }
            }),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                summaries.push(json!({
                    "task": result.name,
                    "duration_seconds": result.duration.as_secs_f64(),
                    "lookups_attached": result.lookups_attached,
                    "entries": result.entries,
                    "cleaned": result.cleaned.as_ref().map(|r| json!({
                        "matched": r.matched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                        "removed": r.removed,
                        "failed": r.failed,
                        "skipped": r.skipped,
                        "dry_run": dry_run,
                    })),
                }));
            }
        }
    }
    progress.finish();

    if output.format() != OutputFormat::Human {
        output.json(&json!({"success": true, "tasks": summaries}));
    }
    Ok(())
}
