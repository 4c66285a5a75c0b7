use crate::output::{styled_table, Output, OutputFormat};
use crate::ConfigCommands;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use owo_colors::OwoColorize;
use seplis_config::{Config, InputConfig, PathManager};
use std::path::{Path, PathBuf};

pub fn run_config(config_path: Option<PathBuf>, cmd: ConfigCommands, output: &Output) -> Result<()> {
    let path = config_file(config_path);
    match cmd {
        ConfigCommands::Show { full } => show_config(&path, full, output),
        ConfigCommands::Path => {
            match output.format() {
                OutputFormat::Human => println!("{}", path.display()),
                OutputFormat::Json | OutputFormat::JsonPretty => output.json(&serde_json::json!({
                    "config_file": path.display().to_string(),
                    "exists": path.exists(),
                    "log_file": PathManager::default().log_file().display().to_string(),
                })),
            }
            Ok(())
        }
    }
}

/// `--config` when given, otherwise the managed location
pub fn config_file(config_path: Option<PathBuf>) -> PathBuf {
    config_path.unwrap_or_else(|| PathManager::default().config_file())
}

/// Load and validate the configuration; a missing file is an error
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = config_file(config_path);
    if !path.exists() {
        return Err(eyre!(
            "Configuration file not found at {}. Create it or pass --config.",
            path.display()
        ));
    }
    read_config(&path)
}

/// Like [`load_config`], but falls back to defaults when the managed file
/// does not exist. An explicit `--config` must exist.
pub fn load_config_or_default(config_path: Option<PathBuf>) -> Result<Config> {
    let explicit = config_path.is_some();
    let path = config_file(config_path);
    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    read_config(&path)
}

fn read_config(path: &Path) -> Result<Config> {
    let config = Config::load_from_file(&path.to_path_buf())
        .map_err(|e| eyre!("Failed to load config from {}: {}", path.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;
    Ok(config)
}

fn show_config(path: &Path, full: bool, output: &Output) -> Result<()> {
    if !path.exists() {
        output.warn(format!("Configuration file not found at: {}", path.display()));
        return Ok(());
    }
    let mut config = read_config(path)?;
    if !full {
        config.api.access_token = config.api.access_token.as_deref().map(mask_string);
    }

    match output.format() {
        OutputFormat::Human => {
            if output.is_quiet() {
                return Ok(());
            }
            println!("\n{}", "Configuration".bright_cyan().bold());

            let mut info = styled_table();
            info.set_header(vec![
                Cell::new("Config File").add_attribute(comfy_table::Attribute::Bold),
                Cell::new(path.display().to_string()),
            ]);
            info.add_row(vec!["API".to_string(), config.api.base_url.clone()]);
            info.add_row(vec!["Timeout".to_string(), format!("{}s", config.api.timeout_seconds)]);
            info.add_row(vec![
                "Access token".to_string(),
                config.api.access_token.clone().unwrap_or_else(|| "<not set>".to_string()),
            ]);
            info.add_row(vec![
                "Lookup cache".to_string(),
                format!(
                    "{} entries, {}s",
                    config.cache.lookup_max_entries, config.cache.lookup_ttl_seconds
                ),
            ]);
            info.add_row(vec!["Input cache".to_string(), format!("{}s", config.cache.input_ttl_seconds)]);
            output.table(&info);

            let mut tasks = styled_table();
            tasks.set_header(vec!["Task", "Inputs", "Lookup", "Clean target"]);
            for task in &config.tasks {
                let inputs: Vec<String> = task.inputs.iter().map(describe_input).collect();
                let lookup = task
                    .lookup
                    .map(|k| format!("{:?}", k).to_lowercase())
                    .unwrap_or_else(|| "-".to_string());
                let clean = task
                    .clean_target
                    .as_ref()
                    .filter(|c| c.is_enabled())
                    .map(|c| format!("{} ({})", c.location, c.remove))
                    .unwrap_or_else(|| "-".to_string());
                tasks.add_row(vec![task.name.clone(), inputs.join("\n"), lookup, clean]);
            }
            output.table(&tasks);
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            output.json(&serde_json::to_value(&config)?);
        }
    }
    Ok(())
}

fn describe_input(input: &InputConfig) -> String {
    format!("{}: {}", input.name(), input.targets().join(", "))
}

fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}
