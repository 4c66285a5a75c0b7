use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// Connection settings shared by every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Passed through as a bearer token when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_lookup_ttl_seconds")]
    pub lookup_ttl_seconds: u64,
    #[serde(default = "default_lookup_max_entries")]
    pub lookup_max_entries: u64,
    #[serde(default = "default_input_ttl_seconds")]
    pub input_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    /// Attach lazy Seplis lookups to every entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<LookupKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_target: Option<CleanTargetConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    Series,
    Movie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Movies,
    Series,
}

/// Where a task gets its entries from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputConfig {
    /// Arbitrary list endpoints, e.g. `/2/users/1/movies-stared`
    SeplisList { kind: ListKind, urls: Vec<String> },
    SeplisSeriesFollowing { usernames: Vec<String> },
    SeplisMoviesStared { usernames: Vec<String> },
    SeplisSeriesFollowingMissingEpisodes { play_servers: Vec<String> },
}

impl InputConfig {
    pub fn name(&self) -> &'static str {
        match self {
            InputConfig::SeplisList { .. } => "seplis_list",
            InputConfig::SeplisSeriesFollowing { .. } => "seplis_series_following",
            InputConfig::SeplisMoviesStared { .. } => "seplis_movies_stared",
            InputConfig::SeplisSeriesFollowingMissingEpisodes { .. } => {
                "seplis_series_following_missing_episodes"
            }
        }
    }

    /// The configured urls, usernames or play server ids
    pub fn targets(&self) -> &[String] {
        match self {
            InputConfig::SeplisList { urls, .. } => urls,
            InputConfig::SeplisSeriesFollowing { usernames } => usernames,
            InputConfig::SeplisMoviesStared { usernames } => usernames,
            InputConfig::SeplisSeriesFollowingMissingEpisodes { play_servers } => play_servers,
        }
    }

    /// Stable key identifying this input and its configuration
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{}:{:?}", self.name(), self.targets()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanTargetConfig {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remove: String,
}

impl CleanTargetConfig {
    pub fn is_enabled(&self) -> bool {
        !self.location.is_empty() && !self.remove.is_empty()
    }
}

fn default_base_url() -> String {
    "https://api.seplis.net".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_lookup_ttl_seconds() -> u64 {
    3600 // 1 hour
}

fn default_lookup_max_entries() -> u64 {
    10_000
}

fn default_input_ttl_seconds() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            access_token: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lookup_ttl_seconds: default_lookup_ttl_seconds(),
            lookup_max_entries: default_lookup_max_entries(),
            input_ttl_seconds: default_input_ttl_seconds(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.base_url.is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if self.cache.lookup_max_entries == 0 {
            anyhow::bail!("cache.lookup_max_entries must be greater than zero");
        }

        let mut names = HashSet::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                anyhow::bail!("Every task needs a name");
            }
            if !names.insert(task.name.as_str()) {
                anyhow::bail!("Duplicate task name: {}", task.name);
            }
            for input in &task.inputs {
                if input.targets().iter().all(|t| t.trim().is_empty()) {
                    anyhow::bail!("Task '{}': {} needs at least one entry", task.name, input.name());
                }
            }
            if let Some(clean) = &task.clean_target {
                if clean.location.is_empty() != clean.remove.is_empty() {
                    anyhow::bail!("Task '{}': clean_target needs both location and remove", task.name);
                }
            }
        }
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.name.clone()).collect()
    }
}
