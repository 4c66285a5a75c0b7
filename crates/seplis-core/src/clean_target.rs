use anyhow::Context;
use regex::{Regex, RegexBuilder};
use seplis_config::CleanTargetConfig;
use seplis_models::Entry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{error, info, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder pattern"));

static UNSAFE_PATH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f]").expect("valid path scrub pattern"));

/// A `{field}` placeholder whose field the entry does not have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError {
    pub field: String,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry has no field '{}'", self.field)
    }
}

impl std::error::Error for RenderError {}

/// Substitute `{field}` placeholders with entry values
///
/// Lazy fields are forced. Regex quantifiers such as `\d{2}` are not
/// placeholders and are left alone. With `escape`, substituted values are
/// regex-escaped so titles like `Example (1999)` match literally.
pub async fn render(template: &str, entry: &mut Entry, escape: bool) -> Result<String, RenderError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = entry
            .get(name.as_str())
            .await
            .ok_or_else(|| RenderError { field: name.as_str().to_string() })?
            .to_string();

        rendered.push_str(&template[last..whole.start()]);
        if escape {
            rendered.push_str(&regex::escape(&value));
        } else {
            rendered.push_str(&value);
        }
        last = whole.end();
    }
    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Strip characters no filesystem accepts in a path (NUL and other controls)
///
/// Separators are kept; entry values rendered into a location may still
/// span directories.
pub fn scrub_path(path: &str) -> String {
    UNSAFE_PATH_CHARS.replace_all(path, "").into_owned()
}

/// Outcome of one clean_target run
#[derive(Debug, Default, Clone)]
pub struct CleanReport {
    /// Files matching some entry's pattern
    pub matched: Vec<PathBuf>,
    pub removed: usize,
    pub failed: usize,
    /// Entries whose templates could not be rendered or whose location is
    /// not a directory
    pub skipped: usize,
}

/// Deletes files belonging to accepted entries from a target directory
pub struct CleanTarget {
    location: String,
    remove: String,
}

impl CleanTarget {
    /// `None` when either template is empty
    pub fn from_config(config: &CleanTargetConfig) -> Option<Self> {
        config.is_enabled().then(|| Self {
            location: config.location.clone(),
            remove: config.remove.clone(),
        })
    }

    /// Clean for every entry
    ///
    /// An invalid `remove` pattern fails the step. Entry level problems and
    /// failed deletes are logged and counted.
    pub async fn run(&self, entries: &mut [Entry], dry_run: bool) -> anyhow::Result<CleanReport> {
        let mut report = CleanReport::default();
        for entry in entries.iter_mut() {
            self.clean_entry(entry, dry_run, &mut report).await?;
        }
        Ok(report)
    }

    async fn clean_entry(&self, entry: &mut Entry, dry_run: bool, report: &mut CleanReport) -> anyhow::Result<()> {
        let rendered = match render(&self.location, entry, false).await {
            Ok(location) => render(&self.remove, entry, true).await.map(|remove| (location, remove)),
            Err(e) => Err(e),
        };
        let (location, remove) = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(title = ?entry.title(), "Path value replacement failed: {}", e);
                report.skipped += 1;
                return Ok(());
            }
        };

        let location = expand_home(&scrub_path(&location));
        if !tokio::fs::metadata(&location).await.map(|m| m.is_dir()).unwrap_or(false) {
            error!(location = %location.display(), "Location is not a directory");
            report.skipped += 1;
            return Ok(());
        }

        let pattern = RegexBuilder::new(&format!("^(?:{})", remove))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid regex `{}`", remove))?;

        let matched = matching_files(&location, &pattern).await?;
        remove_files(matched, dry_run, report).await;
        Ok(())
    }
}

/// Delete each path; a failure is logged and counted, the rest still go
async fn remove_files(paths: Vec<PathBuf>, dry_run: bool, report: &mut CleanReport) {
    for path in paths {
        if dry_run {
            info!(path = %path.display(), "Would clean");
        } else {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Cleaning");
                    report.removed += 1;
                }
                Err(e) => {
                    error!(path = %path.display(), "An error occurred trying to remove file: {}", e);
                    report.failed += 1;
                }
            }
        }
        report.matched.push(path);
    }
}

/// Regular files directly in `dir` whose name matches, sorted by name
async fn matching_files(dir: &Path, pattern: &Regex) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut listing = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    while let Some(item) = listing.next_entry().await? {
        let is_file = item.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        let name = item.file_name();
        if is_file && pattern.is_match(&name.to_string_lossy()) {
            found.push(item.path());
        }
    }
    found.sort();
    Ok(found)
}
