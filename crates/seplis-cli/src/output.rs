use clap::ValueEnum;
use comfy_table::{Cell, Table};
use owo_colors::OwoColorize;
use seplis_models::Entry;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        self.message("success", msg.as_ref(), |m| println!("{} {}", "✓".green(), m));
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.message("info", msg.as_ref(), |m| println!("{}", m));
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.message("warning", msg.as_ref(), |m| println!("{} {}", "⚠".yellow(), m));
    }

    fn message(&self, kind: &str, msg: &str, human: impl FnOnce(&str)) {
        if self.quiet {
            return;
        }
        match self.format {
            OutputFormat::Human => human(msg),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({"type": kind, "message": msg}));
            }
        }
    }

    pub fn json(&self, data: &serde_json::Value) {
        if self.quiet && self.format != OutputFormat::Human {
            return;
        }
        self.print_json(data);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(data).unwrap_or_default()),
            OutputFormat::JsonPretty => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default())
            }
            OutputFormat::Human => println!("{}", data),
        }
    }

    pub fn table(&self, table: &Table) {
        if !self.quiet {
            println!("{}", table);
        }
    }
}

pub fn styled_table() -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table
}

fn header(text: &str) -> Cell {
    Cell::new(text)
        .fg(comfy_table::Color::Cyan)
        .add_attribute(comfy_table::Attribute::Bold)
}

/// One row per entry: title, url and the Seplis id
pub fn entries_table(entries: &[Entry]) -> Table {
    let mut table = styled_table();
    table.set_header(vec![header("Title"), header("Seplis id"), header("URL")]);
    for entry in entries {
        let id = entry
            .get_eager("seplis_movie_id")
            .or_else(|| entry.get_eager("seplis_series_id"))
            .map(|v| v.to_string())
            .unwrap_or_default();
        table.add_row(vec![
            entry.title().unwrap_or_default().to_string(),
            id,
            entry.get_str("url").unwrap_or_default().to_string(),
        ]);
    }
    table
}

/// Every concrete field of one entry
pub fn fields_table(entry: &Entry) -> Table {
    let mut table = styled_table();
    table.set_header(vec![header("Field"), header("Value")]);
    for (name, value) in entry.eager_fields() {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    table
}
