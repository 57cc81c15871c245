//! Output helpers shared by the lenses
//!
//! Query results are dynamic (column names are only known at run time), so
//! rendering works on `(columns, rows)` pairs instead of typed records. Typed
//! results go through [`render_records`], which flattens each record into a
//! JSON object first.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "display")]
use crate::database::Row;

/// Longest cell shown in table output before truncation
pub const DEFAULT_CELL_MAX_LEN: usize = 40;

/// Output format for every command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line)
    JsonLine,
    /// Pipe-separated values with header
    Psv,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    pub fn all_names() -> &'static [&'static str] {
        &[
            "table",
            "markdown",
            "json",
            "json-pretty",
            "json-line",
            "psv",
        ]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
            Self::Psv => write!(f, "psv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            "psv" | "pipe" => Ok(Self::Psv),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Truncate a string to `max_len` characters, ending in "..." when cut
///
/// ```
/// use patreg::lens::utils::truncate_name;
///
/// assert_eq!(truncate_name("Short", 20), "Short");
/// assert_eq!(truncate_name("123 Long Street, Springfield", 20), "123 Long Street, ...");
/// ```
pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        name.to_string()
    } else {
        let truncated: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Plain text for one cell; NULL renders empty
pub fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render rows with the given column order
#[cfg(feature = "display")]
pub fn render_rows(columns: &[String], rows: &[Row], format: OutputFormat) -> String {
    use tabled::builder::Builder;
    use tabled::settings::Style;

    let cells = |row: &Row| -> Vec<String> {
        columns
            .iter()
            .map(|column| cell_text(row.get(column).unwrap_or(&JsonValue::Null)))
            .collect()
    };

    match format {
        OutputFormat::Table | OutputFormat::Markdown => {
            let mut builder = Builder::default();
            builder.push_record(columns.iter().cloned());
            for row in rows {
                builder.push_record(
                    cells(row)
                        .iter()
                        .map(|cell| truncate_name(cell, DEFAULT_CELL_MAX_LEN)),
                );
            }
            let mut table = builder.build();
            if format == OutputFormat::Markdown {
                table.with(Style::markdown());
            } else {
                table.with(Style::rounded());
            }
            table.to_string()
        }
        OutputFormat::Psv => {
            let mut lines = vec![columns.join("|")];
            lines.extend(rows.iter().map(|row| cells(row).join("|")));
            lines.join("\n")
        }
        OutputFormat::Json => serde_json::to_string(rows).unwrap_or_default(),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(rows).unwrap_or_default(),
        OutputFormat::JsonLine => rows
            .iter()
            .map(|row| serde_json::to_string(row).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Render typed records, using their field names as columns
#[cfg(feature = "display")]
pub fn render_records<T: Serialize>(records: &[T], format: OutputFormat) -> String {
    let rows: Vec<Row> = records
        .iter()
        .filter_map(|record| match serde_json::to_value(record) {
            Ok(JsonValue::Object(map)) => Some(map),
            _ => None,
        })
        .collect();
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();
    render_rows(&columns, &rows, format)
}

/// Render a single value, as JSON for JSON formats and as a two-column
/// field/value table otherwise
#[cfg(feature = "display")]
pub fn render_value<T: Serialize>(value: &T, format: OutputFormat) -> String {
    let json = serde_json::to_value(value).unwrap_or_default();
    match format {
        OutputFormat::Json | OutputFormat::JsonLine => json.to_string(),
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&json).unwrap_or_default(),
        _ => {
            let JsonValue::Object(map) = json else {
                return cell_text(&json);
            };
            let columns = vec!["field".to_string(), "value".to_string()];
            let rows: Vec<Row> = map
                .into_iter()
                .map(|(field, value)| {
                    let mut row = Row::new();
                    row.insert("field".to_string(), JsonValue::String(field));
                    row.insert("value".to_string(), value);
                    row
                })
                .collect();
            render_rows(&columns, &rows, format)
        }
    }
}
