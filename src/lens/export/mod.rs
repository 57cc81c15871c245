//! Export lens
//!
//! Runs a read query without paging and renders every row as CSV or JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::database::{Row, SessionManager};
use crate::lens::error::{RegistryError, RegistryResult};
use crate::lens::query::QueryArgs;

/// Base name of exported files
pub const EXPORT_BASENAME: &str = "patients_export";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn default_filename(&self) -> String {
        format!("{}.{}", EXPORT_BASENAME, self.extension())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("Unknown export format '{}'. Valid formats: csv, json", other)),
        }
    }
}

/// Arguments for an export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct ExportArgs {
    /// SQL statement to export; use $1, $2, ... for parameters
    #[cfg_attr(feature = "cli", clap(default_value = "SELECT * FROM patients ORDER BY id"))]
    pub sql: String,

    /// Positional parameter value (repeatable, bound in order)
    #[cfg_attr(
        feature = "cli",
        clap(long = "param", value_name = "VALUE", value_parser = crate::lens::query::parse_param_arg)
    )]
    #[serde(default)]
    pub params: Vec<JsonValue>,

    /// File format: csv or json
    #[cfg_attr(
        feature = "cli",
        clap(id = "export_format", long = "as", value_name = "FORMAT", default_value = "csv")
    )]
    #[serde(default)]
    pub format: ExportFormat,
}

/// A rendered export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutput {
    pub filename: String,
    pub format: ExportFormat,
    pub row_count: usize,
    pub content: String,
}

pub struct ExportLens<'a> {
    sessions: &'a SessionManager,
}

impl<'a> ExportLens<'a> {
    pub fn new(sessions: &'a SessionManager) -> Self {
        Self { sessions }
    }

    pub async fn export(&self, args: &ExportArgs) -> RegistryResult<ExportOutput> {
        let query = QueryArgs::new(args.sql.clone()).with_params(args.params.clone());
        let sql = query.statement();
        if sql.is_empty() {
            return Err(RegistryError::InvalidParams("query is empty".to_string()));
        }

        let session = self.sessions.acquire().await?;
        let info = session.describe(sql).await?;
        if !info.readonly || info.column_count == 0 {
            return Err(RegistryError::InvalidParams(
                "only read-only queries that return rows can be exported".to_string(),
            ));
        }

        let result = session.query(sql, &query.bound_params()).await?;
        let content = match args.format {
            ExportFormat::Csv => render_csv(&result.columns, &result.rows)?,
            ExportFormat::Json => render_json(&result.rows)?,
        };
        info!("exported {} row(s) as {}", result.rows.len(), args.format);

        Ok(ExportOutput {
            filename: args.format.default_filename(),
            format: args.format,
            row_count: result.rows.len(),
            content,
        })
    }
}

/// Render rows as CSV with a header row of column names
pub fn render_csv(columns: &[String], rows: &[Row]) -> RegistryResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|column| csv_cell(row.get(column).unwrap_or(&JsonValue::Null))),
        )?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| RegistryError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| RegistryError::Export(e.to_string()))
}

/// Render rows as a pretty-printed JSON array
pub fn render_json(rows: &[Row]) -> RegistryResult<String> {
    serde_json::to_string_pretty(rows).map_err(|e| RegistryError::Export(e.to_string()))
}

fn csv_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
