//! Query console arguments

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::database::{trim_statement, SqlValue};

/// Largest page the console returns
pub const MAX_PAGE_SIZE: u32 = 100;

/// Statement shown when the console opens
pub const DEFAULT_QUERY: &str = "SELECT * FROM patients ORDER BY id DESC LIMIT 10";

/// An ad-hoc statement with its bound parameters and page position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct QueryArgs {
    /// SQL statement; use $1, $2, ... for parameters
    #[cfg_attr(feature = "cli", clap(default_value = DEFAULT_QUERY))]
    pub sql: String,

    /// Positional parameter value (repeatable, bound in order)
    #[cfg_attr(
        feature = "cli",
        clap(long = "param", value_name = "VALUE", value_parser = parse_param_arg)
    )]
    pub params: Vec<JsonValue>,

    /// Page number, starting at 1
    #[cfg_attr(feature = "cli", clap(long, default_value_t = 1))]
    pub page: u32,

    /// Rows per page, 1 to 100 (defaults to the configured page size)
    #[cfg_attr(feature = "cli", clap(long))]
    pub page_size: Option<u32>,
}

impl Default for QueryArgs {
    fn default() -> Self {
        Self {
            sql: DEFAULT_QUERY.to_string(),
            params: Vec::new(),
            page: 1,
            page_size: None,
        }
    }
}

impl QueryArgs {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Vec<JsonValue>) -> Self {
        self.params = params;
        self
    }

    pub fn with_page(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    /// Page and page size after clamping, falling back to `default_size`
    pub fn normalized_page(&self, default_size: u32) -> (u32, u32) {
        let size = self.page_size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE);
        (self.page.max(1), size)
    }

    /// The statement without surrounding whitespace, trailing semicolons or
    /// trailing comments
    pub fn statement(&self) -> &str {
        trim_statement(&self.sql)
    }

    pub fn bound_params(&self) -> Vec<SqlValue> {
        self.params.iter().map(json_to_sql).collect()
    }
}

/// Convert a JSON parameter into a bound SQL value
pub fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        nested => SqlValue::Text(nested.to_string()),
    }
}

/// Parse a command-line parameter: integers and decimals stay numeric,
/// `null` binds NULL, anything else is text
pub fn parse_param_arg(raw: &str) -> Result<JsonValue, String> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(JsonValue::Null);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(JsonValue::from(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Ok(JsonValue::Number(n));
        }
    }
    Ok(JsonValue::String(raw.to_string()))
}
