use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::database::{DatabaseConn, SchemaManager, SchemaStatus, SessionOptions};

/// Value of `database_path` that keeps the registry in memory
pub const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Serialize)]
pub struct PatregConfig {
    /// Path to the directory holding the registry's data
    pub data_dir: String,

    /// Database file, or `:memory:`
    pub database_path: String,

    /// Default page size for listings and the query console
    pub page_size: u32,

    /// Address the WebSocket server binds to
    pub server_address: String,

    /// Port the WebSocket server binds to
    pub server_port: u16,
}

const EMPTY_CONFIG: &str = r#"### patreg configuration file

### directory for registry data
# data_dir = "~/.patreg"

### database file; ":memory:" keeps the registry in memory
# database_path = "~/.patreg/patreg.sqlite3"

### default page size for listings and the query console
# page_size = 10

### WebSocket server
# server_address = "127.0.0.1"
# server_port = 8080
"#;

fn home_dir_string() -> String {
    dirs::home_dir()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string())
}

fn default_database_path(data_dir: &str) -> String {
    format!("{}/patreg.sqlite3", data_dir.trim_end_matches('/'))
}

impl Default for PatregConfig {
    fn default() -> Self {
        let data_dir = format!("{}/.patreg", home_dir_string());
        Self {
            database_path: default_database_path(&data_dir),
            data_dir,
            page_size: 10,
            server_address: "127.0.0.1".to_string(),
            server_port: 8080,
        }
    }
}

impl PatregConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<PatregConfig> {
        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let patreg_dir = format!("{}/.patreg", home_dir_string());
                std::fs::create_dir_all(patreg_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create patreg directory: {}", e))?;
                let p = Self::config_file_path();
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // E.g., `PATREG_DATABASE_PATH=:memory: patreg list` runs against an empty registry
        builder = builder.add_source(config::Environment::with_prefix("PATREG"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<PatregConfig> {
        let defaults = PatregConfig::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => defaults.data_dir,
        };

        let database_path = match config.get("database_path") {
            Some(p) if p == IN_MEMORY => IN_MEMORY.to_string(),
            Some(p) => expand_home(p),
            None => default_database_path(&data_dir),
        };

        let page_size = match config.get("page_size") {
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("Invalid page_size '{}'", s))?,
            None => defaults.page_size,
        };

        let server_port = match config.get("server_port") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|e| anyhow!("Invalid server_port '{}': {}", s, e))?,
            None => defaults.server_port,
        };

        Ok(PatregConfig {
            data_dir,
            database_path,
            page_size,
            server_address: config
                .get("server_address")
                .cloned()
                .unwrap_or(defaults.server_address),
            server_port,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == IN_MEMORY
    }

    /// Session options for this configuration
    pub fn session_options(&self) -> SessionOptions {
        if self.is_in_memory() {
            SessionOptions::in_memory()
        } else {
            SessionOptions::at_path(PathBuf::from(&self.database_path))
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Database Path:      {}", self.database_path),
            format!("Page Size:          {}", self.page_size),
            format!(
                "Server Address:     {}:{}",
                self.server_address, self.server_port
            ),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        format!("{}/.patreg/patreg.toml", home_dir_string())
    }
}

fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home_dir_string(), rest),
        None => path.to_string(),
    }
}

// =============================================================================
// Database info (used by the `config` command)
// =============================================================================

/// Information about the registry database file
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub schema_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_count: Option<u64>,
}

/// Inspect the configured database without creating it
pub fn get_database_info(config: &PatregConfig) -> DatabaseInfo {
    let path = config.database_path.clone();
    if config.is_in_memory() || !Path::new(&path).exists() {
        return DatabaseInfo {
            exists: false,
            path,
            size_bytes: None,
            schema_initialized: false,
            patient_count: None,
        };
    }

    let size_bytes = std::fs::metadata(&path).ok().map(|m| m.len());
    let (schema_initialized, patient_count) = match DatabaseConn::open_path(&path) {
        Ok(db) => {
            let initialized = matches!(
                SchemaManager::new(&db.conn).check_status(),
                Ok(SchemaStatus::Current)
            );
            let count = if initialized {
                db.conn
                    .query_row("SELECT COUNT(*) FROM patients", [], |row| {
                        row.get::<_, i64>(0)
                    })
                    .ok()
                    .map(|n| n as u64)
            } else {
                None
            };
            (initialized, count)
        }
        Err(_) => (false, None),
    };

    DatabaseInfo {
        path,
        exists: true,
        size_bytes,
        schema_initialized,
        patient_count,
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
