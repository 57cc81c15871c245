use patreg::lens::utils::OutputFormat;
use patreg::{format_size, get_database_info, PatregConfig};
use serde_json::json;

use super::print_value;

pub fn run(config: &PatregConfig, output_format: OutputFormat) {
    let database = get_database_info(config);
    let config_file = PatregConfig::config_file_path();

    if output_format.is_json() {
        print_value(
            &json!({
                "config_file": config_file,
                "config": config,
                "database": database,
            }),
            output_format,
        );
        return;
    }

    println!("Configuration File: {}", config_file);
    println!("{}", config.summary());
    println!();
    if config.is_in_memory() {
        println!("Database:           in memory (discarded on exit)");
        return;
    }
    if !database.exists {
        println!("Database:           not created yet");
        return;
    }
    println!(
        "Database Size:      {}",
        database.size_bytes.map(format_size).unwrap_or_default()
    );
    println!(
        "Schema:             {}",
        if database.schema_initialized {
            "initialized"
        } else {
            "not initialized"
        }
    );
    if let Some(count) = database.patient_count {
        println!("Patients:           {}", count);
    }
}
