pub mod config;
pub mod edit;
pub mod export;
pub mod list;
pub mod query;
pub mod register;
pub mod search;
pub mod serve;
pub mod show;
pub mod stats;

use std::fmt::Display;
use std::sync::Arc;

use patreg::lens::utils::{render_records, render_rows, render_value, OutputFormat};
use patreg::{ChangeNotifier, InProcessBus, PatregConfig, Row, SessionManager};
use serde::Serialize;

/// What a one-shot command needs to reach the registry
pub(crate) struct Registry {
    pub sessions: SessionManager,
    pub notifier: ChangeNotifier,
    pub page_size: u32,
}

impl Registry {
    pub fn open(config: &PatregConfig) -> Self {
        Self {
            sessions: SessionManager::new(config.session_options()),
            notifier: ChangeNotifier::new(Arc::new(InProcessBus::default())),
            page_size: config.page_size,
        }
    }
}

/// Print the error and exit non-zero
pub(crate) fn fail(err: impl Display) -> ! {
    eprintln!("ERROR: {}", err);
    std::process::exit(1);
}

pub(crate) fn print_value<T: Serialize>(value: &T, format: OutputFormat) {
    println!("{}", render_value(value, format));
}

pub(crate) fn print_records<T: Serialize>(records: &[T], format: OutputFormat) {
    if records.is_empty() && !format.is_json() {
        println!("(no rows)");
        return;
    }
    println!("{}", render_records(records, format));
}

pub(crate) fn print_rows(columns: &[String], rows: &[Row], format: OutputFormat) {
    if rows.is_empty() && !format.is_json() {
        println!("(no rows)");
        return;
    }
    println!("{}", render_rows(columns, rows, format));
}
