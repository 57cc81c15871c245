//! Query console lens
//!
//! Runs arbitrary statements typed by the user. Read-only statements that
//! return rows are paged by wrapping them as a subquery:
//!
//! ```text
//! SELECT COUNT(*) AS count FROM (<stmt>) AS q
//! SELECT * FROM (<stmt>) AS q LIMIT $n+1 OFFSET $n+2
//! ```
//!
//! where `$1..$n` are the statement's own parameters. Anything else runs as
//! written; a statement that changes data is announced to other contexts.

pub mod args;
mod watch;

pub use args::{json_to_sql, parse_param_arg, QueryArgs, DEFAULT_QUERY, MAX_PAGE_SIZE};
pub use watch::QueryWatch;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::database::registry::count_of;
use crate::database::{Pagination, Row, SessionManager, SqlValue, StatementInfo};
use crate::lens::error::{RegistryError, RegistryResult};
use crate::notify::ChangeNotifier;

/// Result of one console execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    /// Statement as executed (trimmed, without the paging wrapper)
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Rows changed by a non-returning statement
    pub rows_affected: usize,
    /// Present when the statement was paged
    pub pagination: Option<Pagination>,
    /// Whether the statement may have changed data
    pub mutated: bool,
}

/// How a statement will be run by the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plan {
    Paged,
    Direct { mutates: bool },
}

impl Plan {
    pub(crate) fn for_statement(sql: &str, info: StatementInfo) -> Self {
        if info.readonly && info.column_count > 0 && is_wrappable(sql) {
            Plan::Paged
        } else {
            Plan::Direct {
                mutates: !info.readonly,
            }
        }
    }
}

/// Whether the statement can appear inside `FROM ( ... )`
fn is_wrappable(sql: &str) -> bool {
    let keyword: String = strip_leading_comments(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(keyword.as_str(), "select" | "with" | "values")
}

fn strip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map(|(_, tail)| tail).unwrap_or("");
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map(|(_, tail)| tail).unwrap_or("");
        } else {
            return sql;
        }
    }
}

pub struct QueryLens<'a> {
    sessions: &'a SessionManager,
    notifier: &'a ChangeNotifier,
}

impl<'a> QueryLens<'a> {
    pub fn new(sessions: &'a SessionManager, notifier: &'a ChangeNotifier) -> Self {
        Self { sessions, notifier }
    }

    /// Run the statement, paging it when it only reads
    pub async fn execute(&self, args: &QueryArgs, default_page_size: u32) -> RegistryResult<QueryPage> {
        let sql = args.statement();
        if sql.is_empty() {
            return Err(RegistryError::InvalidParams("query is empty".to_string()));
        }

        let params = args.bound_params();
        let session = self.sessions.acquire().await?;
        let info = session.describe(sql).await?;

        match Plan::for_statement(sql, info) {
            Plan::Paged => {
                let (page, page_size) = args.normalized_page(default_page_size);

                let count_sql = format!("SELECT COUNT(*) AS count FROM (\n{}\n) AS q", sql);
                let total = count_of(&session.query(&count_sql, &params).await?);
                let pagination = Pagination::new(page, page_size, total);

                let mut paged_params = params.clone();
                let limit_idx = paged_params.len() + 1;
                paged_params.push(SqlValue::from(page_size as i64));
                paged_params.push(SqlValue::from(pagination.offset() as i64));
                let page_sql = format!(
                    "SELECT * FROM (\n{}\n) AS q LIMIT ${} OFFSET ${}",
                    sql,
                    limit_idx,
                    limit_idx + 1
                );
                let result = session.query(&page_sql, &paged_params).await?;
                debug!(
                    "query page {}/{} returned {} row(s)",
                    page,
                    pagination.total_pages,
                    result.rows.len()
                );

                Ok(QueryPage {
                    sql: sql.to_string(),
                    columns: result.columns,
                    rows: result.rows,
                    rows_affected: 0,
                    pagination: Some(pagination),
                    mutated: false,
                })
            }
            Plan::Direct { mutates } => {
                let result = session.query(sql, &params).await?;
                if mutates {
                    debug!("statement changed {} row(s)", result.rows_affected);
                    self.notifier.notify_data_changed();
                }
                Ok(QueryPage {
                    sql: sql.to_string(),
                    columns: result.columns,
                    rows: result.rows,
                    rows_affected: result.rows_affected,
                    pagination: None,
                    mutated: mutates,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{BroadcastChannel, InProcessBus};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Console {
        sessions: SessionManager,
        notifier: ChangeNotifier,
        peer: ChangeNotifier,
    }

    fn console() -> Console {
        let bus: Arc<dyn BroadcastChannel> = Arc::new(InProcessBus::default());
        Console {
            sessions: SessionManager::in_memory(),
            notifier: ChangeNotifier::new(bus.clone()),
            peer: ChangeNotifier::new(bus),
        }
    }

    async fn seed(c: &Console, n: usize) {
        let lens = QueryLens::new(&c.sessions, &c.notifier);
        for i in 0..n {
            lens.execute(
                &QueryArgs::new(
                    "INSERT INTO patients (first_name, last_name, date_of_birth, gender) \
                     VALUES ($1, 'Test', '1990-01-01', 'other')",
                )
                .with_params(vec![json!(format!("P{:02}", i))]),
                10,
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_paging_boundaries() {
        let c = console();
        seed(&c, 25).await;
        let lens = QueryLens::new(&c.sessions, &c.notifier);

        let mut sizes = Vec::new();
        for page in 1..=3 {
            let args = QueryArgs::new("SELECT id, first_name FROM patients ORDER BY id")
                .with_page(page, 10);
            let result = lens.execute(&args, 10).await.unwrap();
            let pagination = result.pagination.unwrap();
            assert_eq!(pagination.total_records, 25);
            assert_eq!(pagination.total_pages, 3);
            assert_eq!(result.columns, vec!["id", "first_name"]);
            sizes.push(result.rows.len());
        }
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_paging_with_user_parameters() {
        let c = console();
        seed(&c, 12).await;
        let lens = QueryLens::new(&c.sessions, &c.notifier);

        let args = QueryArgs::new("SELECT first_name FROM patients WHERE id > $1 ORDER BY id;")
            .with_params(vec![json!(2)])
            .with_page(2, 4);
        let result = lens.execute(&args, 10).await.unwrap();

        assert_eq!(result.pagination.unwrap().total_records, 10);
        assert_eq!(result.rows.len(), 4);
        assert_eq!(result.rows[0]["first_name"], json!("P06"));
    }

    #[tokio::test]
    async fn test_statement_with_own_limit() {
        let c = console();
        seed(&c, 15).await;
        let lens = QueryLens::new(&c.sessions, &c.notifier);

        let result = lens
            .execute(&QueryArgs::new(DEFAULT_QUERY), 10)
            .await
            .unwrap();
        assert_eq!(result.pagination.unwrap().total_records, 10);
        assert_eq!(result.rows.len(), 10);
        assert_eq!(result.rows[0]["first_name"], json!("P14"));
    }

    #[tokio::test]
    async fn test_mutation_notifies_peers() {
        let c = console();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let _sub = c.peer.on_data_changed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        seed(&c, 1).await;
        let lens = QueryLens::new(&c.sessions, &c.notifier);
        let update = lens
            .execute(
                &QueryArgs::new("UPDATE patients SET address = $1").with_params(vec![json!("x")]),
                10,
            )
            .await
            .unwrap();
        assert!(update.mutated);
        assert_eq!(update.rows_affected, 1);
        assert!(update.pagination.is_none());

        lens.execute(&QueryArgs::new("SELECT * FROM patients"), 10)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pragma_runs_unpaged() {
        let c = console();
        let lens = QueryLens::new(&c.sessions, &c.notifier);
        let result = lens
            .execute(&QueryArgs::new("PRAGMA table_info(patients)"), 10)
            .await
            .unwrap();
        assert!(result.pagination.is_none());
        assert_eq!(result.rows.len(), 10);
    }

    #[tokio::test]
    async fn test_errors() {
        let c = console();
        let lens = QueryLens::new(&c.sessions, &c.notifier);

        let empty = lens.execute(&QueryArgs::new("  ;"), 10).await;
        assert!(matches!(empty, Err(RegistryError::InvalidParams(_))));

        let bad = lens.execute(&QueryArgs::new("SELEC oops"), 10).await;
        assert!(matches!(bad, Err(RegistryError::Session(_))));
    }

    #[tokio::test]
    async fn test_console_writes_keep_typed_reads_working() {
        use crate::lens::dashboard::DashboardLens;
        use crate::lens::patient::{PatientLens, PatientListArgs};

        let c = console();
        let lens = QueryLens::new(&c.sessions, &c.notifier);
        for (dob, gender) in [("1815-12-10", "Female"), ("10/12/1815", "female")] {
            let rejected = lens
                .execute(
                    &QueryArgs::new(
                        "INSERT INTO patients (first_name, last_name, date_of_birth, gender) \
                         VALUES ('Ada', 'Lovelace', $1, $2)",
                    )
                    .with_params(vec![json!(dob), json!(gender)]),
                    10,
                )
                .await;
            assert!(matches!(rejected, Err(RegistryError::Session(_))));
        }
        seed(&c, 2).await;

        let page = PatientLens::new(&c.sessions)
            .list(&PatientListArgs::default(), 10)
            .await
            .unwrap();
        assert_eq!(page.pagination.total_records, 2);
        let id = page.patients[0].id;
        assert!(PatientLens::new(&c.sessions).get(id).await.unwrap().is_some());
        let stats = DashboardLens::new(&c.sessions).stats().await.unwrap();
        assert_eq!(stats.recent_patients.len(), 2);
    }

    #[tokio::test]
    async fn test_trailing_semicolon_and_comment() {
        let c = console();
        seed(&c, 3).await;
        let lens = QueryLens::new(&c.sessions, &c.notifier);

        let result = lens
            .execute(&QueryArgs::new("SELECT * FROM patients; -- all rows"), 10)
            .await
            .unwrap();
        assert_eq!(result.sql, "SELECT * FROM patients");
        assert_eq!(result.pagination.unwrap().total_records, 3);
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn test_is_wrappable() {
        assert!(is_wrappable("select 1"));
        assert!(is_wrappable("-- note\n  WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(is_wrappable("/* c */ VALUES (1)"));
        assert!(!is_wrappable("PRAGMA table_info(patients)"));
        assert!(!is_wrappable("EXPLAIN SELECT 1"));
    }
}
