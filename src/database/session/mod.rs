//! Lazily initialized database session
//!
//! A [`SessionManager`] owns at most one live [`Session`]. The first call to
//! [`SessionManager::acquire`] opens the database and runs the schema
//! bootstrap; every later call returns the same handle. Callers that arrive
//! while the bootstrap is still running wait for it and receive the same
//! handle, and no caller ever sees a handle whose bootstrap has not finished.
//!
//! If the bootstrap fails the error goes to the caller that ran it, the
//! manager drops back to [`SessionState::Uninitialized`], and the next
//! `acquire` starts over.
//!
//! ```text
//! UNINITIALIZED -> INITIALIZING -> READY
//!                       |
//!                       +-> FAILED -> UNINITIALIZED
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::database::core::{DatabaseConn, QueryResult, SchemaManager, StatementInfo};

/// A bound statement parameter
pub type SqlValue = rusqlite::types::Value;

/// Constructor for the underlying connection
///
/// Swappable so that tests can count constructions or simulate failures.
pub type Opener = Arc<dyn Fn(&SessionOptions) -> anyhow::Result<DatabaseConn> + Send + Sync>;

/// Errors raised by the session layer
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("database initialization failed: {0}")]
    Initialization(String),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("database task failed: {0}")]
    Task(String),

    /// A row the statement should have produced or left in place is absent
    #[error("expected row missing: {0}")]
    MissingRow(String),

    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Observable lifecycle of a [`SessionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
        };
        write!(f, "{}", name)
    }
}

/// Where the session's database lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Database file; `None` keeps the registry in memory
    pub database_path: Option<PathBuf>,
}

impl SessionOptions {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
        }
    }

    /// Human readable location, for logs and `system.info`
    pub fn location(&self) -> String {
        match &self.database_path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

fn default_opener(options: &SessionOptions) -> anyhow::Result<DatabaseConn> {
    match &options.database_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            DatabaseConn::open_path(&path.to_string_lossy())
        }
        None => DatabaseConn::open_in_memory(),
    }
}

/// Owner of the single lazily created [`Session`]
pub struct SessionManager {
    options: SessionOptions,
    opener: Opener,
    session: OnceCell<Arc<Session>>,
    initializing: AtomicBool,
}

impl SessionManager {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_opener(options, Arc::new(default_opener))
    }

    pub fn in_memory() -> Self {
        Self::new(SessionOptions::in_memory())
    }

    pub fn with_opener(options: SessionOptions, opener: Opener) -> Self {
        Self {
            options,
            opener,
            session: OnceCell::new(),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        if self.session.initialized() {
            SessionState::Ready
        } else if self.initializing.load(Ordering::Acquire) {
            SessionState::Initializing
        } else {
            SessionState::Uninitialized
        }
    }

    /// Return the shared session, initializing it on first use.
    pub async fn acquire(&self) -> Result<Arc<Session>, SessionError> {
        if let Some(session) = self.session.get() {
            return Ok(Arc::clone(session));
        }

        let session = self.session.get_or_try_init(|| self.initialize()).await?;
        Ok(Arc::clone(session))
    }

    /// Acquire the session and run one statement on it.
    pub async fn query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, SessionError> {
        self.acquire().await?.query(sql, params).await
    }

    async fn initialize(&self) -> Result<Arc<Session>, SessionError> {
        let _flag = InitializingFlag::raise(&self.initializing);
        debug!("opening registry database at {}", self.options.location());

        let opener = Arc::clone(&self.opener);
        let options = self.options.clone();
        let opened = tokio::task::spawn_blocking(move || -> anyhow::Result<DatabaseConn> {
            let db = opener(&options)?;
            SchemaManager::new(&db.conn).bootstrap()?;
            Ok(db)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?;

        match opened {
            Ok(db) => {
                info!("registry database ready at {}", self.options.location());
                Ok(Arc::new(Session::new(db)))
            }
            Err(e) => {
                warn!("registry database initialization failed: {:#}", e);
                Err(SessionError::Initialization(format!("{:#}", e)))
            }
        }
    }
}

/// Marks an initialization as in flight until dropped
struct InitializingFlag<'a>(&'a AtomicBool);

impl<'a> InitializingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A ready, bootstrapped handle to the registry database
///
/// Statements run on the blocking pool; the connection mutex keeps them in
/// issue order.
pub struct Session {
    db: Arc<Mutex<DatabaseConn>>,
}

impl Session {
    fn new(db: DatabaseConn) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run a statement with positional `$N` parameters.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, SessionError> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_conn(move |db| db.run(&sql, &params)).await
    }

    /// Report a statement's column count and whether it only reads.
    pub async fn describe(&self, sql: &str) -> Result<StatementInfo, SessionError> {
        let sql = sql.to_string();
        self.with_conn(move |db| db.describe(&sql)).await
    }

    /// Run a closure against the connection on the blocking pool.
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&DatabaseConn) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| SessionError::Poisoned)?;
            f(&guard).map_err(SessionError::from)
        })
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::SchemaStatus;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_opener(count: Arc<AtomicUsize>, delay: Duration) -> Opener {
        Arc::new(move |options: &SessionOptions| {
            count.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(delay);
            default_opener(options)
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_shares_one_session() {
        let opened = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(SessionManager::with_opener(
            SessionOptions::in_memory(),
            counting_opener(opened.clone(), Duration::from_millis(100)),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.acquire().await }));
        }

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], session));
        }

        let status = sessions[0]
            .with_conn(|db| {
                Ok(SchemaManager::new(&db.conn)
                    .check_status()
                    .map_err(|_| rusqlite::Error::InvalidQuery)?)
            })
            .await
            .unwrap();
        assert_eq!(status, SchemaStatus::Current);
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_later_acquire_reuses_session() {
        let opened = Arc::new(AtomicUsize::new(0));
        let manager = SessionManager::with_opener(
            SessionOptions::in_memory(),
            counting_opener(opened.clone(), Duration::ZERO),
        );

        assert_eq!(manager.state(), SessionState::Uninitialized);
        let first = manager.acquire().await.unwrap();
        let second = manager.acquire().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let opener: Opener = Arc::new(move |options: &SessionOptions| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("engine unavailable");
            }
            default_opener(options)
        });
        let manager = SessionManager::with_opener(SessionOptions::in_memory(), opener);

        match manager.acquire().await {
            Err(SessionError::Initialization(msg)) => assert!(msg.contains("engine unavailable")),
            other => panic!("expected initialization error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(manager.state(), SessionState::Uninitialized);

        let session = manager.acquire().await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(), SessionState::Ready);

        let result = session
            .query("SELECT COUNT(*) AS count FROM patients", &[])
            .await
            .unwrap();
        assert_eq!(result.rows[0]["count"], serde_json::json!(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_reports_initializing() {
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let opener: Opener = Arc::new(move |options: &SessionOptions| {
            if let Ok(gate) = gate.lock() {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }
            default_opener(options)
        });
        let manager = Arc::new(SessionManager::with_opener(
            SessionOptions::in_memory(),
            opener,
        ));

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await.map(|_| ()) })
        };

        let mut seen = false;
        for _ in 0..100 {
            if manager.state() == SessionState::Initializing {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(seen);

        release.send(()).unwrap();
        pending.await.unwrap().unwrap();
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_query_initializes_transparently() {
        let manager = SessionManager::in_memory();
        let result = manager
            .query(
                "INSERT INTO patients (first_name, last_name, date_of_birth, gender) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
                &[
                    SqlValue::from("Ada".to_string()),
                    SqlValue::from("Lovelace".to_string()),
                    SqlValue::from("1815-12-10".to_string()),
                    SqlValue::from("female".to_string()),
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id"]);
        assert_eq!(result.rows[0]["id"], serde_json::json!(1));
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_query_error_keeps_session() {
        let manager = SessionManager::in_memory();
        let err = manager.query("SELECT * FROM missing_table", &[]).await;
        assert!(matches!(err, Err(SessionError::Query(_))));
        assert_eq!(manager.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_file_backed_bootstrap_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("registry.sqlite3");

        let first = SessionManager::new(SessionOptions::at_path(&path));
        first
            .query(
                "INSERT INTO patients (first_name, last_name, date_of_birth, gender) \
                 VALUES ('Grace', 'Hopper', '1906-12-09', 'female')",
                &[],
            )
            .await
            .unwrap();

        let second = SessionManager::new(SessionOptions::at_path(&path));
        let objects = second
            .acquire()
            .await
            .unwrap()
            .with_conn(|db| {
                SchemaManager::new(&db.conn)
                    .schema_objects()
                    .map_err(|_| rusqlite::Error::InvalidQuery)
            })
            .await
            .unwrap();
        assert_eq!(objects.len(), 4);

        let count = second
            .query("SELECT COUNT(*) AS count FROM patients", &[])
            .await
            .unwrap();
        assert_eq!(count.rows[0]["count"], serde_json::json!(1));
    }
}
