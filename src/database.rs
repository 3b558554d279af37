use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, InterruptHandle, OptionalExtension};

use crate::error::SocietyError;
use crate::schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION};

pub const DB_FILENAME: &str = "societydb.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lowercases text with full Unicode case mapping. SQLite's built-in
/// `LOWER()` only folds ASCII letters.
pub const UNICODE_LOWER: &str = "unicode_lower";

pub type DbPool = Pool<SqliteConnectionManager>;

pub struct Database;

impl Database {
    /// Open a pool over the database file at `db_path`, creating the schema
    /// if the file is new.
    pub fn open_pool(db_path: &Path, pool_size: u32) -> Result<DbPool, SocietyError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Self::register_functions(conn)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
        info!(
            "Database opened at: {} (pool size {})",
            db_path.display(),
            pool.max_size()
        );

        let conn = pool.get()?;
        Self::ensure_schema(&conn)?;

        Ok(pool)
    }

    /// Register the scalar functions the query engine compiles against.
    /// Must run on every connection before it serves a listing.
    pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
        conn.create_scalar_function(
            UNICODE_LOWER,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                Ok(match ctx.get_raw(0) {
                    ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).to_lowercase()),
                    other => Value::from(other),
                })
            },
        )
    }

    pub fn ensure_schema(conn: &Connection) -> Result<(), SocietyError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)?;

        if !table_exists {
            info!("Creating schema version {}", SCHEMA_VERSION);
            conn.execute_batch(CREATE_SCHEMA_SQL)?;
            return Ok(());
        }

        match Self::schema_version(conn)?.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(found) => Err(SocietyError::Error(format!(
                "Schema version mismatch: expected {SCHEMA_VERSION}, found {found}"
            ))),
            None => Err(SocietyError::Error("Schema version missing".to_string())),
        }
    }

    pub fn schema_version(conn: &Connection) -> Result<Option<String>, SocietyError> {
        let version = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Run `f` on a pooled connection inside `spawn_blocking`.
    ///
    /// If the returned future is dropped before completion, the statement in
    /// flight is interrupted and a task that has not started yet returns
    /// `SocietyError::Cancelled` without touching the database. Once `f`
    /// returns, the connection can no longer be interrupted from here, so a
    /// late drop never reaches another request using the same connection.
    pub async fn run_blocking<T, F>(pool: &DbPool, f: F) -> Result<T, SocietyError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, SocietyError> + Send + 'static,
    {
        let pool = pool.clone();
        let cancel = Arc::new(CancelState::default());

        let mut guard = InterruptOnDrop {
            cancel: Arc::clone(&cancel),
            armed: true,
        };

        let task = tokio::task::spawn_blocking(move || run_cancellable(&pool, &cancel, f));

        let result = task
            .await
            .map_err(|e| SocietyError::Error(format!("Query task failed: {e}")))?;
        guard.armed = false;

        result
    }
}

/// Shared between a `run_blocking` future and its blocking task. The slot
/// holds the interrupt handle only while the task owns the connection.
#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    handle: Mutex<Option<InterruptHandle>>,
}

impl CancelState {
    fn slot(&self) -> MutexGuard<'_, Option<InterruptHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.slot().as_ref() {
            warn!("Interrupting abandoned query");
            handle.interrupt();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Empties the handle slot when dropped.
struct ReleaseHandle<'a>(&'a CancelState);

impl Drop for ReleaseHandle<'_> {
    fn drop(&mut self) {
        self.0.slot().take();
    }
}

fn run_cancellable<T, F>(pool: &DbPool, cancel: &CancelState, f: F) -> Result<T, SocietyError>
where
    F: FnOnce(&Connection) -> Result<T, SocietyError>,
{
    let conn = pool.get()?;

    // Declared after `conn`, so the slot is emptied before the connection
    // goes back to the pool, on every exit path.
    *cancel.slot() = Some(conn.get_interrupt_handle());
    let _release = ReleaseHandle(cancel);

    if cancel.is_cancelled() {
        debug!("Query cancelled before it started");
        return Err(SocietyError::Cancelled);
    }
    f(&conn)
}

struct InterruptOnDrop {
    cancel: Arc<CancelState>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ErrorCode;
    use std::sync::mpsc;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    const ENDLESS_QUERY: &str =
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c";
    const LONG_QUERY: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 3000000) SELECT count(*) FROM c";

    fn temp_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let pool = Database::open_pool(&dir.path().join(DB_FILENAME), 2).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_open_pool_creates_schema() {
        let (_dir, pool) = temp_pool();
        let conn = pool.get().unwrap();
        assert_eq!(
            Database::schema_version(&conn).unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILENAME);
        drop(Database::open_pool(&path, 1).unwrap());
        assert!(Database::open_pool(&path, 1).is_ok());
    }

    #[test]
    fn test_version_mismatch_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        Database::ensure_schema(&conn).unwrap();
        conn.execute(
            "UPDATE meta SET value = '0' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
        assert!(matches!(
            Database::ensure_schema(&conn),
            Err(SocietyError::Error(_))
        ));
    }

    #[tokio::test]
    async fn test_run_blocking_returns_result() {
        let (_dir, pool) = temp_pool();
        let count = Database::run_blocking(&pool, |conn| {
            let n: i64 = conn.query_row("SELECT count(*) FROM flats", [], |row| row.get(0))?;
            Ok(n)
        })
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let (_dir, pool) = temp_pool();
        let result: Result<(), _> =
            Database::run_blocking(&pool, |_| Err(SocietyError::InvalidRequest("bad".into()))).await;
        assert!(matches!(result, Err(SocietyError::InvalidRequest(_))));
    }

    #[test]
    fn test_unicode_lower_folds_non_ascii() {
        let (_dir, pool) = temp_pool();
        let conn = pool.get().unwrap();
        let (lowered, null): (String, Option<String>) = conn
            .query_row("SELECT unicode_lower('ÉMILE Øre'), unicode_lower(NULL)", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(lowered, "émile øre");
        assert_eq!(null, None);

        let number: i64 = conn
            .query_row("SELECT unicode_lower(42)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(number, 42);
    }

    #[tokio::test]
    async fn test_dropping_future_interrupts_running_query() {
        let (_dir, pool) = temp_pool();
        let (tx, rx) = mpsc::channel();

        let mut query = Box::pin(Database::run_blocking(&pool, move |conn| {
            let outcome = conn
                .query_row(ENDLESS_QUERY, [], |row| row.get::<_, i64>(0))
                .map_err(|e| e.sqlite_error_code());
            let _ = tx.send(outcome);
            Ok(())
        }));

        tokio::select! {
            _ = &mut query => panic!("endless query returned"),
            _ = tokio::time::sleep(Duration::from_millis(300)) => {}
        }
        drop(query);

        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(outcome, Err(Some(ErrorCode::OperationInterrupted)));
    }

    #[test]
    fn test_cancelled_task_never_runs() {
        let (_dir, pool) = temp_pool();
        let cancel = CancelState::default();
        cancel.cancel();

        let ran = AtomicBool::new(false);
        let result = run_cancellable(&pool, &cancel, |_| {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(result, Err(SocietyError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(cancel.slot().is_none());
    }

    #[tokio::test]
    async fn test_future_dropped_while_waiting_for_connection_never_runs() {
        let dir = TempDir::new().unwrap();
        let pool = Database::open_pool(&dir.path().join(DB_FILENAME), 1).unwrap();
        let held = pool.get().unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_task = Arc::clone(&ran);
        let mut waiting = Box::pin(Database::run_blocking(&pool, move |_| {
            ran_in_task.store(true, Ordering::SeqCst);
            Ok(())
        }));

        tokio::select! {
            _ = &mut waiting => panic!("task ran while the only connection was held"),
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
        drop(waiting);
        drop(held);

        // The abandoned task wakes on the released connection and gives up.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(pool.state().idle_connections, 1);
    }

    #[tokio::test]
    async fn test_late_drop_leaves_reused_connection_alone() {
        let dir = TempDir::new().unwrap();
        let pool = Database::open_pool(&dir.path().join(DB_FILENAME), 1).unwrap();

        // Poll once so the task starts, then never poll it again.
        let mut stale = Box::pin(Database::run_blocking(&pool, |_| {
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        }));
        tokio::select! {
            biased;
            _ = &mut stale => panic!("task finished on its first poll"),
            _ = std::future::ready(()) => {}
        }

        // Once the task hands the connection back, another user picks it up.
        let (started_tx, started_rx) = oneshot::channel();
        let other_pool = pool.clone();
        let other = std::thread::spawn(move || {
            let conn = other_pool.get().unwrap();
            let _ = started_tx.send(());
            conn.query_row(LONG_QUERY, [], |row| row.get::<_, i64>(0))
        });

        started_rx.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(stale);

        assert_eq!(other.join().unwrap().unwrap(), 3_000_000);
    }
}
