use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Params};

use crate::error::Result;
use crate::record::Record;
use crate::schema::{Schema, TableSchema};
use crate::session::Session;
use crate::sql;
use crate::value::Value;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite helper configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file (`:memory:` is accepted, but every
    /// helper call then sees a fresh database)
    pub db_path: PathBuf,
    /// Tables created by [`SqliteHelper::open`]
    pub schema: Schema,
    /// How long a connection waits on a locked database
    pub busy_timeout: Option<Duration>,
    /// Enforce foreign key constraints on every connection
    pub foreign_keys: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
            busy_timeout: Some(DEFAULT_BUSY_TIMEOUT),
            foreign_keys: true,
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Option<Duration>) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }
}

/// Record helper over one SQLite database file.
///
/// The helper holds no connection between calls. Each method opens a
/// connection, runs in its own transaction (commit on success, rollback on
/// error) and closes the connection before returning; scripts passed to
/// [`execute_statements`](Self::execute_statements) may drive their own
/// transactions instead. Use
/// [`transaction`](Self::transaction) to run several operations on one
/// connection, or [`connect`](Self::connect) with a [`Session`] to manage
/// the connection yourself.
#[derive(Debug, Clone)]
pub struct SqliteHelper {
    config: SqliteConfig,
}

impl SqliteHelper {
    /// Create a helper without touching the database
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    /// Create a helper and make sure every table of the configured schema exists
    pub fn open(config: SqliteConfig) -> Result<Self> {
        let helper = Self::new(config);
        helper.initialize_schema()?;
        Ok(helper)
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    /// Open a configured connection. The caller owns it: commit, rollback
    /// and close are up to them.
    pub fn connect(&self) -> Result<Connection> {
        log::debug!("opening sqlite database at {}", self.path().display());
        let conn = Connection::open(&self.config.db_path)?;
        if let Some(timeout) = self.config.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        Ok(conn)
    }

    /// Run `f` on one connection inside one transaction.
    ///
    /// Commits when `f` returns `Ok`, otherwise rolls back and returns the
    /// error. The connection is closed on every path.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Session<'_>) -> Result<T>,
    {
        let mut conn = self.connect()?;
        let outcome = run_in_transaction(&mut conn, f);
        match &outcome {
            Ok(_) => log::debug!("committed transaction on {}", self.path().display()),
            Err(err) => log::debug!(
                "rolled back transaction on {}: {err}",
                self.path().display()
            ),
        }
        release(conn);
        outcome
    }

    pub fn initialize_schema(&self) -> Result<()> {
        let statements = self.config.schema.create_statements();
        if statements.is_empty() {
            return Ok(());
        }
        self.transaction(|session| {
            for statement in &statements {
                session.execute_statements(statement)?;
            }
            Ok(())
        })
    }

    /// Run a script on a connection of its own.
    ///
    /// The connection starts in autocommit mode, so scripts may manage their
    /// own transactions (`BEGIN` .. `COMMIT`, `VACUUM`, journal pragmas). A
    /// transaction is opened before the first INSERT, UPDATE, DELETE or
    /// REPLACE that runs outside one; whatever transaction is still open at
    /// the end is committed, or rolled back when a statement fails.
    pub fn execute_statements(&self, sql: &str) -> Result<usize> {
        let conn = self.connect()?;
        let outcome = run_script(&conn, sql);
        if let Err(err) = &outcome {
            log::error!(
                "execute_statements failed on {}: {err}",
                self.path().display()
            );
        }
        release(conn);
        outcome
    }

    pub fn table_schema(&self, table: &str) -> Result<TableSchema> {
        self.transaction(|session| session.table_schema(table))
    }

    pub fn insert(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        self.transaction(|session| session.insert(table, rows))
    }

    pub fn update(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        self.transaction(|session| session.update(table, rows))
    }

    pub fn query_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        self.transaction(|session| session.query_rows(sql, params))
    }

    pub fn query_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>> {
        self.transaction(|session| session.query_one(sql, params))
    }

    pub fn query_scalar<P: Params>(&self, sql: &str, params: P) -> Result<Option<Value>> {
        self.transaction(|session| session.query_scalar(sql, params))
    }

    pub fn query_column<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Value>> {
        self.transaction(|session| session.query_column(sql, params))
    }
}

fn run_in_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Session<'_>) -> Result<T>,
{
    let tx = conn.transaction()?;
    match f(&Session::new(&tx)) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                log::warn!("rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

fn run_script(conn: &Connection, sql: &str) -> Result<usize> {
    let statements = sql::split_statements(sql);
    for statement in &statements {
        if conn.is_autocommit() && sql::is_data_change(statement) {
            conn.execute_batch("BEGIN")?;
        }
        log::trace!("execute_statements: {statement}");
        if let Err(err) = conn.execute_batch(statement) {
            if !conn.is_autocommit() {
                if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                    log::warn!("rollback failed: {rollback_err}");
                }
            }
            return Err(err.into());
        }
    }
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
    }
    Ok(statements.len())
}

fn release(conn: Connection) {
    if let Err((_, err)) = conn.close() {
        log::warn!("closing sqlite connection failed: {err}");
    }
}
