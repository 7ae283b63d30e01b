use thiserror::Error;

/// Errors returned by record operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine rejected a statement (syntax, constraint, lock, I/O).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Introspection found no columns for the target table.
    #[error("table `{0}` does not exist")]
    TableNotFound(String),

    /// A record carries a key that is not a column of the table.
    #[error("table `{table}` has no column named `{column}`")]
    UnknownColumn { table: String, column: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
