//! Record-level helpers over an embedded SQLite database.
//!
//! # Intention
//!
//! - Insert, upsert and query loosely-typed [`Record`]s without writing the
//!   SQL for those operations.
//! - Keep connection lifetime explicit: [`SqliteHelper`] opens and closes a
//!   connection per call, [`Session`] works on a connection the caller owns.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No pooling, migrations or query building beyond the record operations.

pub mod error;
pub mod record;
pub mod schema;
pub mod session;
pub mod sql;
pub mod sqlite;
pub mod value;

pub use error::{Error, Result};
pub use record::Record;
pub use schema::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, IndexDefinition, Schema,
    TableDefinition, TableSchema,
};
pub use session::Session;
pub use sqlite::{SqliteConfig, SqliteHelper};
pub use value::Value;
