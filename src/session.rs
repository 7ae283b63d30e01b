//! Record operations bound to one borrowed connection.

use rusqlite::{params_from_iter, Connection, Params, Row};

use crate::error::Result;
use crate::record::Record;
use crate::schema::TableSchema;
use crate::sql;
use crate::value::Value;

static NULL: Value = Value::Null;

/// Runs record operations on a connection owned by someone else.
///
/// A session never commits, rolls back or closes its connection. Wrap it
/// around a `rusqlite::Transaction` (it derefs to `Connection`) to group
/// several operations, or let [`SqliteHelper`](crate::SqliteHelper) manage
/// the connection per call. Failed operations are logged at error level
/// before the error is returned.
pub struct Session<'c> {
    conn: &'c Connection,
}

impl<'c> Session<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    /// Execute every statement in `sql` in order, returning how many ran.
    pub fn execute_statements(&self, sql: &str) -> Result<usize> {
        logged("execute_statements", sql, self.run_statements(sql))
    }

    pub fn table_schema(&self, table: &str) -> Result<TableSchema> {
        logged("table_schema", table, self.read_schema(table))
    }

    /// Insert `rows` and return them re-read from storage, in input order.
    ///
    /// Every column of the table is bound, so keys missing from a record are
    /// written as NULL. Each insert reports the new row's key (the primary
    /// key, or the rowid for tables without one) and the rows are selected
    /// by those keys once all of them are written, so generated keys and
    /// changes made by triggers are included.
    pub fn insert(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        logged("insert", table, self.insert_rows(table, rows))
    }

    /// Upsert `rows` by primary key.
    ///
    /// A row is updated when it names every primary key column with a
    /// non-null value and exactly one stored row has those key values; all
    /// other rows are inserted. Updates only set the non-key columns the row
    /// carries with non-null values. Returns the updated rows as given,
    /// followed by the inserted rows as stored.
    pub fn update(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        logged("update", table, self.upsert_rows(table, rows))
    }

    pub fn query_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        logged("query_rows", sql, self.fetch_rows(sql, params))
    }

    pub fn query_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>> {
        logged("query_one", sql, self.fetch_one(sql, params))
    }

    /// First column of the first row; `None` when there are no rows.
    pub fn query_scalar<P: Params>(&self, sql: &str, params: P) -> Result<Option<Value>> {
        logged("query_scalar", sql, self.fetch_scalar(sql, params))
    }

    /// First column of every row, in row order.
    pub fn query_column<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Value>> {
        logged("query_column", sql, self.fetch_column(sql, params))
    }

    fn run_statements(&self, sql: &str) -> Result<usize> {
        let statements = sql::split_statements(sql);
        for statement in &statements {
            log::trace!("execute_statements: {statement}");
            self.conn.execute_batch(statement)?;
        }
        Ok(statements.len())
    }

    fn read_schema(&self, table: &str) -> Result<TableSchema> {
        let mut stmt = self.conn.prepare(sql::TABLE_INFO)?;
        let mut schema = TableSchema {
            name: table.to_string(),
            ..TableSchema::default()
        };
        let mut rows = stmt.query([table])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let pk: i64 = row.get(1)?;
            if pk >= 1 {
                schema.primary_keys.push(name.clone());
            }
            schema.columns.push(name);
        }
        Ok(schema)
    }

    fn insert_rows(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        let schema = self.read_schema(table)?;
        schema.ensure_exists()?;
        for row in &rows {
            schema.check_record(row)?;
        }

        let keys = schema.lookup_keys();
        let statement = sql::insert_returning(table, &schema.columns, &keys);
        log::trace!("insert: {statement} ({} rows)", rows.len());
        let mut stmt = self.conn.prepare(&statement)?;
        let mut written = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = schema
                .columns
                .iter()
                .map(|column| row.get(column).unwrap_or(&NULL));
            let mut returned = stmt.query(params_from_iter(values))?;
            if let Some(key) = returned.next()? {
                let key_values = (0..keys.len())
                    .map(|i| key.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                written.push(key_values);
            }
        }

        let statement = sql::select_by_key(table, &keys);
        log::trace!("insert re-read: {statement}");
        let mut stmt = self.conn.prepare(&statement)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut inserted = Vec::with_capacity(written.len());
        for key_values in &written {
            let mut stored = stmt.query(params_from_iter(key_values))?;
            // A trigger may have removed the row again.
            if let Some(row) = stored.next()? {
                inserted.push(to_record(row, &names)?);
            }
        }
        Ok(inserted)
    }

    fn upsert_rows(&self, table: &str, rows: Vec<Record>) -> Result<Vec<Record>> {
        if rows.is_empty() {
            return Ok(rows);
        }
        let schema = self.read_schema(table)?;
        schema.ensure_exists()?;

        let mut updated = Vec::new();
        let mut pending = Vec::new();
        for row in rows {
            schema.check_record(&row)?;
            if self.matches_one(&schema, &row)? {
                updated.push(row);
            } else {
                pending.push(row);
            }
        }

        for row in &updated {
            let assignments: Vec<(&str, &Value)> = schema
                .columns
                .iter()
                .filter(|column| !schema.is_primary_key(column))
                .filter_map(|column| {
                    row.get(column)
                        .filter(|value| !value.is_null())
                        .map(|value| (column.as_str(), value))
                })
                .collect();
            if assignments.is_empty() {
                continue;
            }

            let statement = sql::update_by_key(
                table,
                assignments.iter().map(|(column, _)| *column),
                &schema.primary_keys,
            );
            log::trace!("update: {statement}");
            let values = assignments
                .iter()
                .map(|(_, value)| *value)
                .chain(key_values(&schema, row));
            self.conn.execute(&statement, params_from_iter(values))?;
        }

        let inserted = self.insert_rows(table, pending)?;
        updated.extend(inserted);
        Ok(updated)
    }

    fn fetch_rows<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        log::trace!("query_rows: {sql}");
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(to_record(row, &names)?);
        }
        Ok(records)
    }

    fn fetch_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>> {
        log::trace!("query_one: {sql}");
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => Ok(Some(to_record(row, &names)?)),
            None => Ok(None),
        }
    }

    fn fetch_scalar<P: Params>(&self, sql: &str, params: P) -> Result<Option<Value>> {
        log::trace!("query_scalar: {sql}");
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn fetch_column<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Value>> {
        log::trace!("query_column: {sql}");
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(row.get(0)?);
        }
        Ok(values)
    }

    fn matches_one(&self, schema: &TableSchema, row: &Record) -> Result<bool> {
        if schema.primary_keys.is_empty() {
            return Ok(false);
        }
        let complete = schema
            .primary_keys
            .iter()
            .all(|key| row.get(key).is_some_and(|value| !value.is_null()));
        if !complete {
            return Ok(false);
        }

        let statement = sql::count_by_key(&schema.name, &schema.primary_keys);
        log::trace!("update lookup: {statement}");
        let count: i64 = self.conn.query_row(
            &statement,
            params_from_iter(key_values(schema, row)),
            |r| r.get(0),
        )?;
        Ok(count == 1)
    }
}

fn logged<T>(operation: &str, target: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        log::error!("{operation} failed on `{target}`: {err}");
    }
    result
}

fn key_values<'r>(schema: &'r TableSchema, row: &'r Record) -> impl Iterator<Item = &'r Value> {
    schema
        .primary_keys
        .iter()
        .map(|key| row.get(key).unwrap_or(&NULL))
}

fn to_record(row: &Row<'_>, names: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (i, name) in names.iter().enumerate() {
        record.insert(name.as_str(), Value::from(row.get_ref(i)?));
    }
    Ok(record)
}
