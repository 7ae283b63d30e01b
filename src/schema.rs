use crate::error::{Error, Result};
use crate::record::Record;
use crate::sql::{quote_identifier, quote_literal};

/// Column layout of an existing table, read through `pragma_table_info`.
///
/// A table that does not exist introspects to an empty column list rather
/// than an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    pub name: String,
    /// All columns in declaration order.
    pub columns: Vec<String>,
    /// Columns with a primary key rank of at least 1, in declaration order.
    pub primary_keys: Vec<String>,
}

impl TableSchema {
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|key| key == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns that identify a freshly inserted row: the primary key, or
    /// the rowid when the table declares none.
    pub fn lookup_keys(&self) -> Vec<String> {
        if self.primary_keys.is_empty() {
            vec!["rowid".to_string()]
        } else {
            self.primary_keys.clone()
        }
    }

    pub(crate) fn ensure_exists(&self) -> Result<()> {
        if self.exists() {
            Ok(())
        } else {
            Err(Error::TableNotFound(self.name.clone()))
        }
    }

    /// Reject records with keys that are not columns of this table.
    pub(crate) fn check_record(&self, record: &Record) -> Result<()> {
        match record.keys().find(|key| !self.has_column(key)) {
            Some(column) => Err(Error::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Tables created when a helper is opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// DDL for every table and index, in declaration order.
    pub fn create_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .flat_map(TableDefinition::create_statements)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Table-level key; leave empty when a column carries `PrimaryKey`.
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// `CREATE TABLE IF NOT EXISTS` followed by one `CREATE INDEX IF NOT
    /// EXISTS` per index.
    pub fn create_statements(&self) -> Vec<String> {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            let keys = self
                .primary_key
                .iter()
                .map(|key| quote_identifier(key))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("PRIMARY KEY ({keys})"));
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            parts.join(", ")
        )];
        statements.extend(self.indexes.iter().map(|index| index.to_sql(&self.name)));
        statements
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_default(mut self, default_value: DefaultValue) -> Self {
        self.default_value = Some(default_value);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        if let Some(default_value) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default_value.to_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
}

impl DataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
    CurrentTimestamp,
}

impl DefaultValue {
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Text(text) => quote_literal(text),
            // Parenthesized so negative and exponent forms stay one term.
            DefaultValue::Real(f) => format!("({f:?})"),
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn to_sql(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({columns})",
            if self.unique { "UNIQUE " } else { "" },
            quote_identifier(&self.name),
            quote_identifier(table)
        )
    }
}
