//! SQL execution source contracts and the tabular result model

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::SourceError;

/// Credentials and location of a backing database
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl ConnectionInfo {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Connection gate target for this database, `user@url`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.url)
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Column data type of a [`RowSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
    Binary,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "BOOLEAN",
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::Utf8 => "UTF8",
            Self::Binary => "BINARY",
        };
        f.write_str(name)
    }
}

/// Single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// Column type this value belongs to, `None` for `Null`.
    #[must_use]
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(ColumnType::Boolean),
            Self::Int(_) => Some(ColumnType::Int64),
            Self::Float(_) => Some(ColumnType::Float64),
            Self::Text(_) => Some(ColumnType::Utf8),
            Self::Bytes(_) => Some(ColumnType::Binary),
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Int(_) => "INT64",
            Self::Float(_) => "FLOAT64",
            Self::Text(_) => "UTF8",
            Self::Bytes(_) => "BINARY",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Row/column matrix returned by a source
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    #[must_use]
    pub const fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a row set from untyped column names, inferring each column's
    /// type from its first non-null value. All-null columns become `Utf8`.
    #[must_use]
    pub fn infer(names: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let data_type = rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(Value::column_type))
                    .next()
                    .unwrap_or(ColumnType::Utf8);
                Column { name, data_type }
            })
            .collect();
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep at most `limit` rows.
    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}

/// Executes SQL against one backing database.
#[async_trait]
pub trait SqlSource: Send + Sync {
    /// Run `sql` and return at most `row_limit` rows.
    async fn query(&self, sql: &str, row_limit: usize) -> Result<RowSet, SourceError>;
}

/// Creates a [`SqlSource`] for a set of credentials.
///
/// Creation must not block on the network; connections are expected to be
/// opened lazily on first query.
pub trait SourceFactory: Send + Sync {
    fn create(&self, connection: &ConnectionInfo) -> Result<Arc<dyn SqlSource>, SourceError>;
}
