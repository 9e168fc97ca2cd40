//! The DBAPI-like boundary between datasources and backend drivers.
//!
//! Drivers implement [`Connector`], [`Connection`] and [`Cursor`]. Calls are
//! synchronous and block the calling thread until the backend answers.
//! Drivers report connectivity problems as [`Error::Connection`] and
//! statement problems as [`Error::programming`]; the datasource decides
//! whether to roll back, translate, reconnect or retry.
//!
//! [`Error::Connection`]: crate::Error::Connection
//! [`Error::programming`]: crate::Error::programming

use std::collections::BTreeMap;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Column metadata reported by a cursor after a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A statement handle on a connection.
pub trait Cursor {
    /// Execute `sql`, binding `params` positionally to its placeholders.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    /// Next row of the last query, or `None` when exhausted.
    fn fetchone(&mut self) -> Result<Option<Row>>;

    /// All remaining rows of the last query.
    fn fetchall(&mut self) -> Result<Vec<Row>>;

    /// Rows produced or affected by the last statement, `-1` if unknown.
    fn rowcount(&self) -> i64;

    /// Result columns of the last query, `None` after a non-query.
    fn description(&self) -> Option<Vec<ColumnDescription>>;
}

/// An open backend connection.
pub trait Connection: Send {
    /// Open a new cursor on this connection.
    fn cursor(&mut self) -> Result<Box<dyn Cursor>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Character set name the driver negotiated, when it exposes one.
    fn character_set(&self) -> Option<String> {
        None
    }
}

/// Factory for connections of one driver.
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>>;
}

/// Keyword arguments handed to a [`Connector`].
///
/// Keys are kept sorted so that logging and comparisons are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    params: BTreeMap<String, String>,
}

impl ConnectParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.params.remove(key)
    }

    /// Move the value stored under `from` to `to`, replacing any value at `to`.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(value) = self.params.remove(from) {
            self.params.insert(to.to_string(), value);
        }
    }

    /// Insert `value` under `key` unless a value is already present.
    pub fn set_default(&mut self, key: &str, value: &str) {
        self.params
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = ConnectParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
