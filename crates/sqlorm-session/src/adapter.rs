//! The closed set of backend adapters.
//!
//! Everything a datasource does differently per backend is decided here:
//! driver keywords, defaults, error translation and how the row of a fresh
//! INSERT is found again.

use std::fmt;
use std::str::FromStr;

use sqlorm_core::{Backend, BackendKind, ConnectParams, Error, QueryErrorKind, Result};
use sqlorm_query::{Column, Part, Where};
use sqlorm_schema::DbClass;

use crate::config::FetchMode;

/// Database name Gadfly uses when the connection string names none.
pub const GADFLY_DEFAULT_DB: &str = "tmp";
/// Directory Gadfly keeps its files in by default.
pub const GADFLY_DEFAULT_DIRECTORY: &str = "/tmp";
/// Gadfly has no notion of a server encoding.
pub const GADFLY_DEFAULT_ENCODING: &str = "iso-8859-1";

/// A backend adapter, as named by the `adapter=` connection string keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Pgsql,
    Mysql,
    Gadfly,
    Firebird,
}

impl AdapterKind {
    pub const fn name(self) -> &'static str {
        match self {
            AdapterKind::Pgsql => "pgsql",
            AdapterKind::Mysql => "mysql",
            AdapterKind::Gadfly => "gadfly",
            AdapterKind::Firebird => "firebird",
        }
    }

    pub const fn backend_kind(self) -> BackendKind {
        match self {
            AdapterKind::Pgsql => BackendKind::Postgres,
            AdapterKind::Mysql => BackendKind::MySql,
            AdapterKind::Gadfly => BackendKind::Gadfly,
            AdapterKind::Firebird => BackendKind::Firebird,
        }
    }

    pub fn backend(self) -> &'static Backend {
        Backend::for_kind(self.backend_kind())
    }

    /// Only PostgreSQL datasources can be pooled.
    pub const fn supports_pool(self) -> bool {
        matches!(self, AdapterKind::Pgsql)
    }

    pub const fn default_reconnect_threshold(self) -> Option<u32> {
        match self {
            AdapterKind::Pgsql => Some(sqlorm_postgres::DEFAULT_RECONNECT_THRESHOLD),
            _ => None,
        }
    }

    pub const fn default_fetch_mode(self) -> FetchMode {
        match self {
            AdapterKind::Gadfly => FetchMode::Buffered,
            _ => FetchMode::Incremental,
        }
    }

    /// Encoding fixed by the connection string rather than asked from the
    /// backend.
    pub fn configured_encoding(self, params: &ConnectParams) -> Option<String> {
        match self {
            AdapterKind::Gadfly => Some(
                params
                    .get("encoding")
                    .unwrap_or(GADFLY_DEFAULT_ENCODING)
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Translate connection string keywords into the driver's keywords.
    pub fn driver_params(self, params: ConnectParams) -> Result<ConnectParams> {
        match self {
            AdapterKind::Pgsql => Ok(sqlorm_postgres::connect_params(params)),
            AdapterKind::Mysql => sqlorm_mysql::connect_params(&params),
            AdapterKind::Gadfly => {
                let mut params = params;
                params.rename("db", "dbname");
                params.remove("encoding");
                params.set_default("dbname", GADFLY_DEFAULT_DB);
                params.set_default("directory", GADFLY_DEFAULT_DIRECTORY);
                Ok(params)
            }
            AdapterKind::Firebird => {
                let mut params = params;
                params.rename("db", "database");
                params.rename("dbname", "database");
                Ok(params)
            }
        }
    }

    pub const fn post_insert(self) -> PostInsert {
        match self {
            AdapterKind::Pgsql => PostInsert::Currval,
            AdapterKind::Mysql => PostInsert::LastInsertId,
            AdapterKind::Gadfly => PostInsert::PreassignMaxId,
            AdapterKind::Firebird => PostInsert::GeneratorValue,
        }
    }

    /// Turn a raw programming error reported by the driver into a
    /// duplicate-key or backend error.
    pub fn classify_error(self, error: Error) -> Error {
        match self {
            AdapterKind::Pgsql => sqlorm_postgres::classify_error(error),
            AdapterKind::Mysql => sqlorm_mysql::classify_error(error),
            AdapterKind::Gadfly | AdapterKind::Firebird => match error {
                Error::Query(mut query) if query.kind == QueryErrorKind::Programming => {
                    query.kind = QueryErrorKind::Backend;
                    Error::Query(query)
                }
                other => other,
            },
        }
    }
}

impl FromStr for AdapterKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "pgsql" => Ok(AdapterKind::Pgsql),
            "mysql" => Ok(AdapterKind::Mysql),
            "gadfly" => Ok(AdapterKind::Gadfly),
            "firebird" => Ok(AdapterKind::Firebird),
            other => Err(Error::UnknownAdapter(other.to_string())),
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Post-insert strategies
// ============================================================================

/// How the row of a fresh INSERT is identified to read back the values
/// the backend assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostInsert {
    /// `currval()` of the sequence behind a serial key
    Currval,
    /// `LAST_INSERT_ID()`
    LastInsertId,
    /// `GEN_ID(GEN_PK_<relation>, 0)`
    GeneratorValue,
    /// `MAX(id) + 1` is assigned before the INSERT; nothing is read back
    PreassignMaxId,
}

impl PostInsert {
    pub const fn selects_after_insert(self) -> bool {
        !matches!(self, PostInsert::PreassignMaxId)
    }

    /// `WHERE` for the generated key of `class`, or `None` when the key is
    /// not generated and must be known to the object already.
    pub fn where_clause(self, class: &DbClass) -> Option<Where> {
        match self {
            PostInsert::Currval => sqlorm_postgres::post_insert_where(class),
            PostInsert::LastInsertId => sqlorm_mysql::post_insert_where(class),
            PostInsert::GeneratorValue => generator_where(class),
            PostInsert::PreassignMaxId => None,
        }
    }
}

fn generator_where(class: &DbClass) -> Option<Where> {
    let &[idx] = class.primary_key()? else {
        return None;
    };
    let field = class.field(idx);
    field.datatype().generated_key()?;
    Some(Where::from_parts([
        Part::Column(Column::new(field.column_identifier())),
        Part::from("="),
        Part::Text(format!("GEN_ID(GEN_PK_{}, 0)", class.relation().name())),
    ]))
}
