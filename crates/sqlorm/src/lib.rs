//! SQLORM: composable SQL statements and a change-tracking object-relational
//! mapper.
//!
//! This facade re-exports the workspace crates so applications depend on a
//! single crate:
//!
//! - [`core`]: values, rows, errors, the driver traits and backend dialects
//! - [`query`]: the statement IR rendered per backend
//! - [`schema`]: datatypes, mapped classes, keys and mapped objects
//! - [`session`]: datasources, results and pools
//! - [`postgres`], [`mysql`]: adapter specific datatypes and rules
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlorm::prelude::*;
//!
//! let person = DbClass::builder("person")
//!     .field(Field::new("id", CommonSerial))
//!     .field(Field::new("firstname", Unicode::new()))
//!     .field(Field::new("height", Integer))
//!     .build()?;
//!
//! let mut ds = sqlorm::connect("adapter=pgsql db=hr", connector)?
//!     .into_datasource()
//!     .ok_or(Error::DatasourceClosed)?;
//!
//! let ann = DbObject::with_values(&person, [("firstname", "Ann")])?;
//! ds.insert(&ann)?;
//! ann.set("height", 171)?;
//! ds.commit()?;
//! ```

pub mod session;
mod source;

pub use source::{Source, connect};

pub use sqlorm_core as core;
pub use sqlorm_mysql as mysql;
pub use sqlorm_postgres as postgres;
pub use sqlorm_query as query;
pub use sqlorm_schema as schema;

pub use sqlorm_core::{
    Backend, BackendKind, ConnectParams, Connection, Connector, Cursor, Error, Result, Row,
    TextEncoding, Value,
};
pub use sqlorm_query::{
    Clause, Column, Delete, Expression, Insert, OrderBy, Part, Relation, Render, Select,
    Statement, Update, Where,
};
pub use sqlorm_schema::{DbClass, DbObject, Field, ForeignKey, Key};
pub use session::{
    AdapterKind, ConnectionString, Datasource, DatasourceConfig, Pool, PoolConfig,
    PooledDatasource, ResultSet, SelectClause,
};

/// The names most programs need.
pub mod prelude {
    pub use crate::session::{
        AdapterKind, ConnectionString, Datasource, DatasourceConfig, FetchMode, Pool, PoolConfig,
        PooledDatasource, ResultSet, SelectClause,
    };
    pub use crate::{Source, connect};
    pub use sqlorm_core::{ConnectParams, Connector, Error, Result, Row, Value};
    pub use sqlorm_query::{
        Clause, Column, Expression, GroupBy, Join, OrderBy, Part, Relation, Render, Select, Where,
        limit, offset,
    };
    pub use sqlorm_schema::datatypes::{
        Boolean, CommonSerial, Date, DateTime, Enum, Float, Integer, Json, Path, Text, Time,
        Unicode,
    };
    pub use sqlorm_schema::{Csv, DbClass, DbObject, Delayed, Field, ForeignKey, Key, SqlExpression};
}
