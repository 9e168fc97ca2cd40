//! Core types and traits for SQLORM.
//!
//! `sqlorm-core` is the **foundation layer** of the workspace. It defines the
//! data types and driver contracts every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Driver contract**: `Connector`, `Connection` and `Cursor` are the
//!   DBAPI-like traits backend drivers implement.
//! - **Data model**: `Value` and `Row` carry statement parameters and results.
//! - **Dialects**: `Backend` describes how one RDBMS quotes identifiers,
//!   escapes strings, marks placeholders and names its text encodings.
//! - **Errors**: one `Error` type with structured sub-errors for connection,
//!   statement, validation and conversion failures.
//!
//! # Who Uses This Crate
//!
//! - `sqlorm-query` renders statements for a `Backend`.
//! - `sqlorm-schema` converts and validates `Value`s for mapped attributes.
//! - `sqlorm-session` drives `Connection`s and translates their errors.
//! - `sqlorm-pool` hands out `Connection`s.

pub mod backend;
pub mod column_set;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod row;
pub mod validate;
pub mod value;

pub use backend::{Backend, BackendKind};
pub use column_set::ColumnSet;
pub use connection::{ColumnDescription, ConnectParams, Connection, Connector, Cursor};
pub use encoding::TextEncoding;
pub use error::{
    ConnectionError, ConnectionErrorKind, ConversionError, Error, QueryError, QueryErrorKind,
    Result, SqlError, SqlErrorKind, ValidationError, ValidationErrorKind,
};
pub use row::Row;
pub use validate::Validator;
pub use value::Value;
