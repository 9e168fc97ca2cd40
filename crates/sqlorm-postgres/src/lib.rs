//! PostgreSQL adapter for SQLORM.
//!
//! This crate holds what a datasource needs to know about PostgreSQL
//! beyond the [`Backend`](sqlorm_core::Backend) descriptor:
//!
//! - `SERIAL`, `INET`, `POINT` and `BYTEA` datatypes
//! - connection keyword mapping (`db` becomes `dbname`)
//! - the `currval()` lookup of rows just inserted
//! - the encoding query and duplicate-key detection
//!
//! The driver itself is supplied by the application as a
//! [`Connector`](sqlorm_core::Connector).

pub mod datatypes;
pub mod dialect;

pub use datatypes::{Blob, Bytea, Inet, Point, Serial};
pub use dialect::{
    DEFAULT_RECONNECT_THRESHOLD, DUPLICATE_KEY_MARKER, ENCODING_QUERY, classify_error,
    connect_params, default_sequence, post_insert_where,
};
