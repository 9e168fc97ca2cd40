//! MySQL adapter for SQLORM.
//!
//! - [`MySqlConfig`]: connection keywords, translated to the driver's names
//! - `AUTO_INCREMENT` and binary datatypes
//! - the `LAST_INSERT_ID()` lookup of rows just inserted
//!
//! The backend's character set comes from the connection itself
//! ([`Connection::character_set`](sqlorm_core::Connection::character_set)).

pub mod config;
pub mod datatypes;
pub mod dialect;

pub use config::{DEFAULT_CHARSET, MySqlConfig};
pub use datatypes::{AutoIncrement, Binary, Blob};
pub use dialect::{DUPLICATE_KEY_MARKER, classify_error, connect_params, post_insert_where};
