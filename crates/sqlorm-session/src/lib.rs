//! Datasources for SQLORM.
//!
//! A datasource is the unit of work of SQLORM. It holds one connection,
//! inserts and selects mapped objects, and writes the changes made to them
//! when the transaction is flushed or committed.
//!
//! # Design
//!
//! - **Explicit writes**: assignments are only recorded; nothing reaches the
//!   backend before a flush, a commit or a modifying statement
//! - **Ownership clarity**: the datasource owns its connection and the one
//!   cursor every modification runs on
//! - **Closed adapter set**: per-backend behavior is an [`AdapterKind`]
//!   rather than a trait object
//!
//! # Example
//!
//! ```ignore
//! let cs: ConnectionString = "adapter=pgsql db=hr user=ann".parse()?;
//! let mut ds = Datasource::open(&cs, connector)?;
//!
//! for person in ds.select(&person, [Where::from_parts(["height > 180"]).into()])? {
//!     let person = person?;
//!     person.set("tall", true)?;
//! }
//! ds.commit()?;
//! ```

pub mod adapter;
pub mod config;
pub mod connstr;
pub mod datasource;
pub mod result;

pub use adapter::{AdapterKind, PostInsert};
pub use config::{DatasourceConfig, EMBEDDED_RECONNECT_THRESHOLD, FetchMode};
pub use connstr::ConnectionString;
pub use datasource::{Datasource, DatasourceState, SelectClause};
pub use result::ResultSet;
