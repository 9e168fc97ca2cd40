//! Composable SQL statements for SQLORM.
//!
//! `sqlorm-query` is the **intermediate representation** layer: identifiers,
//! literals, expressions, clauses and statements are plain values that
//! render to backend-specific SQL text plus out-of-band parameters.
//!
//! # Example
//!
//! ```ignore
//! use sqlorm_core::{Backend, BackendKind};
//! use sqlorm_query::{Literal, Render, Select, where_};
//!
//! let s = Select::new(["id"], ["person"])
//!     .clause(where_!["age > ", 10] * where_!["name = ", Literal::string("Ann")]);
//! let (sql, params) = s.build(Backend::for_kind(BackendKind::Postgres))?;
//! assert_eq!(sql, "SELECT id FROM person WHERE (age > 10) AND (name = 'Ann')");
//! assert!(params.is_empty());
//! ```
//!
//! Composition errors (empty conjunctions, wrong row widths, invalid order
//! directions, non-ASCII raw text) are reported before any backend call.

pub mod clause;
pub mod expression;
pub mod identifier;
pub mod literal;
pub mod runner;
pub mod statement;

pub use clause::{Clause, Direction, GroupBy, Join, JoinKind, OrderBy, Where, limit, offset};
pub use expression::{Expression, Part, alias};
pub use identifier::{Column, Identifier, Relation};
pub use literal::Literal;
pub use runner::{Render, Runner};
pub use statement::{Delete, Insert, Select, Statement, Update};
