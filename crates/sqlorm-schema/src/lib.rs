//! Mapped classes and objects for SQLORM.
//!
//! `sqlorm-schema` describes how rows map onto objects:
//!
//! - [`Datatype`] descriptors convert, validate and render column values
//! - [`Field`] binds a datatype to an attribute and a column
//! - [`DbClass`] is the ordered field registry of one relation
//! - [`Key`] and [`ForeignKey`] build `WHERE` clauses from key values
//! - [`DbObject`] holds per-instance state and tracks changes
//!
//! Backend specific datatypes live in the adapter crates.

pub mod class;
pub mod datatype;
pub mod datatypes;
pub mod field;
pub mod key;
pub mod object;
pub mod wrappers;

pub use class::{DbClass, DbClassBuilder};
pub use datatype::{Datatype, FieldContext, GeneratedKey, Slot};
pub use datatypes::{
    Boolean, CommonSerial, Date, DateTime, Enum, Float, Integer, Json, Path, Text, Time, Unicode,
};
pub use field::Field;
pub use key::{ForeignKey, Key};
pub use object::{DbObject, PendingWrites};
pub use wrappers::{Csv, Delayed, SqlExpression};
