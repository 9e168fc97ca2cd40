//! The datatype descriptor contract.
//!
//! A datatype converts between values assigned in Rust, the values stored
//! on an object and SQL literals. Datatypes are stateless: the binding to a
//! class and attribute lives in [`Field`](crate::Field), and per-object state
//! lives in a [`Slot`].

use std::fmt;

use sqlorm_core::{Error, Result, TextEncoding, Validator, Value};
use sqlorm_query::{Column, Expression, Identifier, Literal, Part, Relation};

/// Per-object state of one attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Slot {
    /// Never assigned nor retrieved
    #[default]
    Unset,
    /// Holds a native value
    Set(Value),
    /// Bound to a raw SQL expression; the value is unknown until re-read
    Expression(Expression),
}

impl Slot {
    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Slot::Set(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::Set(v) => Some(v),
            _ => None,
        }
    }
}

/// How a backend assigns a key column's value on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedKey {
    /// Portable serial integer primary key named `id`
    CommonSerial,
    /// PostgreSQL `SERIAL`, optionally backed by an explicitly named sequence
    Serial { sequence: Option<String> },
    /// MySQL `AUTO_INCREMENT`
    AutoIncrement,
}

/// The class, attribute and column a datatype is working for.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub class: &'a str,
    pub attribute: &'a str,
    pub column: &'a str,
    /// Column name needs identifier quotes
    pub quoted: bool,
    pub relation: &'a Relation,
}

impl FieldContext<'_> {
    /// The column, qualified with its relation when `full`.
    pub fn column(&self, full: bool) -> Column {
        let column = Column::new(self.column_identifier());
        if full { column.of(self.relation.clone()) } else { column }
    }

    pub fn column_identifier(&self) -> Identifier {
        if self.quoted {
            Identifier::quoted(self.column)
        } else {
            Identifier::new(self.column)
        }
    }

    /// A conversion error for this attribute.
    pub fn conversion_error(&self, message: impl Into<String>) -> Error {
        Error::conversion(self.class, self.attribute, message)
    }

    /// Conversion error for a value of the wrong type.
    pub fn type_error(&self, expected: &str, value: &Value) -> Error {
        self.conversion_error(format!(
            "expected {expected}, got {} {}",
            value.type_name(),
            value.repr()
        ))
    }

    pub fn immutable(&self, message: impl Into<String>) -> Error {
        Error::ImmutableAttribute {
            class: self.class.to_string(),
            attribute: self.attribute.to_string(),
            message: message.into(),
        }
    }
}

/// Behavior of one column type.
///
/// Only [`Datatype::type_name`] and [`Datatype::convert`] are required.
/// Wrappers implement the whole trait and forward to the datatype they wrap.
pub trait Datatype: fmt::Debug + Send + Sync {
    /// Short name for messages and debugging.
    fn type_name(&self) -> &'static str;

    /// Coerce an assigned value into the native form stored on the object.
    /// NULL must pass through; converting a native value returns it unchanged.
    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value>;

    /// SQL for a stored native value.
    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Literal::from_value(value).map(Part::Literal)
    }

    /// Native value for a value delivered in a result row.
    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, _encoding: &TextEncoding) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.convert(ctx, value)
    }

    /// True if the backend supplies a value when none is inserted.
    fn has_default(&self) -> bool {
        false
    }

    /// Value reported for an unset attribute instead of an error.
    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Validators implied by the type itself, run before field validators.
    fn validators(&self) -> Vec<Validator> {
        Vec::new()
    }

    /// Veto an assignment given the attribute's current state.
    fn check_assignment(&self, _ctx: &FieldContext<'_>, _current: &Slot) -> Result<()> {
        Ok(())
    }

    /// False if the attribute cannot be bound to a raw SQL expression.
    fn accepts_expression(&self) -> bool {
        true
    }

    /// Whether the column must be read back right after an INSERT.
    fn needs_post_insert_select(&self, _ctx: &FieldContext<'_>, current: &Slot) -> Result<bool> {
        Ok(self.has_default() && current.is_unset())
    }

    /// Entry of the class's select list, `None` to leave the column out.
    fn select_part(&self, ctx: &FieldContext<'_>, full: bool) -> Option<Part> {
        Some(Part::Column(ctx.column(full)))
    }

    /// Backend key generation this column relies on.
    fn generated_key(&self) -> Option<GeneratedKey> {
        None
    }

    /// `Some(cache)` for columns loaded on demand only.
    fn delayed(&self) -> Option<bool> {
        None
    }

    /// False for computed columns that never appear in INSERT or UPDATE.
    fn is_writable(&self) -> bool {
        true
    }

    /// Check the binding to `attribute` when the class is built.
    fn bind(&self, _attribute: &str) -> Result<()> {
        Ok(())
    }

    /// Column name used when a field does not name one.
    fn default_column(&self) -> Option<&'static str> {
        None
    }
}
