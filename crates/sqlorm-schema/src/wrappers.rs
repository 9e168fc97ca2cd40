//! Datatypes that wrap another datatype and change one aspect of it.
//!
//! A wrapper implements the whole [`Datatype`] contract and forwards
//! everything it does not override to the wrapped datatype.

use std::sync::Arc;

use sqlorm_core::{Result, TextEncoding, Validator, Value};
use sqlorm_query::{Expression, Part, alias};

use crate::datatype::{Datatype, FieldContext, GeneratedKey, Slot};

// ============================================================================
// CSV
// ============================================================================

/// A list of strings stored in a single text column, joined by a separator.
#[derive(Debug, Clone)]
pub struct Csv {
    inner: Arc<dyn Datatype>,
    separator: String,
}

impl Csv {
    pub fn new(inner: impl Datatype + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            separator: ",".to_string(),
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn split(&self, text: &str) -> Value {
        if text.is_empty() {
            return Value::Array(Vec::new());
        }
        Value::Array(
            text.split(self.separator.as_str())
                .map(|item| Value::Text(item.to_string()))
                .collect(),
        )
    }
}

impl Datatype for Csv {
    fn type_name(&self) -> &'static str {
        "csv"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => Ok(self.split(&s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match self.inner.convert(ctx, item)? {
                    text @ Value::Text(_) => Ok(text),
                    other => Err(ctx.type_error("text list item", &other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(ctx.type_error("list of strings", &other)),
        }
    }

    fn literal(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        match value {
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(&self.separator);
                self.inner.literal(ctx, &Value::Text(joined))
            }
            other => self.inner.literal(ctx, other),
        }
    }

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, encoding: &TextEncoding) -> Result<Value> {
        match self.inner.from_row(ctx, value, encoding)? {
            Value::Text(s) => Ok(self.split(&s)),
            other => Ok(other),
        }
    }

    fn has_default(&self) -> bool {
        self.inner.has_default()
    }

    fn default_value(&self) -> Option<Value> {
        self.inner.default_value()
    }

    fn validators(&self) -> Vec<Validator> {
        self.inner.validators()
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<()> {
        self.inner.check_assignment(ctx, current)
    }

    fn accepts_expression(&self) -> bool {
        false
    }

    fn needs_post_insert_select(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<bool> {
        self.inner.needs_post_insert_select(ctx, current)
    }

    fn select_part(&self, ctx: &FieldContext<'_>, full: bool) -> Option<Part> {
        self.inner.select_part(ctx, full)
    }

    fn generated_key(&self) -> Option<GeneratedKey> {
        self.inner.generated_key()
    }

    fn delayed(&self) -> Option<bool> {
        self.inner.delayed()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn bind(&self, attribute: &str) -> Result<()> {
        self.inner.bind(attribute)
    }

    fn default_column(&self) -> Option<&'static str> {
        self.inner.default_column()
    }
}

// ============================================================================
// Delayed
// ============================================================================

/// A column left out of regular selects and loaded on first access.
///
/// With `cache` set the loaded value is kept on the object; otherwise every
/// read goes back to the backend.
#[derive(Debug, Clone)]
pub struct Delayed {
    inner: Arc<dyn Datatype>,
    cache: bool,
}

impl Delayed {
    pub fn new(inner: impl Datatype + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            cache: false,
        }
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }
}

impl Datatype for Delayed {
    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        self.inner.convert(ctx, value)
    }

    fn literal(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        self.inner.literal(ctx, value)
    }

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, encoding: &TextEncoding) -> Result<Value> {
        self.inner.from_row(ctx, value, encoding)
    }

    fn has_default(&self) -> bool {
        self.inner.has_default()
    }

    fn default_value(&self) -> Option<Value> {
        self.inner.default_value()
    }

    fn validators(&self) -> Vec<Validator> {
        self.inner.validators()
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<()> {
        self.inner.check_assignment(ctx, current)
    }

    fn accepts_expression(&self) -> bool {
        self.inner.accepts_expression()
    }

    fn needs_post_insert_select(&self, _ctx: &FieldContext<'_>, _current: &Slot) -> Result<bool> {
        Ok(false)
    }

    fn select_part(&self, _ctx: &FieldContext<'_>, _full: bool) -> Option<Part> {
        None
    }

    fn generated_key(&self) -> Option<GeneratedKey> {
        self.inner.generated_key()
    }

    fn delayed(&self) -> Option<bool> {
        Some(self.cache)
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn bind(&self, attribute: &str) -> Result<()> {
        self.inner.bind(attribute)
    }

    fn default_column(&self) -> Option<&'static str> {
        self.inner.default_column()
    }
}

// ============================================================================
// SQL expression
// ============================================================================

/// A read-only attribute computed by an SQL expression in the select list.
///
/// The template may refer to `$relation` (or `$table`) and `$attribute`,
/// which are replaced by the class's relation and the attribute name.
#[derive(Debug, Clone)]
pub struct SqlExpression {
    inner: Arc<dyn Datatype>,
    template: String,
    default: Option<Value>,
}

impl SqlExpression {
    pub fn new(inner: impl Datatype + 'static, template: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(inner),
            template: template.into(),
            default: None,
        }
    }

    /// Value reported while the attribute has not been read.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn substitute(&self, ctx: &FieldContext<'_>) -> String {
        let relation = ctx.relation.qualified_name();
        self.template
            .replace("$relation", &relation)
            .replace("$table", &relation)
            .replace("$attribute", ctx.attribute)
    }
}

impl Datatype for SqlExpression {
    fn type_name(&self) -> &'static str {
        "expression"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        self.inner.convert(ctx, value)
    }

    fn literal(&self, ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        self.inner.literal(ctx, value)
    }

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, encoding: &TextEncoding) -> Result<Value> {
        self.inner.from_row(ctx, value, encoding)
    }

    fn default_value(&self) -> Option<Value> {
        self.default.clone()
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, _current: &Slot) -> Result<()> {
        Err(ctx.immutable("expression attributes are computed by the database backend"))
    }

    fn accepts_expression(&self) -> bool {
        false
    }

    fn needs_post_insert_select(&self, _ctx: &FieldContext<'_>, _current: &Slot) -> Result<bool> {
        Ok(false)
    }

    fn select_part(&self, ctx: &FieldContext<'_>, _full: bool) -> Option<Part> {
        let computed = Expression::new([self.substitute(ctx)]).grouped();
        Some(alias(computed, ctx.column_identifier()))
    }

    fn is_writable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommonSerial, Integer, Text, Unicode};
    use sqlorm_query::{Relation, Render};

    fn with_ctx<T>(f: impl FnOnce(&FieldContext<'_>) -> T) -> T {
        let relation = Relation::new("person").with_schema("hr");
        let ctx = FieldContext {
            class: "person",
            attribute: "tags",
            column: "tags",
            quoted: false,
            relation: &relation,
        };
        f(&ctx)
    }

    #[test]
    fn test_csv_splits_and_joins() {
        with_ctx(|ctx| {
            let csv = Csv::new(Text::new());
            let list = csv.convert(ctx, Value::from("a,b,c")).unwrap();
            assert_eq!(list.as_array().map(<[Value]>::len), Some(3));
            let part = csv.literal(ctx, &list).unwrap();
            assert_eq!(part.build_generic().unwrap().0, "'a,b,c'");
        });
    }

    #[test]
    fn test_csv_empty_row_value_is_empty_list() {
        with_ctx(|ctx| {
            let csv = Csv::new(Unicode::new()).separator(";");
            let list = csv.from_row(ctx, Value::from(""), &TextEncoding::Utf8).unwrap();
            assert_eq!(list, Value::Array(Vec::new()));
            assert!(!csv.accepts_expression());
        });
    }

    #[test]
    fn test_wrappers_keep_inner_key_and_column_rules() {
        let csv = Csv::new(CommonSerial);
        assert_eq!(csv.generated_key(), Some(GeneratedKey::CommonSerial));
        assert_eq!(csv.default_column(), Some("id"));
        assert!(!Csv::new(SqlExpression::new(Text::new(), "'a,b'")).is_writable());

        let delayed = Delayed::new(CommonSerial);
        assert_eq!(delayed.default_column(), Some("id"));
        assert!(!Delayed::new(SqlExpression::new(Integer, "1")).is_writable());
    }

    #[test]
    fn test_delayed_columns_stay_out_of_selects() {
        with_ctx(|ctx| {
            let delayed = Delayed::new(Text::new()).cached();
            assert!(delayed.select_part(ctx, true).is_none());
            assert_eq!(delayed.delayed(), Some(true));
            assert_eq!(Delayed::new(Text::new()).delayed(), Some(false));
        });
    }

    #[test]
    fn test_expression_template_substitution() {
        with_ctx(|ctx| {
            let e = SqlExpression::new(Integer, "SELECT COUNT(*) FROM email WHERE email.owner = $relation.id");
            let part = e.select_part(ctx, true).unwrap();
            assert_eq!(
                part.build_generic().unwrap().0,
                "(SELECT COUNT(*) FROM email WHERE email.owner = hr.person.id) AS tags"
            );
        });
    }

    #[test]
    fn test_expression_is_read_only_with_default() {
        with_ctx(|ctx| {
            let e = SqlExpression::new(Integer, "1").with_default(0);
            assert_eq!(e.default_value(), Some(Value::Int(0)));
            assert!(!e.is_writable());
            assert!(e.check_assignment(ctx, &Slot::Unset).is_err());
        });
    }
}
