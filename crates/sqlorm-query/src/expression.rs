//! Expressions: sequences of raw SQL text and nodes.
//!
//! An expression renders each of its parts, trims the result and joins the
//! non-empty pieces with single spaces:
//!
//! ```ignore
//! use sqlorm_query::{expr, Literal};
//!
//! let e = expr!["name = ", Literal::string("Ann")];
//! assert_eq!(e.build_generic()?.0, "name = 'Ann'");
//! ```
//!
//! Raw text must be ASCII. Non-ASCII data has to go through a
//! [`Literal::Unicode`] so it is checked against the backend encoding.

use sqlorm_core::{Error, Result, SqlErrorKind};

use crate::identifier::{Column, Identifier, Relation};
use crate::literal::Literal;
use crate::runner::{Render, Runner};
use crate::statement::Select;

/// One element of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Raw SQL, ASCII only
    Text(String),
    Identifier(Identifier),
    Relation(Relation),
    Column(Column),
    Literal(Literal),
    Expression(Expression),
    /// Parenthesized expression
    Group(Expression),
    /// `expression AS name`
    Alias(Box<Part>, Identifier),
    /// Parenthesized sub-select
    Subquery(Box<Select>),
}

impl Render for Part {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        match self {
            Part::Text(text) => {
                if !text.is_ascii() {
                    return Err(Error::sql(
                        SqlErrorKind::NonAscii,
                        format!("non-ASCII text in SQL: {text:?}"),
                    ));
                }
                Ok(text.clone())
            }
            Part::Identifier(identifier) => identifier.render(runner),
            Part::Relation(relation) => relation.render(runner),
            Part::Column(column) => column.render(runner),
            Part::Literal(literal) => literal.render(runner),
            Part::Expression(expression) => expression.render(runner),
            Part::Group(expression) => Ok(format!("({})", expression.render(runner)?)),
            Part::Alias(part, name) => Ok(format!(
                "{} AS {}",
                part.render(runner)?,
                name.render(runner)?
            )),
            Part::Subquery(select) => Ok(format!("({})", select.render(runner)?)),
        }
    }
}

impl From<&str> for Part {
    fn from(text: &str) -> Self {
        Part::Text(text.to_string())
    }
}

impl From<String> for Part {
    fn from(text: String) -> Self {
        Part::Text(text)
    }
}

impl From<i64> for Part {
    fn from(v: i64) -> Self {
        Part::Literal(Literal::Integer(v))
    }
}

impl From<i32> for Part {
    fn from(v: i32) -> Self {
        Part::Literal(Literal::Integer(i64::from(v)))
    }
}

impl From<f64> for Part {
    fn from(v: f64) -> Self {
        Part::Literal(Literal::Float(v))
    }
}

impl From<bool> for Part {
    fn from(v: bool) -> Self {
        Part::Literal(Literal::Bool(v))
    }
}

impl From<Literal> for Part {
    fn from(literal: Literal) -> Self {
        Part::Literal(literal)
    }
}

impl From<Identifier> for Part {
    fn from(identifier: Identifier) -> Self {
        Part::Identifier(identifier)
    }
}

impl From<Relation> for Part {
    fn from(relation: Relation) -> Self {
        Part::Relation(relation)
    }
}

impl From<Column> for Part {
    fn from(column: Column) -> Self {
        Part::Column(column)
    }
}

impl From<Expression> for Part {
    fn from(expression: Expression) -> Self {
        Part::Expression(expression)
    }
}

impl From<Select> for Part {
    fn from(select: Select) -> Self {
        Part::Subquery(Box::new(select))
    }
}

/// A sequence of parts joined by spaces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    parts: Vec<Part>,
}

impl Expression {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, part: impl Into<Part>) {
        self.parts.push(part.into());
    }

    /// Builder-style push.
    pub fn and_then(mut self, part: impl Into<Part>) -> Self {
        self.push(part);
        self
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Wrap in parentheses.
    pub fn grouped(self) -> Part {
        Part::Group(self)
    }
}

impl Render for Expression {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let mut pieces = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let rendered = part.render(runner)?;
            let trimmed = rendered.trim();
            if !trimmed.is_empty() {
                pieces.push(trimmed.to_string());
            }
        }
        Ok(pieces.join(" "))
    }
}

impl<P: Into<Part>> FromIterator<P> for Expression {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Expression::new(iter)
    }
}

/// `part AS name`.
pub fn alias(part: impl Into<Part>, name: impl Into<Identifier>) -> Part {
    Part::Alias(Box::new(part.into()), name.into())
}

/// Build an [`Expression`] from heterogeneous parts.
#[macro_export]
macro_rules! expr {
    ($($part:expr),* $(,)?) => {
        $crate::Expression::new(::std::vec![$($crate::Part::from($part)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlorm_core::{Backend, BackendKind};

    #[test]
    fn test_parts_joined_by_single_spaces() {
        let e = crate::expr!["age > ", 10, " AND ", "height < ", 2.5];
        assert_eq!(e.build_generic().unwrap().0, "age > 10 AND height < 2.5");
    }

    #[test]
    fn test_nested_expressions_and_groups() {
        let inner = crate::expr!["a", "+", 1];
        let e = crate::expr![inner.clone().grouped(), "*", 2, inner];
        assert_eq!(e.build_generic().unwrap().0, "(a + 1) * 2 a + 1");
    }

    #[test]
    fn test_non_ascii_text_rejected() {
        let e = crate::expr!["name = 'Jürgen'"];
        let err = e.build_generic().unwrap_err();
        assert!(matches!(err, Error::Sql(ref s) if s.kind == SqlErrorKind::NonAscii));
    }

    #[test]
    fn test_alias_uses_backend_quotes() {
        let e = crate::expr![alias("age - 10", Identifier::quoted("negative age"))];
        let (sql, _) = e.build(Backend::for_kind(BackendKind::Postgres)).unwrap();
        assert_eq!(sql, "age - 10 AS \"negative age\"");
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        let e = crate::expr!["SELECT", "", "1"];
        assert_eq!(e.build_generic().unwrap().0, "SELECT 1");
    }
}
