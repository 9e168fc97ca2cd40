//! Clauses of a SELECT statement.
//!
//! Every clause has a fixed rank. A statement sorts its clauses by rank
//! before rendering, so they come out as joins, WHERE, GROUP BY, ORDER BY,
//! LIMIT, OFFSET no matter in which order they were supplied.

use std::ops::{Add, Mul};

use sqlorm_core::{Error, Result, SqlErrorKind};

use crate::expression::{Expression, Part};
use crate::identifier::Relation;
use crate::runner::{Render, Runner};

// ============================================================================
// WHERE
// ============================================================================

/// A `WHERE` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Where {
    expression: Expression,
}

impl Where {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }

    /// Build from parts, like [`Expression::new`].
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self::new(Expression::new(parts))
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn into_expression(self) -> Expression {
        self.expression
    }

    /// Conjoin the present operands with `AND`.
    pub fn and<I>(operands: I) -> Result<Where>
    where
        I: IntoIterator<Item = Option<Where>>,
    {
        Self::combine(operands, "AND")
    }

    /// Disjoin the present operands with `OR`.
    pub fn or<I>(operands: I) -> Result<Where>
    where
        I: IntoIterator<Item = Option<Where>>,
    {
        Self::combine(operands, "OR")
    }

    fn combine<I>(operands: I, connective: &str) -> Result<Where>
    where
        I: IntoIterator<Item = Option<Where>>,
    {
        let mut expression = Expression::default();
        for operand in operands.into_iter().flatten() {
            if !expression.is_empty() {
                expression.push(connective);
            }
            expression.push(Part::Group(operand.expression));
        }
        if expression.is_empty() {
            return Err(Error::sql(
                SqlErrorKind::EmptyOperands,
                format!("{connective} needs at least one operand"),
            ));
        }
        Ok(Where::new(expression))
    }

    fn join_two(self, other: Where, connective: &str) -> Where {
        Where::new(Expression::new([
            Part::Group(self.expression),
            Part::from(connective),
            Part::Group(other.expression),
        ]))
    }
}

impl Render for Where {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        Ok(format!("WHERE {}", self.expression.render(runner)?))
    }
}

impl From<Expression> for Where {
    fn from(expression: Expression) -> Self {
        Where::new(expression)
    }
}

/// `a * b` is `(a) AND (b)`.
impl Mul for Where {
    type Output = Where;

    fn mul(self, rhs: Where) -> Where {
        self.join_two(rhs, "AND")
    }
}

/// `a + b` is `(a) OR (b)`.
impl Add for Where {
    type Output = Where;

    fn add(self, rhs: Where) -> Where {
        self.join_two(rhs, "OR")
    }
}

/// `WHERE` built from parts.
#[macro_export]
macro_rules! where_ {
    ($($part:expr),* $(,)?) => {
        $crate::Where::new($crate::expr![$($part),*])
    };
}

// ============================================================================
// ORDER BY / GROUP BY
// ============================================================================

/// Sort direction of an `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `ASC`/`DESC`, case-insensitively.
    pub fn parse(text: &str) -> Result<Self> {
        match text.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(Error::sql(
                SqlErrorKind::Syntax,
                format!("Order direction must be ASC or DESC, not {text:?}"),
            )),
        }
    }
}

/// An `ORDER BY` over one or more columns.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    columns: Vec<Part>,
    direction: Direction,
}

impl OrderBy {
    pub fn new<I, P>(columns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            direction: Direction::Asc,
        }
    }

    /// Set the direction from its SQL keyword.
    pub fn direction(mut self, direction: &str) -> Result<Self> {
        self.direction = Direction::parse(direction)?;
        Ok(self)
    }

    pub fn desc(mut self) -> Self {
        self.direction = Direction::Desc;
        self
    }
}

impl Render for OrderBy {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let columns = runner.render_list(&self.columns, ", ")?;
        match self.direction {
            Direction::Asc => Ok(format!("ORDER BY {columns}")),
            Direction::Desc => Ok(format!("ORDER BY {columns} DESC")),
        }
    }
}

/// A `GROUP BY` over one or more columns.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    columns: Vec<Part>,
}

impl GroupBy {
    pub fn new<I, P>(columns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Render for GroupBy {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        Ok(format!(
            "GROUP BY {}",
            runner.render_list(&self.columns, ", ")?
        ))
    }
}

// ============================================================================
// Joins
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Left,
    Right,
}

/// `LEFT JOIN relation ON condition` or its right counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    kind: JoinKind,
    relation: Relation,
    on: Expression,
}

impl Join {
    pub fn left(relation: impl Into<Relation>, on: Expression) -> Self {
        Self {
            kind: JoinKind::Left,
            relation: relation.into(),
            on,
        }
    }

    pub fn right(relation: impl Into<Relation>, on: Expression) -> Self {
        Self {
            kind: JoinKind::Right,
            relation: relation.into(),
            on,
        }
    }
}

impl Render for Join {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let keyword = match self.kind {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        };
        Ok(format!(
            "{keyword} {} ON {}",
            self.relation.render(runner)?,
            self.on.render(runner)?
        ))
    }
}

// ============================================================================
// Clause
// ============================================================================

/// Any clause a SELECT can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Join(Join),
    Where(Where),
    GroupBy(GroupBy),
    OrderBy(OrderBy),
    Limit(u64),
    Offset(u64),
}

impl Clause {
    /// Position of this clause in a rendered statement.
    pub const fn rank(&self) -> u8 {
        match self {
            Clause::Join(_) => 0,
            Clause::Where(_) => 1,
            Clause::GroupBy(_) => 3,
            Clause::OrderBy(_) => 4,
            Clause::Limit(_) => 5,
            Clause::Offset(_) => 6,
        }
    }

    pub const fn is_where(&self) -> bool {
        matches!(self, Clause::Where(_))
    }

    pub const fn is_join(&self) -> bool {
        matches!(self, Clause::Join(_))
    }
}

impl Render for Clause {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        match self {
            Clause::Join(join) => join.render(runner),
            Clause::Where(clause) => clause.render(runner),
            Clause::GroupBy(clause) => clause.render(runner),
            Clause::OrderBy(clause) => clause.render(runner),
            Clause::Limit(n) => Ok(format!("LIMIT {n}")),
            Clause::Offset(n) => Ok(format!("OFFSET {n}")),
        }
    }
}

impl From<Where> for Clause {
    fn from(clause: Where) -> Self {
        Clause::Where(clause)
    }
}

impl From<OrderBy> for Clause {
    fn from(clause: OrderBy) -> Self {
        Clause::OrderBy(clause)
    }
}

impl From<GroupBy> for Clause {
    fn from(clause: GroupBy) -> Self {
        Clause::GroupBy(clause)
    }
}

impl From<Join> for Clause {
    fn from(clause: Join) -> Self {
        Clause::Join(clause)
    }
}

/// `LIMIT n`
pub fn limit(n: u64) -> Clause {
    Clause::Limit(n)
}

/// `OFFSET n`
pub fn offset(n: u64) -> Clause {
    Clause::Offset(n)
}
