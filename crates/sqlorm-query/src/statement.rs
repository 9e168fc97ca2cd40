//! SELECT, INSERT, UPDATE and DELETE statements.
//!
//! # Example
//!
//! ```ignore
//! use sqlorm_query::{Select, OrderBy, limit, where_};
//!
//! let s = Select::new(["id", "name"], ["person"])
//!     .clause(limit(10))
//!     .clause(OrderBy::new(["name"]))
//!     .clause(where_!["age > ", 18]);
//! assert_eq!(
//!     s.build_generic()?.0,
//!     "SELECT id, name FROM person WHERE age > 18 ORDER BY name LIMIT 10"
//! );
//! ```

use sqlorm_core::{Error, Result, SqlErrorKind};

use crate::clause::{Clause, Where};
use crate::expression::Part;
use crate::identifier::{Column, Relation};
use crate::runner::{Render, Runner};

// ============================================================================
// SELECT
// ============================================================================

/// A `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    columns: Vec<Part>,
    relations: Vec<Part>,
    clauses: Vec<Clause>,
}

impl Select {
    pub fn new<C, CP, R, RP>(columns: C, relations: R) -> Self
    where
        C: IntoIterator<Item = CP>,
        CP: Into<Part>,
        R: IntoIterator<Item = RP>,
        RP: Into<Part>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            relations: relations.into_iter().map(Into::into).collect(),
            clauses: Vec::new(),
        }
    }

    /// Add a clause.
    pub fn clause(mut self, clause: impl Into<Clause>) -> Self {
        self.clauses.push(clause.into());
        self
    }

    /// Add several clauses.
    pub fn clauses<I>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = Clause>,
    {
        self.clauses.extend(clauses);
        self
    }

    pub fn columns(&self) -> &[Part] {
        &self.columns
    }

    pub fn clause_list(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn has_join(&self) -> bool {
        self.clauses.iter().any(Clause::is_join)
    }

    /// `SELECT COUNT(*)` over the same relations, keeping only the clauses
    /// for which `keep` returns true.
    pub fn count_rows(&self, keep: impl Fn(&Clause) -> bool) -> Select {
        Select {
            columns: vec![Part::from("COUNT(*)")],
            relations: self.relations.clone(),
            clauses: self.clauses.iter().filter(|c| keep(*c)).cloned().collect(),
        }
    }
}

impl Render for Select {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            runner.render_list(&self.columns, ", ")?,
            runner.render_list(&self.relations, ", ")?
        );

        let mut clauses: Vec<&Clause> = self.clauses.iter().collect();
        clauses.sort_by_key(|c| c.rank());
        for clause in clauses {
            sql.push(' ');
            sql.push_str(&clause.render(runner)?);
        }
        Ok(sql)
    }
}

// ============================================================================
// INSERT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum InsertSource {
    Values(Vec<Vec<Part>>),
    Select(Box<Select>),
}

/// An `INSERT` of literal rows or of a sub-select.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    relation: Relation,
    columns: Vec<Column>,
    source: InsertSource,
}

impl Insert {
    /// `INSERT INTO relation(columns) VALUES (...), (...)`.
    ///
    /// Every row must have one value per column.
    pub fn values<C, R>(relation: impl Into<Relation>, columns: C, rows: R) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: Into<Column>,
        R: IntoIterator<Item = Vec<Part>>,
    {
        let columns: Vec<Column> = columns.into_iter().map(Into::into).collect();
        let rows: Vec<Vec<Part>> = rows.into_iter().collect();
        if rows.is_empty() {
            return Err(Error::sql(
                SqlErrorKind::ValueCount,
                "You must supply values to an insert statement",
            ));
        }
        if rows.iter().any(|row| row.len() != columns.len()) {
            return Err(Error::sql(
                SqlErrorKind::ValueCount,
                "You must provide exactly one value for each column",
            ));
        }
        Ok(Self {
            relation: relation.into(),
            columns,
            source: InsertSource::Values(rows),
        })
    }

    /// `INSERT INTO relation(columns) SELECT ...`.
    pub fn select<C>(relation: impl Into<Relation>, columns: C, select: Select) -> Self
    where
        C: IntoIterator,
        C::Item: Into<Column>,
    {
        Self {
            relation: relation.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            source: InsertSource::Select(Box::new(select)),
        }
    }
}

impl Render for Insert {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let head = format!(
            "INSERT INTO {}({})",
            self.relation.render(runner)?,
            runner.render_list(&self.columns, ", ")?
        );

        match &self.source {
            InsertSource::Select(select) => Ok(format!("{head} {}", select.render(runner)?)),
            InsertSource::Values(rows) => {
                let mut tuples = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut values = Vec::with_capacity(row.len());
                    for value in row {
                        let rendered = value.render(runner)?;
                        if matches!(value, Part::Expression(_)) {
                            values.push(format!("({rendered})"));
                        } else {
                            values.push(rendered);
                        }
                    }
                    tuples.push(format!("({})", values.join(", ")));
                }
                Ok(format!("{head} VALUES {}", tuples.join(", ")))
            }
        }
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// `UPDATE relation SET column = value, ... WHERE ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    relation: Relation,
    where_clause: Where,
    assignments: Vec<(Column, Part)>,
}

impl Update {
    /// `where_clause` accepts a [`Where`] or a bare expression, which is
    /// wrapped.
    pub fn new<A>(
        relation: impl Into<Relation>,
        where_clause: impl Into<Where>,
        assignments: A,
    ) -> Result<Self>
    where
        A: IntoIterator<Item = (Column, Part)>,
    {
        let assignments: Vec<(Column, Part)> = assignments.into_iter().collect();
        if assignments.is_empty() {
            return Err(Error::sql(
                SqlErrorKind::ValueCount,
                "An update statement needs at least one column to set",
            ));
        }
        Ok(Self {
            relation: relation.into(),
            where_clause: where_clause.into(),
            assignments,
        })
    }
}

impl Render for Update {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let mut sets = Vec::with_capacity(self.assignments.len());
        for (column, value) in &self.assignments {
            sets.push(format!(
                "{} = {}",
                column.render(runner)?,
                value.render(runner)?
            ));
        }
        Ok(format!(
            "UPDATE {} SET {} {}",
            self.relation.render(runner)?,
            sets.join(", "),
            self.where_clause.render(runner)?
        ))
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// `DELETE FROM relation [WHERE ...]`.
///
/// Without a WHERE clause this deletes every row.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    relation: Relation,
    where_clause: Option<Where>,
}

impl Delete {
    pub fn new(relation: impl Into<Relation>, where_clause: Option<Where>) -> Self {
        Self {
            relation: relation.into(),
            where_clause,
        }
    }
}

impl Render for Delete {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let relation = self.relation.render(runner)?;
        match &self.where_clause {
            Some(clause) => Ok(format!("DELETE FROM {relation} {}", clause.render(runner)?)),
            None => Ok(format!("DELETE FROM {relation}")),
        }
    }
}

// ============================================================================
// Statement
// ============================================================================

/// Any renderable statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// True for statements executed on the modify cursor.
    pub const fn is_modifying(&self) -> bool {
        !matches!(self, Statement::Select(_))
    }
}

impl Render for Statement {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        match self {
            Statement::Select(s) => s.render(runner),
            Statement::Insert(s) => s.render(runner),
            Statement::Update(s) => s.render(runner),
            Statement::Delete(s) => s.render(runner),
        }
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Statement::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(s: Insert) -> Self {
        Statement::Insert(s)
    }
}

impl From<Update> for Statement {
    fn from(s: Update) -> Self {
        Statement::Update(s)
    }
}

impl From<Delete> for Statement {
    fn from(s: Delete) -> Self {
        Statement::Delete(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::{GroupBy, OrderBy, limit, offset};
    use crate::literal::Literal;
    use crate::{expr, where_};

    #[test]
    fn test_clause_order_is_fixed() {
        let s = Select::new(["id"], ["person"])
            .clause(offset(20))
            .clause(limit(10))
            .clause(OrderBy::new(["lastname"]))
            .clause(GroupBy::new(["id"]))
            .clause(where_!["height > ", 150]);
        assert_eq!(
            s.build_generic().unwrap().0,
            "SELECT id FROM person WHERE height > 150 GROUP BY id ORDER BY lastname LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_count_rows_keeps_where_only() {
        let s = Select::new(["id", "name"], ["person"])
            .clause(OrderBy::new(["name"]))
            .clause(limit(1))
            .clause(where_!["id > ", 3]);
        let count = s.count_rows(Clause::is_where);
        assert_eq!(
            count.build_generic().unwrap().0,
            "SELECT COUNT(*) FROM person WHERE id > 3"
        );
    }

    #[test]
    fn test_insert_values() {
        let insert = Insert::values(
            "person",
            ["firstname", "height"],
            [
                vec![Part::from(Literal::string("Ann")), Part::from(170)],
                vec![Part::from(Literal::string("Bob")), Part::from(expr!["170", "+", 5])],
            ],
        )
        .unwrap();
        assert_eq!(
            insert.build_generic().unwrap().0,
            "INSERT INTO person(firstname, height) VALUES ('Ann', 170), ('Bob', (170 + 5))"
        );
    }

    #[test]
    fn test_insert_value_count_errors() {
        let none = Insert::values("person", ["a"], Vec::<Vec<Part>>::new()).unwrap_err();
        assert_eq!(
            none.to_string(),
            "SQL error: You must supply values to an insert statement"
        );
        let wrong = Insert::values("person", ["a", "b"], [vec![Part::from(1)]]).unwrap_err();
        assert!(matches!(wrong, Error::Sql(ref e) if e.kind == SqlErrorKind::ValueCount));
    }

    #[test]
    fn test_insert_select() {
        let insert = Insert::select(
            "archive",
            ["id"],
            Select::new(["id"], ["person"]).clause(where_!["height < ", 100]),
        );
        assert_eq!(
            insert.build_generic().unwrap().0,
            "INSERT INTO archive(id) SELECT id FROM person WHERE height < 100"
        );
    }

    #[test]
    fn test_update_wraps_expression() {
        let update = Update::new(
            "person",
            expr!["id = ", 1],
            [(Column::new("height"), Part::from(171))],
        )
        .unwrap();
        let statement = Statement::from(update);
        assert!(statement.is_modifying());
        assert_eq!(
            statement.build_generic().unwrap().0,
            "UPDATE person SET height = 171 WHERE id = 1"
        );
        assert!(Update::new("person", expr!["id = 1"], []).is_err());
    }

    #[test]
    fn test_delete_without_where_deletes_all() {
        assert_eq!(
            Delete::new("relation", None).build_generic().unwrap().0,
            "DELETE FROM relation"
        );
        assert_eq!(
            Delete::new("person", Some(where_!["id = ", 22]))
                .build_generic()
                .unwrap()
                .0,
            "DELETE FROM person WHERE id = 22"
        );
    }

    #[test]
    fn test_subquery_part() {
        let inner = Select::new(["person_id"], ["email"]);
        let s = Select::new(["*"], ["person"]).clause(where_!["id IN", inner]);
        assert_eq!(
            s.build_generic().unwrap().0,
            "SELECT * FROM person WHERE id IN (SELECT person_id FROM email)"
        );
    }
}
