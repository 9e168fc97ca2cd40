//! Identifiers: bare names, relations and columns.
//!
//! Equality ignores quoting. Two columns compare by relation and name when
//! both carry a relation and by name alone otherwise, so `person.id` equals
//! `id` but not `email.id`.

use std::fmt;
use std::hash::{Hash, Hasher};

use sqlorm_core::Result;

use crate::runner::{Render, Runner};

/// A name, optionally rendered with the backend's identifier quotes.
#[derive(Debug, Clone)]
pub struct Identifier {
    name: String,
    quoted: bool,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: false,
        }
    }

    /// An identifier that is always quoted, for names with spaces or
    /// reserved words.
    pub fn quoted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quoted: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Render for Identifier {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        if self.quoted {
            Ok(runner.backend().quote_identifier(&self.name))
        } else {
            Ok(self.name.clone())
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::new(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::new(name)
    }
}

/// A table or view, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    name: Identifier,
    schema: Option<Identifier>,
}

impl Relation {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<Identifier>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_ref().map(Identifier::name)
    }

    /// `schema.name` or `name`, unquoted.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema.name(), self.name.name()),
            None => self.name.name().to_string(),
        }
    }

    /// Column `name` qualified with this relation.
    pub fn column(&self, name: impl Into<Identifier>) -> Column {
        Column::new(name).of(self.clone())
    }
}

impl Render for Relation {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let name = self.name.render(runner)?;
        match &self.schema {
            Some(schema) => Ok(format!("{}.{name}", schema.render(runner)?)),
            None => Ok(name),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl From<&str> for Relation {
    fn from(name: &str) -> Self {
        Relation::new(name)
    }
}

impl From<String> for Relation {
    fn from(name: String) -> Self {
        Relation::new(name)
    }
}

/// A column name, optionally qualified with its relation.
#[derive(Debug, Clone)]
pub struct Column {
    name: Identifier,
    relation: Option<Relation>,
}

impl Column {
    pub fn new(name: impl Into<Identifier>) -> Self {
        Self {
            name: name.into(),
            relation: None,
        }
    }

    /// Qualify with `relation`.
    pub fn of(mut self, relation: impl Into<Relation>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.name()
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }

    /// The same column without relation qualification.
    pub fn unqualified(&self) -> Column {
        Column {
            name: self.name.clone(),
            relation: None,
        }
    }
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        match (&self.relation, &other.relation) {
            (Some(a), Some(b)) => a == b && self.name == other.name,
            _ => self.name == other.name,
        }
    }
}

impl Eq for Column {}

impl Hash for Column {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Render for Column {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        let name = self.name.render(runner)?;
        match &self.relation {
            Some(relation) => Ok(format!("{}.{name}", relation.render(runner)?)),
            None => Ok(name),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{relation}.{}", self.name),
            None => f.write_str(self.name.name()),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::new(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::new(name)
    }
}
