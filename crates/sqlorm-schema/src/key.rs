//! Primary and foreign keys.

use std::fmt;
use std::sync::Arc;

use sqlorm_core::{Error, Result, Value};
use sqlorm_query::{Column, Expression, Where};

use crate::class::DbClass;
use crate::object::DbObject;

/// An ordered, non-empty set of fields of one class.
#[derive(Clone)]
pub struct Key {
    class: Arc<DbClass>,
    fields: Vec<usize>,
    qualified: bool,
}

impl Key {
    pub fn new<I, S>(class: &Arc<DbClass>, attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = attributes
            .into_iter()
            .map(|a| class.position(a.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if fields.is_empty() {
            return Err(Error::definition(format!(
                "a key of {} needs at least one attribute",
                class.name()
            )));
        }
        Ok(Self {
            class: Arc::clone(class),
            fields,
            qualified: false,
        })
    }

    /// The class's primary key.
    pub fn primary(class: &Arc<DbClass>) -> Result<Self> {
        let fields = class
            .primary_key()
            .ok_or_else(|| Error::NoPrimaryKey(class.name().to_string()))?;
        Ok(Self {
            class: Arc::clone(class),
            fields: fields.to_vec(),
            qualified: false,
        })
    }

    /// Qualify key columns with the relation, for statements with joins.
    pub fn qualified(mut self) -> Self {
        self.qualified = true;
        self
    }

    pub fn class(&self) -> &Arc<DbClass> {
        &self.class
    }

    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(|&idx| self.class.field(idx).attribute())
            .collect()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.fields
            .iter()
            .map(|&idx| self.class.column(idx, self.qualified))
            .collect()
    }

    /// True if every key attribute of `obj` holds a value.
    pub fn is_complete(&self, obj: &DbObject) -> bool {
        self.fields.iter().all(|&idx| obj.value_at(idx).is_some())
    }

    /// Current key values of `obj`.
    pub fn values(&self, obj: &DbObject) -> Result<Vec<Value>> {
        self.fields
            .iter()
            .map(|&idx| obj.value_at(idx).ok_or_else(|| self.not_set()))
            .collect()
    }

    /// `WHERE` identifying the row of `obj`.
    pub fn where_clause(&self, obj: &DbObject) -> Result<Where> {
        let mut equalities = Vec::with_capacity(self.fields.len());
        for &idx in &self.fields {
            let value = obj.value_at(idx).ok_or_else(|| self.not_set())?;
            equalities.push((idx, value));
        }
        self.conjunction(equalities)
    }

    /// `WHERE` for explicit key values, converted by the key's datatypes.
    pub fn where_for_values(&self, values: &[Value]) -> Result<Where> {
        if values.len() != self.fields.len() {
            return Err(Error::IllegalPrimaryKey {
                class: self.class.name().to_string(),
                expected: self.fields.len(),
            });
        }
        let mut equalities = Vec::with_capacity(values.len());
        for (&idx, value) in self.fields.iter().zip(values) {
            let ctx = self.class.context(idx);
            let native = self.class.field(idx).datatype().convert(&ctx, value.clone())?;
            equalities.push((idx, native));
        }
        self.conjunction(equalities)
    }

    fn conjunction(&self, equalities: Vec<(usize, Value)>) -> Result<Where> {
        let mut expression = Expression::default();
        for (idx, value) in equalities {
            if !expression.is_empty() {
                expression.push("AND");
            }
            expression.push(self.class.column(idx, self.qualified));
            if value.is_null() {
                expression.push("IS NULL");
            } else {
                let ctx = self.class.context(idx);
                expression.push("=");
                expression.push(self.class.field(idx).datatype().literal(&ctx, &value)?);
            }
        }
        Ok(Where::new(expression))
    }

    fn not_set(&self) -> Error {
        Error::KeyNotSet {
            class: self.class.name().to_string(),
            key: self.attribute_names().join(", "),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("class", &self.class.name())
            .field("attributes", &self.attribute_names())
            .finish()
    }
}

/// Fields of one class referencing the primary key of another.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    source: Key,
    target: Key,
}

impl ForeignKey {
    pub fn new<I, S>(class: &Arc<DbClass>, attributes: I, target: &Arc<DbClass>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source = Key::new(class, attributes)?;
        let target = Key::primary(target)?;
        if source.len() != target.len() {
            return Err(Error::IllegalForeignKey(format!(
                "{}({}) has {} columns but the primary key of {} has {}",
                class.name(),
                source.attribute_names().join(", "),
                source.len(),
                target.class().name(),
                target.len()
            )));
        }
        Ok(Self { source, target })
    }

    pub fn source(&self) -> &Key {
        &self.source
    }

    pub fn target(&self) -> &Key {
        &self.target
    }

    /// `WHERE` selecting the row `obj` refers to.
    pub fn target_where(&self, obj: &DbObject) -> Result<Where> {
        let values = self.source.values(obj)?;
        self.target.where_for_values(&values)
    }

    /// `WHERE` selecting the rows of the source class that refer to `target`.
    pub fn referrers_where(&self, target: &DbObject) -> Result<Where> {
        let values = self.target.values(target)?;
        self.source.where_for_values(&values)
    }
}
