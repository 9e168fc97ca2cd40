//! Mapped classes: an ordered, static field registry bound to a relation.
//!
//! Classes are built once with [`DbClassBuilder`] and shared behind an
//! [`Arc`]. Inheritance composes the parent's registry with the child's
//! overrides at build time:
//!
//! ```ignore
//! let person = DbClass::builder("person")
//!     .field(Field::new("id", CommonSerial))
//!     .field(Field::new("firstname", Unicode::new()))
//!     .field(Field::new("lastname", Unicode::new()))
//!     .build()?;
//!
//! let employee = DbClass::builder("employee")
//!     .inherit(&person)
//!     .field(Field::new("salary", Integer))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use sqlorm_core::{Error, Result};
use sqlorm_query::{Column, GroupBy, Part, Relation};

use crate::datatype::{FieldContext, GeneratedKey};
use crate::field::Field;

/// A mapped class.
#[derive(Debug)]
pub struct DbClass {
    name: String,
    relation: Relation,
    fields: Vec<Field>,
    primary_key: Option<Vec<usize>>,
}

impl DbClass {
    pub fn builder(name: impl Into<String>) -> DbClassBuilder {
        DbClassBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> &Field {
        &self.fields[idx]
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of `attribute` in the registry.
    pub fn position(&self, attribute: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.attribute() == attribute)
            .ok_or_else(|| Error::NoSuchAttribute {
                class: self.name.clone(),
                attribute: attribute.to_string(),
            })
    }

    /// Position of the field stored in `column`.
    pub fn position_of_column(&self, column: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.column_name() == column)
            .ok_or_else(|| Error::NoSuchAttribute {
                class: self.name.clone(),
                attribute: column.to_string(),
            })
    }

    pub fn field_by_attribute(&self, attribute: &str) -> Result<&Field> {
        self.position(attribute).map(|idx| &self.fields[idx])
    }

    pub fn context(&self, idx: usize) -> FieldContext<'_> {
        let field = &self.fields[idx];
        FieldContext {
            class: &self.name,
            attribute: field.attribute(),
            column: field.column_name(),
            quoted: field.column_identifier().is_quoted(),
            relation: &self.relation,
        }
    }

    /// The column of field `idx`, qualified with the relation when `full`.
    pub fn column(&self, idx: usize, full: bool) -> Column {
        let column = Column::new(self.fields[idx].column_identifier());
        if full { column.of(self.relation.clone()) } else { column }
    }

    /// Primary key positions, in declaration order.
    pub fn primary_key(&self) -> Option<&[usize]> {
        self.primary_key.as_deref()
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }

    /// Fields that appear in a regular select, in registry order.
    pub fn select_fields(&self) -> Vec<usize> {
        (0..self.fields.len())
            .filter(|&idx| {
                self.fields[idx]
                    .datatype()
                    .select_part(&self.context(idx), false)
                    .is_some()
            })
            .collect()
    }

    /// Select list entries matching [`DbClass::select_fields`].
    pub fn select_parts(&self, full: bool) -> Vec<Part> {
        (0..self.fields.len())
            .filter_map(|idx| self.fields[idx].datatype().select_part(&self.context(idx), full))
            .collect()
    }

    /// `GROUP BY` over every stored column of the class.
    pub fn group_by_all(&self, full: bool) -> GroupBy {
        GroupBy::new(
            self.select_fields()
                .into_iter()
                .filter(|&idx| self.fields[idx].datatype().is_writable())
                .map(|idx| self.column(idx, full)),
        )
    }

    /// The field whose value the backend generates on insert, if any.
    pub fn generated_key(&self) -> Option<(usize, GeneratedKey)> {
        self.fields
            .iter()
            .enumerate()
            .find_map(|(idx, f)| f.datatype().generated_key().map(|key| (idx, key)))
    }
}

#[derive(Debug, Clone)]
enum KeySpec {
    /// `id` if the class has such an attribute
    Default,
    Explicit(Vec<String>),
    Inherited(Option<Vec<String>>),
    None,
}

/// Builder for [`DbClass`].
#[derive(Debug, Clone)]
pub struct DbClassBuilder {
    name: String,
    relation: Option<Relation>,
    schema: Option<String>,
    fields: Vec<Field>,
    primary_key: KeySpec,
}

impl DbClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relation: None,
            schema: None,
            fields: Vec::new(),
            primary_key: KeySpec::Default,
        }
    }

    /// Relation name; defaults to the lowercased class name.
    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relation = Some(Relation::new(name.into()));
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Start from `parent`'s fields, relation and primary key.
    ///
    /// Fields added afterwards with an attribute name the parent already
    /// uses replace the parent's field in place.
    pub fn inherit(mut self, parent: &DbClass) -> Self {
        for field in parent.fields() {
            self = self.field(field.clone());
        }
        if self.relation.is_none() {
            self.relation = Some(parent.relation().clone());
        }
        if matches!(self.primary_key, KeySpec::Default) {
            self.primary_key = KeySpec::Inherited(parent.primary_key().map(|positions| {
                positions
                    .iter()
                    .map(|&idx| parent.field(idx).attribute().to_string())
                    .collect()
            }));
        }
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter().position(|f| f.attribute() == field.attribute()) {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Explicit, possibly multi-column primary key.
    pub fn primary_key<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = KeySpec::Explicit(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_primary_key(mut self) -> Self {
        self.primary_key = KeySpec::None;
        self
    }

    pub fn build(self) -> Result<Arc<DbClass>> {
        if self.fields.is_empty() {
            return Err(Error::definition(format!("{} has no fields", self.name)));
        }

        let mut relation = self
            .relation
            .unwrap_or_else(|| Relation::new(self.name.to_lowercase()));
        if let Some(schema) = self.schema {
            relation = relation.with_schema(schema);
        }

        let mut columns: HashMap<&str, &str> = HashMap::new();
        for field in &self.fields {
            field.datatype().bind(field.attribute())?;
            if let Some(other) = columns.insert(field.column_name(), field.attribute()) {
                return Err(Error::definition(format!(
                    "{}: column {} is used by both {} and {}",
                    self.name,
                    field.column_name(),
                    other,
                    field.attribute()
                )));
            }
        }

        let key_attributes = match self.primary_key {
            KeySpec::Default => self
                .fields
                .iter()
                .any(|f| f.attribute() == "id")
                .then(|| vec!["id".to_string()]),
            KeySpec::Explicit(attributes) => Some(attributes),
            KeySpec::Inherited(attributes) => attributes,
            KeySpec::None => None,
        };

        let primary_key = match key_attributes {
            Some(attributes) if attributes.is_empty() => {
                return Err(Error::definition(format!(
                    "{}: a primary key needs at least one attribute",
                    self.name
                )));
            }
            Some(attributes) => Some(
                attributes
                    .iter()
                    .map(|attribute| {
                        self.fields
                            .iter()
                            .position(|f| f.attribute() == attribute)
                            .ok_or_else(|| Error::NoSuchAttribute {
                                class: self.name.clone(),
                                attribute: attribute.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };

        tracing::debug!(
            class = %self.name,
            relation = %relation,
            fields = self.fields.len(),
            "Built mapped class"
        );

        Ok(Arc::new(DbClass {
            name: self.name,
            relation,
            fields: self.fields,
            primary_key,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommonSerial, Integer, Unicode};
    use crate::wrappers::{Delayed, SqlExpression};
    use sqlorm_query::Render;

    fn person() -> Arc<DbClass> {
        DbClass::builder("Person")
            .field(Field::new("id", CommonSerial))
            .field(Field::new("firstname", Unicode::new()))
            .field(Field::new("lastname", Unicode::new()))
            .field(Field::new("height", Integer))
            .build()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let class = person();
        assert_eq!(class.relation().name(), "person");
        assert_eq!(class.primary_key(), Some(&[0][..]));
        assert_eq!(class.position("height").unwrap(), 3);
        assert!(matches!(
            class.position("age"),
            Err(Error::NoSuchAttribute { .. })
        ));
        assert_eq!(class.generated_key(), Some((0, GeneratedKey::CommonSerial)));
    }

    #[test]
    fn test_inheritance_overrides_in_place() {
        let parent = person();
        let child = DbClass::builder("Employee")
            .inherit(&parent)
            .field(Field::new("height", Unicode::new()))
            .field(Field::new("salary", Integer))
            .build()
            .unwrap();
        let names: Vec<&str> = child.fields().iter().map(Field::attribute).collect();
        assert_eq!(names, ["id", "firstname", "lastname", "height", "salary"]);
        assert_eq!(child.field(3).datatype().type_name(), "Unicode");
        assert_eq!(child.relation().name(), "person");
        assert_eq!(child.primary_key(), Some(&[0][..]));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = DbClass::builder("t")
            .field(Field::new("a", Integer))
            .field(Field::new("b", Integer).column("a"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Definition(_)));
    }

    #[test]
    fn test_common_serial_must_be_id() {
        let err = DbClass::builder("t")
            .field(Field::new("pk", CommonSerial))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be called 'id'"));
    }

    #[test]
    fn test_select_list_skips_delayed_and_aliases_expressions() {
        let class = DbClass::builder("doc")
            .schema("public")
            .field(Field::new("id", Integer))
            .field(Field::new("body", Delayed::new(Unicode::new())))
            .field(Field::new("words", SqlExpression::new(Integer, "length($relation.body)")))
            .build()
            .unwrap();
        assert_eq!(class.select_fields(), vec![0, 2]);
        let parts = class.select_parts(true);
        let rendered: Vec<String> = parts
            .iter()
            .map(|p| p.build_generic().unwrap().0)
            .collect();
        assert_eq!(
            rendered,
            ["public.doc.id", "(length(public.doc.body)) AS words"]
        );
        assert_eq!(
            class.group_by_all(false).build_generic().unwrap().0,
            "GROUP BY id"
        );
    }

    #[test]
    fn test_explicit_multi_column_key() {
        let class = DbClass::builder("membership")
            .field(Field::new("group_id", Integer))
            .field(Field::new("user_id", Integer))
            .primary_key(["group_id", "user_id"])
            .build()
            .unwrap();
        assert_eq!(class.primary_key(), Some(&[0, 1][..]));
        let err = DbClass::builder("x")
            .field(Field::new("a", Integer))
            .primary_key(["b"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchAttribute { .. }));
    }
}
