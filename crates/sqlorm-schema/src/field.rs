//! A datatype bound to an attribute and a column.

use std::fmt;
use std::sync::Arc;

use sqlorm_core::Validator;
use sqlorm_query::Identifier;

use crate::datatype::Datatype;

/// One attribute of a mapped class.
///
/// ```ignore
/// let name = Field::new("name", Unicode::varchar(60))
///     .column("person_name")
///     .validator(Validator::NotEmpty);
/// ```
#[derive(Clone)]
pub struct Field {
    attribute: String,
    column: Option<Identifier>,
    title: Option<String>,
    datatype: Arc<dyn Datatype>,
    validators: Vec<Validator>,
}

impl Field {
    pub fn new(attribute: impl Into<String>, datatype: impl Datatype + 'static) -> Self {
        Self::from_arc(attribute, Arc::new(datatype))
    }

    pub fn from_arc(attribute: impl Into<String>, datatype: Arc<dyn Datatype>) -> Self {
        Self {
            attribute: attribute.into(),
            column: None,
            title: None,
            datatype,
            validators: Vec::new(),
        }
    }

    /// Store the attribute in a column of a different name.
    pub fn column(mut self, column: impl Into<Identifier>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Quote the column name on every backend.
    pub fn quoted(mut self) -> Self {
        let name = self.column_name().to_string();
        self.column = Some(Identifier::quoted(name));
        self
    }

    /// Human readable name for forms and messages.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The column name: the explicit one, the datatype's default, or the
    /// attribute name.
    pub fn column_name(&self) -> &str {
        match &self.column {
            Some(column) => column.name(),
            None => self.datatype.default_column().unwrap_or(&self.attribute),
        }
    }

    pub fn column_identifier(&self) -> Identifier {
        self.column
            .clone()
            .unwrap_or_else(|| Identifier::new(self.column_name()))
    }

    pub fn title_or_attribute(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.attribute)
    }

    pub fn datatype(&self) -> &dyn Datatype {
        self.datatype.as_ref()
    }

    /// Type validators followed by field validators.
    pub fn validators(&self) -> Vec<Validator> {
        let mut all = self.datatype.validators();
        all.extend(self.validators.iter().cloned());
        all
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("attribute", &self.attribute)
            .field("column", &self.column_name())
            .field("datatype", &self.datatype.type_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{CommonSerial, Text};

    #[test]
    fn test_column_name_resolution() {
        assert_eq!(Field::new("name", Text::new()).column_name(), "name");
        assert_eq!(Field::new("name", Text::new()).column("nm").column_name(), "nm");
        assert_eq!(Field::new("id", CommonSerial).column_name(), "id");
    }

    #[test]
    fn test_type_validators_come_first() {
        let field = Field::new("name", Text::varchar(10)).validator(Validator::NotEmpty);
        assert_eq!(
            field.validators(),
            vec![Validator::length(10), Validator::NotEmpty]
        );
    }

    #[test]
    fn test_quoted_column() {
        let field = Field::new("order", Text::new()).quoted();
        assert!(field.column_identifier().is_quoted());
        assert_eq!(field.title_or_attribute(), "order");
    }
}
