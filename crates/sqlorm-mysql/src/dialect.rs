//! How a datasource talks to MySQL.

use sqlorm_core::{ConnectParams, Error, QueryErrorKind, Result};
use sqlorm_query::{Column, Part, Where};
use sqlorm_schema::{DbClass, GeneratedKey};

use crate::config::MySqlConfig;

/// Substring of the backend message for unique constraint violations.
pub const DUPLICATE_KEY_MARKER: &str = "Duplicate entry";

/// Map connection string keywords onto the driver's keywords.
pub fn connect_params(params: &ConnectParams) -> Result<ConnectParams> {
    Ok(MySqlConfig::from_params(params)?.to_params())
}

/// `WHERE` identifying the row just inserted through `LAST_INSERT_ID()`,
/// `None` if the single-column primary key is not generated.
pub fn post_insert_where(class: &DbClass) -> Option<Where> {
    let &[idx] = class.primary_key()? else {
        return None;
    };
    let field = class.field(idx);
    match field.datatype().generated_key()? {
        GeneratedKey::AutoIncrement | GeneratedKey::CommonSerial => {
            tracing::trace!(class = class.name(), "Post-insert row via LAST_INSERT_ID()");
            Some(Where::from_parts([
                Part::Column(Column::new(field.column_identifier())),
                Part::from("= LAST_INSERT_ID()"),
            ]))
        }
        GeneratedKey::Serial { .. } => None,
    }
}

/// Turn a raw programming error into a duplicate-key or backend error.
pub fn classify_error(error: Error) -> Error {
    match error {
        Error::Query(mut query) if query.kind == QueryErrorKind::Programming => {
            query.kind = if query.message.contains(DUPLICATE_KEY_MARKER) {
                QueryErrorKind::DuplicateKey
            } else {
                QueryErrorKind::Backend
            };
            Error::Query(query)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::AutoIncrement;
    use sqlorm_core::{Backend, BackendKind};
    use sqlorm_query::Render;
    use sqlorm_schema::Field;
    use sqlorm_schema::datatypes::Unicode;

    #[test]
    fn test_last_insert_id() {
        let class = DbClass::builder("file")
            .field(Field::new("id", AutoIncrement))
            .field(Field::new("name", Unicode::new()))
            .build()
            .unwrap();
        let w = post_insert_where(&class).unwrap();
        let (sql, _) = w.build(Backend::for_kind(BackendKind::MySql)).unwrap();
        assert_eq!(sql, "WHERE id = LAST_INSERT_ID()");
    }

    #[test]
    fn test_duplicate_entry() {
        let err = classify_error(Error::programming("Duplicate entry '1' for key 'PRIMARY'"));
        assert!(err.is_duplicate_key());
    }
}
