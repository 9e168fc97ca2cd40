//! How a datasource talks to PostgreSQL.

use sqlorm_core::{ConnectParams, Error, QueryErrorKind};
use sqlorm_query::{Column, Part, Relation, Where};
use sqlorm_schema::{DbClass, GeneratedKey};

/// Query for the name of the current database's encoding.
pub const ENCODING_QUERY: &str = "SELECT pg_catalog.pg_encoding_to_char(encoding) \
     FROM pg_catalog.pg_database WHERE datname = current_database()";

/// Consecutive connectivity failures tolerated before reconnecting.
pub const DEFAULT_RECONNECT_THRESHOLD: u32 = 50;

/// Substring of the backend message for unique constraint violations.
pub const DUPLICATE_KEY_MARKER: &str = "duplicate key";

/// Map connection string keywords onto libpq keywords.
pub fn connect_params(mut params: ConnectParams) -> ConnectParams {
    params.rename("db", "dbname");
    params
}

/// Name of the sequence PostgreSQL creates for a serial `column`.
pub fn default_sequence(relation: &Relation, column: &str) -> String {
    match relation.schema() {
        Some(schema) => format!("{schema}.{}_{column}_seq", relation.name()),
        None => format!("{}_{column}_seq", relation.name()),
    }
}

/// `WHERE` identifying the row just inserted through the sequence behind a
/// single-column serial primary key, `None` if the key is not a serial.
pub fn post_insert_where(class: &DbClass) -> Option<Where> {
    let &[idx] = class.primary_key()? else {
        return None;
    };
    let field = class.field(idx);
    let sequence = match field.datatype().generated_key()? {
        GeneratedKey::CommonSerial | GeneratedKey::Serial { sequence: None } => {
            default_sequence(class.relation(), field.column_name())
        }
        GeneratedKey::Serial {
            sequence: Some(sequence),
        } => sequence,
        GeneratedKey::AutoIncrement => return None,
    };
    tracing::trace!(class = class.name(), sequence = %sequence, "Post-insert row via currval()");
    Some(Where::from_parts([
        Part::Column(Column::new(field.column_identifier())),
        Part::from("="),
        Part::Text(format!("currval('{sequence}')")),
    ]))
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
    use crate::datatypes::Serial;
    use sqlorm_query::Render;
    use sqlorm_schema::datatypes::{CommonSerial, Integer};
    use sqlorm_schema::Field;

    #[test]
    fn test_db_keyword_renamed() {
        let params = connect_params(ConnectParams::new().with("db", "shop").with("user", "ann"));
        assert_eq!(params.get("dbname"), Some("shop"));
        assert!(!params.contains("db"));
    }

    #[test]
    fn test_common_serial_uses_relation_sequence() {
        let class = DbClass::builder("person")
            .schema("hr")
            .field(Field::new("id", CommonSerial))
            .build()
            .unwrap();
        let w = post_insert_where(&class).unwrap();
        assert_eq!(
            w.build_generic().unwrap().0,
            "WHERE id = currval('hr.person_id_seq')"
        );
    }

    #[test]
    fn test_named_sequence() {
        let class = DbClass::builder("invoice")
            .field(Field::new("number", Serial::with_sequence("invoice_numbers")))
            .primary_key(["number"])
            .build()
            .unwrap();
        let w = post_insert_where(&class).unwrap();
        assert_eq!(
            w.build_generic().unwrap().0,
            "WHERE number = currval('invoice_numbers')"
        );
    }

    #[test]
    fn test_plain_key_has_no_sequence() {
        let class = DbClass::builder("t")
            .field(Field::new("id", Integer))
            .build()
            .unwrap();
        assert!(post_insert_where(&class).is_none());
    }

    #[test]
    fn test_error_classification() {
        let dup = classify_error(Error::programming(
            "duplicate key value violates unique constraint \"person_pkey\"",
        ));
        assert!(dup.is_duplicate_key());
        let other = classify_error(Error::programming("syntax error at or near \"SELEC\""));
        assert!(matches!(other, Error::Query(ref q) if q.kind == QueryErrorKind::Backend));
    }
}
