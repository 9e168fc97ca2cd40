//! MySQL specific datatypes.

use sqlorm_core::{Error, Result, Value};
use sqlorm_query::{Literal, Part};
use sqlorm_schema::datatypes::convert_integer;
use sqlorm_schema::{Datatype, FieldContext, GeneratedKey, Slot};

/// `INTEGER AUTO_INCREMENT`, usually the primary key.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoIncrement;

impl Datatype for AutoIncrement {
    fn type_name(&self) -> &'static str {
        "auto_increment"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_integer(ctx, value)
    }

    fn has_default(&self) -> bool {
        true
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<()> {
        if current.is_set() {
            return Err(ctx.immutable("An auto_increment property is not mutable once it is set"));
        }
        Ok(())
    }

    fn accepts_expression(&self) -> bool {
        false
    }

    fn needs_post_insert_select(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<bool> {
        if current.is_set() {
            return Err(Error::ObjectAlreadyInserted(ctx.class.to_string()));
        }
        Ok(true)
    }

    fn generated_key(&self) -> Option<GeneratedKey> {
        Some(GeneratedKey::AutoIncrement)
    }
}

/// `BLOB`/`BINARY`: binary data, passed to the driver out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

impl Datatype for Binary {
    fn type_name(&self) -> &'static str {
        "binary"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bytes(_) => Ok(value),
            Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(ctx.type_error("binary data", &other)),
        }
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Ok(Part::Literal(match value {
            Value::Bytes(b) => Literal::Bytes(b.clone()),
            other => Literal::from_value(other)?,
        }))
    }
}

pub type Blob = Binary;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlorm_core::{Backend, BackendKind};
    use sqlorm_query::{Relation, Render};

    fn with_ctx<T>(f: impl FnOnce(&FieldContext<'_>) -> T) -> T {
        let relation = Relation::new("file");
        let ctx = FieldContext {
            class: "file",
            attribute: "attr",
            column: "attr",
            quoted: false,
            relation: &relation,
        };
        f(&ctx)
    }

    #[test]
    fn test_auto_increment_is_set_once() {
        with_ctx(|ctx| {
            let set = Slot::Set(Value::Int(9));
            assert!(AutoIncrement.check_assignment(ctx, &Slot::Unset).is_ok());
            assert!(AutoIncrement.check_assignment(ctx, &set).is_err());
            assert!(matches!(
                AutoIncrement.needs_post_insert_select(ctx, &set),
                Err(Error::ObjectAlreadyInserted(_))
            ));
        });
    }

    #[test]
    fn test_binary_goes_out_of_band() {
        with_ctx(|ctx| {
            let part = Binary.literal(ctx, &Value::Bytes(b"\x00abc".to_vec())).unwrap();
            let (sql, params) = part.build(Backend::for_kind(BackendKind::MySql)).unwrap();
            assert_eq!(sql, "%s");
            assert_eq!(params.len(), 1);
        });
    }
}
