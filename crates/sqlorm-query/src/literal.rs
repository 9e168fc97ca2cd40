//! Native values rendered as SQL literals.
//!
//! Each variant encodes exactly one conversion rule. Values that are not
//! interpolated into the SQL text ([`Literal::Bytes`], [`Literal::Direct`])
//! are pushed onto the runner and replaced by the backend's placeholder.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlorm_core::{Error, Result, SqlErrorKind, Value};

use crate::runner::{Render, Runner};

/// A single SQL literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    /// ASCII-only text
    String(String),
    /// Text that must be representable in the backend encoding
    Unicode(String),
    Bool(bool),
    Null,
    /// Binary data, passed out of band
    Bytes(Vec<u8>),
    /// Any value the driver should bind itself
    Direct(Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Point(f64, f64),
}

impl Literal {
    pub fn string(text: impl Into<String>) -> Self {
        Literal::String(text.into())
    }

    pub fn unicode(text: impl Into<String>) -> Self {
        Literal::Unicode(text.into())
    }

    /// Literal for a scalar native value. Text becomes a Unicode literal.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Int(i) => Literal::Integer(*i),
            Value::Float(f) => Literal::Float(*f),
            Value::Text(s) => Literal::Unicode(s.clone()),
            Value::Bytes(b) => Literal::Bytes(b.clone()),
            Value::Date(d) => Literal::Date(*d),
            Value::Time(t) => Literal::Time(*t),
            Value::Timestamp(ts) => Literal::Timestamp(*ts),
            Value::Point(x, y) => Literal::Point(*x, *y),
            Value::Array(_) | Value::Json(_) => {
                return Err(Error::sql(
                    SqlErrorKind::InvalidLiteral,
                    format!("no SQL literal for {} values", value.type_name()),
                ));
            }
        })
    }
}

fn quoted(runner: &Runner, text: &str) -> String {
    let backend = runner.backend();
    backend.quote_string(&backend.escape_string(text))
}

impl Render for Literal {
    fn render(&self, runner: &mut Runner) -> Result<String> {
        match self {
            Literal::Integer(i) => Ok(i.to_string()),
            Literal::Float(f) => {
                if !f.is_finite() {
                    return Err(Error::sql(
                        SqlErrorKind::InvalidLiteral,
                        format!("{f} cannot be represented as an SQL number"),
                    ));
                }
                let mut text = f.to_string();
                if !text.contains('.') {
                    text.push_str(".0");
                }
                Ok(text)
            }
            Literal::String(text) => {
                if !text.is_ascii() {
                    return Err(Error::sql(
                        SqlErrorKind::InvalidLiteral,
                        format!("string literal {text:?} needs a Unicode literal"),
                    ));
                }
                Ok(quoted(runner, text))
            }
            Literal::Unicode(text) => {
                if !runner.encoding().can_encode(text) {
                    return Err(Error::Encoding(format!(
                        "{text:?} cannot be represented in the backend encoding {}",
                        runner.encoding()
                    )));
                }
                Ok(quoted(runner, text))
            }
            Literal::Bool(true) => Ok("TRUE".to_string()),
            Literal::Bool(false) => Ok("FALSE".to_string()),
            Literal::Null => Ok("NULL".to_string()),
            Literal::Bytes(bytes) => Ok(runner.push_param(Value::Bytes(bytes.clone())).to_string()),
            Literal::Direct(value) => Ok(runner.push_param(value.clone()).to_string()),
            Literal::Date(d) => Ok(quoted(runner, &d.format("%Y-%m-%d").to_string())),
            Literal::Time(t) => Ok(quoted(runner, &t.format("%H:%M:%S").to_string())),
            Literal::Timestamp(ts) => Ok(quoted(
                runner,
                &ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            Literal::Point(x, y) => Ok(format!("POINT( {x:.6}, {y:.6} )")),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Integer(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Integer(i64::from(v))
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlorm_core::{Backend, BackendKind, TextEncoding};

    fn pg() -> &'static Backend {
        Backend::for_kind(BackendKind::Postgres)
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Literal::Integer(-3).build(pg()).unwrap().0, "-3");
        assert_eq!(Literal::Float(2.0).build(pg()).unwrap().0, "2.0");
        assert_eq!(Literal::Float(0.25).build(pg()).unwrap().0, "0.25");
        assert!(Literal::Float(f64::NAN).build(pg()).is_err());
    }

    #[test]
    fn test_string_literal_rejects_non_ascii() {
        assert_eq!(Literal::string("Ann").build(pg()).unwrap().0, "'Ann'");
        let err = Literal::string("Jürgen").build(pg()).unwrap_err();
        assert!(matches!(err, Error::Sql(ref e) if e.kind == SqlErrorKind::InvalidLiteral));
    }

    #[test]
    fn test_unicode_literal_checks_encoding() {
        let literal = Literal::unicode("Jürgen");
        assert_eq!(literal.build(pg()).unwrap().0, "'Jürgen'");

        let mut ascii = Runner::new(pg()).with_encoding(TextEncoding::Ascii);
        assert!(matches!(literal.render(&mut ascii), Err(Error::Encoding(_))));

        let mut latin1 = Runner::new(pg()).with_encoding(TextEncoding::Latin1);
        assert_eq!(literal.render(&mut latin1).unwrap(), "'Jürgen'");
    }

    #[test]
    fn test_bytes_go_out_of_band() {
        let (sql, params) = Literal::Bytes(vec![0, 1, 2]).build(pg()).unwrap();
        assert_eq!(sql, "%s");
        assert_eq!(params, vec![Value::Bytes(vec![0, 1, 2])]);

        let gadfly = Backend::for_kind(BackendKind::Gadfly);
        let (sql, _) = Literal::Direct(Value::Int(1)).build(gadfly).unwrap();
        assert_eq!(sql, "?");
    }

    #[test]
    fn test_temporal_and_misc() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Literal::Date(date).build(pg()).unwrap().0, "'2024-02-29'");
        let ts = date.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(
            Literal::Timestamp(ts).build(pg()).unwrap().0,
            "'2024-02-29 13:05:00'"
        );
        assert_eq!(Literal::Bool(false).build(pg()).unwrap().0, "FALSE");
        assert_eq!(Literal::Null.build(pg()).unwrap().0, "NULL");
        assert_eq!(
            Literal::Point(1.0, -2.5).build(pg()).unwrap().0,
            "POINT( 1.000000, -2.500000 )"
        );
    }

    #[test]
    fn test_from_value_rejects_sequences() {
        assert_eq!(
            Literal::from_value(&Value::from("x")).unwrap(),
            Literal::Unicode("x".to_string())
        );
        assert!(Literal::from_value(&Value::Array(vec![])).is_err());
    }
}
