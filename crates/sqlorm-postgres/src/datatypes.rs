//! PostgreSQL specific datatypes.

use std::sync::LazyLock;

use regex::Regex;
use sqlorm_core::{Error, Result, TextEncoding, Validator, Value};
use sqlorm_query::{Literal, Part};
use sqlorm_schema::datatypes::convert_integer;
use sqlorm_schema::{Datatype, FieldContext, GeneratedKey, Slot};

/// `SERIAL` column, backed by a sequence.
///
/// The value may be assigned once, on a new object. Without an explicit
/// sequence name the one PostgreSQL creates for the column is used.
#[derive(Debug, Clone, Default)]
pub struct Serial {
    sequence: Option<String>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(sequence: impl Into<String>) -> Self {
        Self {
            sequence: Some(sequence.into()),
        }
    }
}

impl Datatype for Serial {
    fn type_name(&self) -> &'static str {
        "serial"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_integer(ctx, value)
    }

    fn has_default(&self) -> bool {
        true
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, current: &Slot) -> Result<()> {
        if current.is_set() {
            return Err(ctx.immutable("A serial property is not mutable once it is set"));
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
        Some(GeneratedKey::Serial {
            sequence: self.sequence.clone(),
        })
    }
}

/// `INET`: an IPv4 address with optional netmask, stored as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inet;

impl Datatype for Inet {
    fn type_name(&self) -> &'static str {
        "inet"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Text(_) => Ok(value),
            other => Err(ctx.type_error("IP address text", &other)),
        }
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Ok(Part::Literal(match value {
            Value::Text(s) => Literal::String(s.clone()),
            other => Literal::from_value(other)?,
        }))
    }

    fn validators(&self) -> Vec<Validator> {
        vec![Validator::IpAddress]
    }
}

static POINT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\(?\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)?$").ok()
});

fn parse_point(text: &str) -> Option<(f64, f64)> {
    let captures = POINT_RE.as_ref()?.captures(text.trim())?;
    let x = captures.get(1)?.as_str().parse().ok()?;
    let y = captures.get(2)?.as_str().parse().ok()?;
    Some((x, y))
}

/// `POINT`: a pair of floats.
///
/// Accepts a point, a two element array of numbers, or the PostgreSQL text
/// form `(x,y)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Point;

impl Datatype for Point {
    fn type_name(&self) -> &'static str {
        "point"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Point(..) => Ok(value),
            Value::Text(ref s) if s.is_empty() => Ok(Value::Null),
            Value::Text(ref s) => parse_point(s)
                .map(|(x, y)| Value::Point(x, y))
                .ok_or_else(|| ctx.conversion_error(format!("{} is not a point", value.repr()))),
            Value::Array(ref items) => match items.as_slice() {
                [x, y] => match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => Ok(Value::Point(x, y)),
                    _ => Err(ctx.type_error("pair of numbers", &value)),
                },
                _ => Err(ctx.conversion_error("A point is represented by a pair of floats.")),
            },
            other => Err(ctx.type_error("pair of numbers", &other)),
        }
    }
}

/// `BYTEA`: binary data, passed to the driver out of band.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bytea;

impl Datatype for Bytea {
    fn type_name(&self) -> &'static str {
        "bytea"
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

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, _encoding: &TextEncoding) -> Result<Value> {
        match value {
            Value::Text(s) if s.starts_with("\\x") => decode_hex(&s[2..])
                .map(Value::Bytes)
                .ok_or_else(|| ctx.conversion_error("malformed bytea hex output")),
            other => self.convert(ctx, other),
        }
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Alias used by schemas written for other backends.
pub type Blob = Bytea;
