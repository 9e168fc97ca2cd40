//! Portable column datatypes.
//!
//! Backend specific datatypes (PostgreSQL `SERIAL`, MySQL `AUTO_INCREMENT`,
//! binary columns) live in the adapter crates.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlorm_core::{Error, Result, TextEncoding, ValidationError, ValidationErrorKind, Validator, Value};
use sqlorm_query::{Literal, Part};

use crate::datatype::{Datatype, FieldContext, GeneratedKey, Slot};

// ============================================================================
// Numbers
// ============================================================================

/// Integer conversion shared by every integer-backed datatype.
pub fn convert_integer(ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
    match value {
        Value::Null | Value::Int(_) => Ok(value),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Text(ref s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ctx.type_error("integer", &value)),
        other => Err(ctx.type_error("integer", &other)),
    }
}

/// `INTEGER` and friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl Integer {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Integer {
    fn type_name(&self) -> &'static str {
        "integer"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_integer(ctx, value)
    }
}

/// `FLOAT`, `REAL`, `DOUBLE PRECISION`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float;

impl Float {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Float {
    fn type_name(&self) -> &'static str {
        "float"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Float(_) => Ok(value),
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::Text(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ctx.type_error("float", &value)),
            other => Err(ctx.type_error("float", &other)),
        }
    }
}

// ============================================================================
// Text
// ============================================================================

fn convert_text(ctx: &FieldContext<'_>, value: Value, null_on_empty: bool) -> Result<Value> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::Text(s) => s,
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(b) => String::from_utf8(b)
            .map_err(|e| ctx.conversion_error(format!("binary data is not utf-8 text: {e}")))?,
        other => return Err(ctx.type_error("text", &other)),
    };
    if null_on_empty && text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::Text(text))
}

/// ASCII text column (`TEXT`, `VARCHAR(n)`, `CHAR(n)`).
///
/// Values are rendered as plain string literals, which reject non-ASCII
/// text; use [`Unicode`] for anything else.
#[derive(Debug, Clone, Default)]
pub struct Text {
    max_length: Option<usize>,
    null_on_empty: bool,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// `VARCHAR(max_length)`: values longer than `max_length` are rejected.
    pub fn varchar(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            null_on_empty: false,
        }
    }

    /// Store NULL instead of blank strings.
    pub fn null_on_empty(mut self) -> Self {
        self.null_on_empty = true;
        self
    }
}

impl Datatype for Text {
    fn type_name(&self) -> &'static str {
        if self.max_length.is_some() { "varchar" } else { "string" }
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_text(ctx, value, self.null_on_empty)
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Ok(Part::Literal(match value {
            Value::Text(s) => Literal::String(s.clone()),
            other => Literal::from_value(other)?,
        }))
    }

    fn validators(&self) -> Vec<Validator> {
        self.max_length.map(Validator::length).into_iter().collect()
    }
}

/// Text in any script, checked against and decoded with the backend's
/// encoding.
#[derive(Debug, Clone, Default)]
pub struct Unicode {
    max_length: Option<usize>,
    null_on_empty: bool,
}

impl Unicode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varchar(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            null_on_empty: false,
        }
    }

    pub fn null_on_empty(mut self) -> Self {
        self.null_on_empty = true;
        self
    }
}

impl Datatype for Unicode {
    fn type_name(&self) -> &'static str {
        "Unicode"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_text(ctx, value, self.null_on_empty)
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Ok(Part::Literal(match value {
            Value::Text(s) => Literal::Unicode(s.clone()),
            other => Literal::from_value(other)?,
        }))
    }

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, encoding: &TextEncoding) -> Result<Value> {
        match value {
            Value::Bytes(raw) => Ok(Value::Text(encoding.decode(&raw)?)),
            other => self.convert(ctx, other),
        }
    }

    fn validators(&self) -> Vec<Validator> {
        self.max_length.map(Validator::length).into_iter().collect()
    }
}

/// A text column restricted to a fixed set of values.
#[derive(Debug, Clone)]
pub struct Enum {
    values: Vec<String>,
}

impl Enum {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Datatype for Enum {
    fn type_name(&self) -> &'static str {
        "enum"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        let converted = convert_text(ctx, value, false)?;
        let Some(text) = converted.as_str() else {
            return Ok(converted);
        };
        if self.values.iter().any(|v| v == text) {
            return Ok(converted);
        }
        Err(Error::Validation(ValidationError {
            kind: ValidationErrorKind::Enum,
            class: ctx.class.to_string(),
            attribute: ctx.attribute.to_string(),
            value: converted.repr(),
            message: format!(
                "{} is not one of {} ({}.{})",
                converted.repr(),
                self.values.join(", "),
                ctx.class,
                ctx.attribute
            ),
        }))
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        Ok(Part::Literal(match value {
            Value::Text(s) => Literal::String(s.clone()),
            other => Literal::from_value(other)?,
        }))
    }
}

// ============================================================================
// Boolean and temporal
// ============================================================================

/// `BOOLEAN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl Boolean {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Boolean {
    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Bool(_) => Ok(value),
            Value::Int(i) => Ok(Value::Bool(i != 0)),
            Value::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "t" | "true" | "y" | "yes" | "1" => Ok(Value::Bool(true)),
                "f" | "false" | "n" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(ctx.type_error("boolean", &value)),
            },
            other => Err(ctx.type_error("boolean", &other)),
        }
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// `TIMESTAMP` without time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTime;

impl DateTime {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for DateTime {
    fn type_name(&self) -> &'static str {
        "datetime"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Timestamp(_) => Ok(value),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(Value::Timestamp)
                .ok_or_else(|| ctx.type_error("datetime", &value)),
            Value::Text(ref s) => parse_datetime(s)
                .map(Value::Timestamp)
                .ok_or_else(|| ctx.type_error("datetime", &value)),
            other => Err(ctx.type_error("datetime", &other)),
        }
    }
}

/// `DATE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Date;

impl Date {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Date {
    fn type_name(&self) -> &'static str {
        "date"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Date(_) => Ok(value),
            Value::Timestamp(ts) => Ok(Value::Date(ts.date())),
            Value::Text(ref s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| parse_datetime(s).map(|ts| ts.date()))
                .map(Value::Date)
                .ok_or_else(|| ctx.type_error("date", &value)),
            other => Err(ctx.type_error("date", &other)),
        }
    }
}

/// `TIME` without time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct Time;

impl Time {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Time {
    fn type_name(&self) -> &'static str {
        "time"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Time(_) => Ok(value),
            Value::Timestamp(ts) => Ok(Value::Time(ts.time())),
            Value::Text(ref s) => ["%H:%M:%S%.f", "%H:%M"]
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok())
                .map(Value::Time)
                .ok_or_else(|| ctx.type_error("time", &value)),
            other => Err(ctx.type_error("time", &other)),
        }
    }
}

// ============================================================================
// Structured text
// ============================================================================

/// A structured document stored as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Json {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Json {
    fn type_name(&self) -> &'static str {
        "json"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null | Value::Json(_) => Ok(value),
            Value::Text(ref s) => serde_json::from_str(s)
                .map(Value::Json)
                .map_err(|e| ctx.conversion_error(format!("invalid JSON document: {e}"))),
            Value::Bool(b) => Ok(Value::Json(serde_json::Value::Bool(b))),
            Value::Int(i) => Ok(Value::Json(serde_json::Value::from(i))),
            Value::Float(f) => Ok(Value::Json(serde_json::Value::from(f))),
            other => Err(ctx.type_error("JSON document", &other)),
        }
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        match value {
            Value::Json(doc) => Ok(Part::Literal(Literal::Unicode(serde_json::to_string(doc)?))),
            other => Literal::from_value(other).map(Part::Literal),
        }
    }

    fn from_row(&self, ctx: &FieldContext<'_>, value: Value, encoding: &TextEncoding) -> Result<Value> {
        match value {
            Value::Bytes(raw) => self.convert(ctx, Value::Text(encoding.decode(&raw)?)),
            other => self.convert(ctx, other),
        }
    }
}

/// A `/`-separated path, held as a sequence of segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Path;

impl Path {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for Path {
    fn type_name(&self) -> &'static str {
        "path"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Text(s) => Ok(Value::Array(
                s.split('/').map(|seg| Value::Text(seg.to_string())).collect(),
            )),
            Value::Array(items) => {
                if let Some(bad) = items.iter().find(|item| item.as_str().is_none()) {
                    return Err(ctx.type_error("path segment text", bad));
                }
                Ok(Value::Array(items))
            }
            other => Err(ctx.type_error("path", &other)),
        }
    }

    fn literal(&self, _ctx: &FieldContext<'_>, value: &Value) -> Result<Part> {
        match value {
            Value::Array(items) => {
                let segments: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                Ok(Part::Literal(Literal::Unicode(segments.join("/"))))
            }
            other => Literal::from_value(other).map(Part::Literal),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

/// Serial integer primary key that works on every backend.
///
/// The value always comes from the backend; assigning one is an error. The
/// attribute must be called `id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonSerial;

impl CommonSerial {
    pub fn new() -> Self {
        Self
    }
}

impl Datatype for CommonSerial {
    fn type_name(&self) -> &'static str {
        "common_serial"
    }

    fn convert(&self, ctx: &FieldContext<'_>, value: Value) -> Result<Value> {
        convert_integer(ctx, value)
    }

    fn has_default(&self) -> bool {
        true
    }

    fn check_assignment(&self, ctx: &FieldContext<'_>, _current: &Slot) -> Result<()> {
        Err(ctx.immutable("common_serial values are always retrieved from the database backend"))
    }

    fn accepts_expression(&self) -> bool {
        false
    }

    fn generated_key(&self) -> Option<GeneratedKey> {
        Some(GeneratedKey::CommonSerial)
    }

    fn bind(&self, attribute: &str) -> Result<()> {
        if attribute != "id" {
            return Err(Error::definition(format!(
                "All common_serial columns must be called 'id', not '{attribute}'"
            )));
        }
        Ok(())
    }

    fn default_column(&self) -> Option<&'static str> {
        Some("id")
    }
}
