//! Runtime value type and the total coercions between its forms.
//!
//! The engine is dynamically typed; every operator boundary coerces its
//! operands with the conversions here. All conversions are total: anything can
//! become a number, a boolean, text, or a timestamp, and failure degrades to a
//! neutral value (`0`, `false`, empty text, the Unix epoch) instead of an
//! error.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The fixed, sortable timestamp text form.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Timestamp(NaiveDateTime),
    /// Absence of a value: the result of an assignment, of an unresolved
    /// variable, or of a failed subtree.
    Void,
}

impl Default for Value {
    fn default() -> Self {
        Value::Void
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Value {
    /// Coerce to text. Booleans render as `"1"`/`"0"`, timestamps in the
    /// sortable format, integral numbers without a decimal point, `Void` as
    /// empty text.
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            Value::Void => String::new(),
        }
    }

    /// Coerce to a number. Text is stripped down to digits, `-` and `.`
    /// before parsing; anything unparseable becomes `0`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(s) => parse_number(s),
            Value::Timestamp(ts) => ts.and_utc().timestamp() as f64,
            Value::Void => 0.0,
        }
    }

    /// Coerce to a boolean. Text uses a substring heuristic: any `t` or `y`
    /// means true, else any `f` or `n` means false, else the numeric form is
    /// compared against zero.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Text(s) => parse_bool(s),
            Value::Timestamp(_) => true,
            Value::Void => false,
        }
    }

    /// Coerce to a timestamp. Text is parsed in the sortable format (a space
    /// separator and a date-only form are also accepted), numbers are seconds
    /// since the Unix epoch; everything else degrades to the epoch itself.
    pub fn to_timestamp(&self) -> NaiveDateTime {
        match self {
            Value::Timestamp(ts) => *ts,
            Value::Text(s) => parse_timestamp(s),
            Value::Number(n) => DateTime::from_timestamp(*n as i64, 0)
                .map(|dt| dt.naive_utc())
                .unwrap_or_else(epoch),
            Value::Bool(_) | Value::Void => epoch(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Name of the type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::Void => "void",
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

/// The Unix epoch, the neutral timestamp value.
pub fn epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn parse_number(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

fn parse_bool(s: &str) -> bool {
    let lower = s.to_lowercase();
    if lower.contains('t') || lower.contains('y') {
        true
    } else if lower.contains('f') || lower.contains('n') {
        false
    } else {
        parse_number(s) != 0.0
    }
}

fn parse_timestamp(s: &str) -> NaiveDateTime {
    let t = s.trim();
    NaiveDateTime::parse_from_str(t, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(t, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_else(epoch))
        })
        .unwrap_or_else(|_| epoch())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
