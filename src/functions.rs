//! Native function descriptors, the registry, and the standard catalog.
//!
//! Every function self-declares its name, its minimum and maximum parameter
//! count, a description, and per-parameter docs, so the catalog can render
//! its own reference text. Lookup is case-insensitive. The registry is
//! additive-only and is shared read-only once built; hosts that want extra
//! functions build their own registry with [`FunctionRegistry::standard`] as
//! a base and hand it to the engine.
//!
//! Implementations receive the evaluation context and the already-evaluated
//! positional parameters, and answer `Result<Value, String>`; an `Err` is
//! recorded as a recoverable evaluation error by the caller, never raised.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;

use crate::context::Context;
use crate::value::Value;

/// Marker for an unbounded maximum parameter count.
pub const VARIADIC: usize = usize::MAX;

type Handler = Arc<dyn Fn(&mut Context, &[Value]) -> Result<Value, String> + Send + Sync>;

/// One registered native function.
#[derive(Clone)]
pub struct Function {
    name: String,
    min_params: usize,
    max_params: usize,
    description: String,
    params: Vec<String>,
    handler: Handler,
}

impl Function {
    pub fn new(
        name: &str,
        min_params: usize,
        max_params: usize,
        description: &str,
        params: &[&str],
        handler: impl Fn(&mut Context, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Function {
            name: name.to_owned(),
            min_params,
            max_params,
            description: description.to_owned(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_params(&self) -> usize {
        self.min_params
    }

    pub fn max_params(&self) -> usize {
        self.max_params
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Check arity and run the implementation.
    pub fn invoke(&self, ctx: &mut Context, args: &[Value]) -> Result<Value, String> {
        if args.len() < self.min_params {
            return Err(format!(
                "function '{}' expects at least {} parameter(s), got {}",
                self.name,
                self.min_params,
                args.len()
            ));
        }
        if args.len() > self.max_params {
            return Err(format!(
                "function '{}' expects at most {} parameter(s), got {}",
                self.name,
                self.max_params,
                args.len()
            ));
        }
        (self.handler)(ctx, args)
    }
}

/// Case-insensitive, additive-only function catalog.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, Function>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Names are additive-only: a second registration
    /// under an existing name is refused and `false` is returned.
    pub fn add(&mut self, function: Function) -> bool {
        let key = function.name.to_lowercase();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, function);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.entries.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display names, sorted for stable listings.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.values().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Render the whole catalog as plain-text reference documentation.
    pub fn reference(&self) -> String {
        let mut functions: Vec<&Function> = self.entries.values().collect();
        functions.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        let mut out = String::new();
        for f in functions {
            let names: Vec<&str> = f
                .params
                .iter()
                .map(|p| p.split_once(':').map(|(n, _)| n.trim()).unwrap_or(p.as_str()))
                .collect();
            let mut signature = names.join("; ");
            if f.max_params == VARIADIC {
                signature.push('…');
            }
            out.push_str(&format!("{}({})\n    {}\n", f.name, signature, f.description));
            for p in &f.params {
                out.push_str(&format!("      {p}\n"));
            }
        }
        out
    }

    /// The full standard catalog.
    pub fn standard() -> Self {
        let mut reg = FunctionRegistry::new();
        add_math(&mut reg);
        add_aggregates(&mut reg);
        add_strings(&mut reg);
        add_conditionals(&mut reg);
        add_datetime(&mut reg);
        add_conversions(&mut reg);
        add_http(&mut reg);
        reg
    }

    /// One shared, build-once instance of the standard catalog, used by the
    /// convenience entry points.
    pub fn standard_shared() -> Arc<FunctionRegistry> {
        static SHARED: OnceLock<Arc<FunctionRegistry>> = OnceLock::new();
        SHARED
            .get_or_init(|| Arc::new(FunctionRegistry::standard()))
            .clone()
    }
}

// ── Parameter accessors ───────────────────────────────────────────────────────
//
// Arity is validated before a handler runs, so required parameters are always
// present; optional ones fall back to the coercion-neutral value.

fn text(args: &[Value], idx: usize) -> String {
    args.get(idx).map(Value::to_text).unwrap_or_default()
}

fn number(args: &[Value], idx: usize) -> f64 {
    args.get(idx).map(Value::to_number).unwrap_or(0.0)
}

fn integer(args: &[Value], idx: usize) -> i64 {
    number(args, idx) as i64
}

fn boolean(args: &[Value], idx: usize) -> bool {
    args.get(idx).map(Value::to_bool).unwrap_or(false)
}

fn timestamp(args: &[Value], idx: usize) -> NaiveDateTime {
    args.get(idx)
        .map(Value::to_timestamp)
        .unwrap_or_else(crate::value::epoch)
}

// ── Math ──────────────────────────────────────────────────────────────────────

fn add_math(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "abs", 1, 1,
        "Absolute value of a number.",
        &["value: the number to take the absolute value of"],
        |_, args| Ok(Value::Number(number(args, 0).abs())),
    ));
    reg.add(Function::new(
        "ceiling", 1, 1,
        "Smallest whole number not below the value.",
        &["value: the number to round up"],
        |_, args| Ok(Value::Number(number(args, 0).ceil())),
    ));
    reg.add(Function::new(
        "floor", 1, 1,
        "Largest whole number not above the value.",
        &["value: the number to round down"],
        |_, args| Ok(Value::Number(number(args, 0).floor())),
    ));
    reg.add(Function::new(
        "round", 1, 2,
        "Round to the nearest whole number, or to a number of decimal places.",
        &[
            "value: the number to round",
            "places: decimal places to keep (default 0)",
        ],
        |_, args| {
            let factor = 10f64.powi(integer(args, 1) as i32);
            Ok(Value::Number((number(args, 0) * factor).round() / factor))
        },
    ));
    reg.add(Function::new(
        "trunc", 1, 1,
        "Drop the fractional part of a number.",
        &["value: the number to truncate"],
        |_, args| Ok(Value::Number(number(args, 0).trunc())),
    ));
    reg.add(Function::new(
        "sqrt", 1, 1,
        "Square root.",
        &["value: the number to take the root of"],
        |_, args| Ok(Value::Number(number(args, 0).sqrt())),
    ));
    reg.add(Function::new(
        "power", 2, 2,
        "Raise a base to an exponent.",
        &["base: the base", "exponent: the exponent"],
        |_, args| Ok(Value::Number(number(args, 0).powf(number(args, 1)))),
    ));
    reg.add(Function::new(
        "exp", 1, 1,
        "e raised to the value.",
        &["value: the exponent"],
        |_, args| Ok(Value::Number(number(args, 0).exp())),
    ));
    reg.add(Function::new(
        "ln", 1, 1,
        "Natural logarithm.",
        &["value: the number to take the logarithm of"],
        |_, args| Ok(Value::Number(number(args, 0).ln())),
    ));
    reg.add(Function::new(
        "log", 1, 2,
        "Logarithm in base 10, or in a given base.",
        &[
            "value: the number to take the logarithm of",
            "base: the base (default 10)",
        ],
        |_, args| {
            let n = number(args, 0);
            Ok(Value::Number(if args.len() > 1 {
                n.log(number(args, 1))
            } else {
                n.log10()
            }))
        },
    ));
    reg.add(Function::new(
        "mod", 2, 2,
        "Floating-point remainder of a division.",
        &["value: the dividend", "divisor: the divisor"],
        |_, args| Ok(Value::Number(number(args, 0) % number(args, 1))),
    ));
    reg.add(Function::new(
        "pi", 0, 0,
        "The circle constant π.",
        &[],
        |_, _| Ok(Value::Number(std::f64::consts::PI)),
    ));
}

// ── Aggregates ────────────────────────────────────────────────────────────────

fn add_aggregates(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "sum", 1, VARIADIC,
        "Sum of all parameters.",
        &["values: the numbers to add"],
        |_, args| Ok(Value::Number(args.iter().map(Value::to_number).sum())),
    ));
    reg.add(Function::new(
        "average", 1, VARIADIC,
        "Arithmetic mean of all parameters.",
        &["values: the numbers to average"],
        |_, args| {
            let total: f64 = args.iter().map(Value::to_number).sum();
            Ok(Value::Number(total / args.len() as f64))
        },
    ));
    reg.add(Function::new(
        "min", 1, VARIADIC,
        "Smallest of all parameters.",
        &["values: the numbers to compare"],
        |_, args| {
            Ok(Value::Number(
                args.iter().map(Value::to_number).fold(f64::INFINITY, f64::min),
            ))
        },
    ));
    reg.add(Function::new(
        "max", 1, VARIADIC,
        "Largest of all parameters.",
        &["values: the numbers to compare"],
        |_, args| {
            Ok(Value::Number(
                args.iter()
                    .map(Value::to_number)
                    .fold(f64::NEG_INFINITY, f64::max),
            ))
        },
    ));
    reg.add(Function::new(
        "count", 0, VARIADIC,
        "Number of parameters given.",
        &["values: anything"],
        |_, args| Ok(Value::Number(args.len() as f64)),
    ));
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn add_strings(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "length", 1, 1,
        "Number of characters in the text.",
        &["text: the text to measure"],
        |_, args| Ok(Value::Number(text(args, 0).chars().count() as f64)),
    ));
    reg.add(Function::new(
        "upper", 1, 1,
        "Text in upper case.",
        &["text: the text to convert"],
        |_, args| Ok(Value::Text(text(args, 0).to_uppercase())),
    ));
    reg.add(Function::new(
        "lower", 1, 1,
        "Text in lower case.",
        &["text: the text to convert"],
        |_, args| Ok(Value::Text(text(args, 0).to_lowercase())),
    ));
    reg.add(Function::new(
        "proper", 1, 1,
        "Text with the first letter of every word capitalized.",
        &["text: the text to convert"],
        |_, args| {
            let mut out = String::new();
            let mut boundary = true;
            for c in text(args, 0).chars() {
                if c.is_alphanumeric() {
                    if boundary {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    boundary = false;
                } else {
                    out.push(c);
                    boundary = true;
                }
            }
            Ok(Value::Text(out))
        },
    ));
    reg.add(Function::new(
        "trim", 1, 1,
        "Text without leading or trailing whitespace.",
        &["text: the text to trim"],
        |_, args| Ok(Value::Text(text(args, 0).trim().to_owned())),
    ));
    reg.add(Function::new(
        "left", 2, 2,
        "The first characters of the text.",
        &["text: the source text", "count: how many characters to keep"],
        |_, args| {
            let n = integer(args, 1).max(0) as usize;
            Ok(Value::Text(text(args, 0).chars().take(n).collect()))
        },
    ));
    reg.add(Function::new(
        "right", 2, 2,
        "The last characters of the text.",
        &["text: the source text", "count: how many characters to keep"],
        |_, args| {
            let s = text(args, 0);
            let n = integer(args, 1).max(0) as usize;
            let total = s.chars().count();
            Ok(Value::Text(s.chars().skip(total.saturating_sub(n)).collect()))
        },
    ));
    reg.add(Function::new(
        "mid", 2, 3,
        "A slice of the text, counting characters from 1.",
        &[
            "text: the source text",
            "start: 1-based position of the first character",
            "count: how many characters to keep (default: to the end)",
        ],
        |_, args| {
            let s = text(args, 0);
            let start = (integer(args, 1).max(1) as usize) - 1;
            let out: String = if args.len() > 2 {
                let n = integer(args, 2).max(0) as usize;
                s.chars().skip(start).take(n).collect()
            } else {
                s.chars().skip(start).collect()
            };
            Ok(Value::Text(out))
        },
    ));
    reg.add(Function::new(
        "replace", 3, 3,
        "Text with every occurrence of a fragment replaced.",
        &[
            "text: the source text",
            "fragment: the text to search for",
            "replacement: the text to insert",
        ],
        |_, args| {
            Ok(Value::Text(
                text(args, 0).replace(&text(args, 1), &text(args, 2)),
            ))
        },
    ));
    reg.add(Function::new(
        "position", 2, 3,
        "1-based position of a fragment inside the text, 0 when absent.",
        &[
            "text: the text to search in",
            "fragment: the text to find",
            "start: 1-based position to search from (default 1)",
        ],
        |_, args| {
            let hay = text(args, 0);
            let needle = text(args, 1);
            let from = if args.len() > 2 {
                (integer(args, 2).max(1) as usize) - 1
            } else {
                0
            };
            let offset = hay
                .char_indices()
                .nth(from)
                .map(|(i, _)| i)
                .unwrap_or(hay.len());
            Ok(Value::Number(match hay[offset..].find(&needle) {
                Some(i) => hay[..offset + i].chars().count() as f64 + 1.0,
                None => 0.0,
            }))
        },
    ));
    reg.add(Function::new(
        "contains", 2, 2,
        "Whether the text contains a fragment.",
        &["text: the text to search in", "fragment: the text to find"],
        |_, args| Ok(Value::Bool(text(args, 0).contains(&text(args, 1)))),
    ));
    reg.add(Function::new(
        "startsWith", 2, 2,
        "Whether the text starts with a fragment.",
        &["text: the text to test", "fragment: the expected start"],
        |_, args| Ok(Value::Bool(text(args, 0).starts_with(&text(args, 1)))),
    ));
    reg.add(Function::new(
        "endsWith", 2, 2,
        "Whether the text ends with a fragment.",
        &["text: the text to test", "fragment: the expected end"],
        |_, args| Ok(Value::Bool(text(args, 0).ends_with(&text(args, 1)))),
    ));
    reg.add(Function::new(
        "repeat", 2, 2,
        "The text repeated a number of times.",
        &["text: the text to repeat", "count: how many times"],
        |_, args| {
            let n = integer(args, 1).clamp(0, 10_000) as usize;
            Ok(Value::Text(text(args, 0).repeat(n)))
        },
    ));
    reg.add(Function::new(
        "padLeft", 2, 3,
        "Text left-padded to a width.",
        &[
            "text: the text to pad",
            "width: the target character count",
            "pad: the padding character (default space)",
        ],
        |_, args| Ok(Value::Text(pad(args, true))),
    ));
    reg.add(Function::new(
        "padRight", 2, 3,
        "Text right-padded to a width.",
        &[
            "text: the text to pad",
            "width: the target character count",
            "pad: the padding character (default space)",
        ],
        |_, args| Ok(Value::Text(pad(args, false))),
    ));
    reg.add(Function::new(
        "matches", 2, 2,
        "Whether the text matches a regular expression.",
        &["text: the text to test", "pattern: the regular expression"],
        |_, args| {
            let pattern = text(args, 1);
            let re = Regex::new(&pattern)
                .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
            Ok(Value::Bool(re.is_match(&text(args, 0))))
        },
    ));
    reg.add(Function::new(
        "replacePattern", 3, 3,
        "Text with every match of a regular expression replaced.",
        &[
            "text: the source text",
            "pattern: the regular expression",
            "replacement: the replacement, $1-style groups allowed",
        ],
        |_, args| {
            let pattern = text(args, 1);
            let re = Regex::new(&pattern)
                .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
            let replacement = text(args, 2);
            Ok(Value::Text(
                re.replace_all(&text(args, 0), replacement.as_str()).into_owned(),
            ))
        },
    ));
}

fn pad(args: &[Value], left: bool) -> String {
    let s = text(args, 0);
    let width = integer(args, 1).clamp(0, 10_000) as usize;
    let fill = args
        .get(2)
        .and_then(|v| v.to_text().chars().next())
        .unwrap_or(' ');
    let count = s.chars().count();
    if count >= width {
        return s;
    }
    let padding: String = std::iter::repeat(fill).take(width - count).collect();
    if left {
        padding + &s
    } else {
        s + &padding
    }
}

// ── Conditionals ──────────────────────────────────────────────────────────────

fn add_conditionals(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "if", 3, 3,
        "One of two values, picked by a condition.",
        &[
            "condition: the boolean to test",
            "then: the value when true",
            "else: the value when false",
        ],
        |_, args| {
            let idx = if boolean(args, 0) { 1 } else { 2 };
            Ok(args.get(idx).cloned().unwrap_or(Value::Void))
        },
    ));
    reg.add(Function::new(
        "ifEmpty", 2, 2,
        "The value, or a fallback when its text form is empty.",
        &["value: the value to test", "fallback: the replacement"],
        |_, args| {
            let idx = if text(args, 0).is_empty() { 1 } else { 0 };
            Ok(args.get(idx).cloned().unwrap_or(Value::Void))
        },
    ));
    reg.add(Function::new(
        "isEmpty", 1, 1,
        "Whether the value's text form is empty.",
        &["value: the value to test"],
        |_, args| Ok(Value::Bool(text(args, 0).is_empty())),
    ));
    reg.add(Function::new(
        "isNumber", 1, 1,
        "Whether the value is a number or parses cleanly as one.",
        &["value: the value to test"],
        |_, args| {
            let yes = match args.first() {
                Some(Value::Number(_)) => true,
                Some(Value::Text(s)) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            };
            Ok(Value::Bool(yes))
        },
    ));
    reg.add(Function::new(
        "not", 1, 1,
        "Boolean negation.",
        &["value: the boolean to negate"],
        |_, args| Ok(Value::Bool(!boolean(args, 0))),
    ));
    reg.add(Function::new(
        "and", 1, VARIADIC,
        "Whether every parameter is true.",
        &["values: the booleans to combine"],
        |_, args| Ok(Value::Bool(args.iter().all(Value::to_bool))),
    ));
    reg.add(Function::new(
        "or", 1, VARIADIC,
        "Whether any parameter is true.",
        &["values: the booleans to combine"],
        |_, args| Ok(Value::Bool(args.iter().any(Value::to_bool))),
    ));
}

// ── Date & time ───────────────────────────────────────────────────────────────

const MAX_SPAN_SECONDS: i64 = 86_400 * 3_650_000;

fn shift_seconds(ts: NaiveDateTime, amount: i64, unit_seconds: i64) -> Result<NaiveDateTime, String> {
    let seconds = amount
        .saturating_mul(unit_seconds)
        .clamp(-MAX_SPAN_SECONDS, MAX_SPAN_SECONDS);
    ts.checked_add_signed(Duration::seconds(seconds))
        .ok_or_else(|| "timestamp out of range".to_owned())
}

fn shift_months(ts: NaiveDateTime, amount: i64) -> Result<NaiveDateTime, String> {
    let amount = amount.clamp(-1_200_000, 1_200_000);
    let shifted = if amount >= 0 {
        ts.checked_add_months(Months::new(amount as u32))
    } else {
        ts.checked_sub_months(Months::new((-amount) as u32))
    };
    shifted.ok_or_else(|| "timestamp out of range".to_owned())
}

fn add_datetime(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "now", 0, 0,
        "The current local date and time.",
        &[],
        |_, _| Ok(Value::Timestamp(Local::now().naive_local())),
    ));
    reg.add(Function::new(
        "today", 0, 0,
        "The current local date at midnight.",
        &[],
        |_, _| {
            Ok(Value::Timestamp(
                Local::now()
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or_else(crate::value::epoch),
            ))
        },
    ));
    reg.add(Function::new(
        "date", 3, 3,
        "A timestamp from a year, month and day.",
        &["year: the year", "month: the month (1-12)", "day: the day of month"],
        |_, args| {
            NaiveDate::from_ymd_opt(
                integer(args, 0) as i32,
                integer(args, 1) as u32,
                integer(args, 2) as u32,
            )
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .ok_or_else(|| {
                format!(
                    "invalid date {}-{}-{}",
                    integer(args, 0),
                    integer(args, 1),
                    integer(args, 2)
                )
            })
        },
    ));
    reg.add(Function::new(
        "year", 1, 1,
        "The year of a timestamp.",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).year() as f64)),
    ));
    reg.add(Function::new(
        "month", 1, 1,
        "The month of a timestamp (1-12).",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).month() as f64)),
    ));
    reg.add(Function::new(
        "day", 1, 1,
        "The day of month of a timestamp.",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).day() as f64)),
    ));
    reg.add(Function::new(
        "hour", 1, 1,
        "The hour of a timestamp (0-23).",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).hour() as f64)),
    ));
    reg.add(Function::new(
        "minute", 1, 1,
        "The minute of a timestamp.",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).minute() as f64)),
    ));
    reg.add(Function::new(
        "second", 1, 1,
        "The second of a timestamp.",
        &["when: the timestamp"],
        |_, args| Ok(Value::Number(timestamp(args, 0).second() as f64)),
    ));
    reg.add(Function::new(
        "weekday", 1, 1,
        "The day of week of a timestamp, 1 = Monday through 7 = Sunday.",
        &["when: the timestamp"],
        |_, args| {
            Ok(Value::Number(
                timestamp(args, 0).weekday().number_from_monday() as f64,
            ))
        },
    ));
    reg.add(Function::new(
        "addDays", 2, 2,
        "A timestamp shifted by whole days.",
        &["when: the timestamp", "days: the number of days, may be negative"],
        |_, args| {
            shift_seconds(timestamp(args, 0), integer(args, 1), 86_400).map(Value::Timestamp)
        },
    ));
    reg.add(Function::new(
        "addHours", 2, 2,
        "A timestamp shifted by whole hours.",
        &["when: the timestamp", "hours: the number of hours, may be negative"],
        |_, args| {
            shift_seconds(timestamp(args, 0), integer(args, 1), 3_600).map(Value::Timestamp)
        },
    ));
    reg.add(Function::new(
        "addMinutes", 2, 2,
        "A timestamp shifted by whole minutes.",
        &["when: the timestamp", "minutes: the number of minutes, may be negative"],
        |_, args| shift_seconds(timestamp(args, 0), integer(args, 1), 60).map(Value::Timestamp),
    ));
    reg.add(Function::new(
        "addMonths", 2, 2,
        "A timestamp shifted by calendar months, clamping the day of month.",
        &["when: the timestamp", "months: the number of months, may be negative"],
        |_, args| shift_months(timestamp(args, 0), integer(args, 1)).map(Value::Timestamp),
    ));
    reg.add(Function::new(
        "addYears", 2, 2,
        "A timestamp shifted by calendar years.",
        &["when: the timestamp", "years: the number of years, may be negative"],
        |_, args| {
            shift_months(timestamp(args, 0), integer(args, 1).saturating_mul(12))
                .map(Value::Timestamp)
        },
    ));
    reg.add(Function::new(
        "daysBetween", 2, 2,
        "Whole days from the first date to the second.",
        &["from: the earlier timestamp", "to: the later timestamp"],
        |_, args| {
            let from = timestamp(args, 0).date();
            let to = timestamp(args, 1).date();
            Ok(Value::Number(to.signed_duration_since(from).num_days() as f64))
        },
    ));
    reg.add(Function::new(
        "formatDate", 2, 2,
        "A timestamp rendered with a strftime-style format.",
        &["when: the timestamp", "format: the strftime format, e.g. %d %B %Y"],
        |_, args| {
            let fmt = text(args, 1);
            let items: Vec<Item> = StrftimeItems::new(&fmt).collect();
            if items.iter().any(|i| matches!(i, Item::Error)) {
                return Err(format!("invalid date format '{fmt}'"));
            }
            Ok(Value::Text(
                timestamp(args, 0).format_with_items(items.iter()).to_string(),
            ))
        },
    ));
    reg.add(Function::new(
        "parseDate", 2, 2,
        "A timestamp parsed from text with a strftime-style format.",
        &["text: the text to parse", "format: the strftime format it is in"],
        |_, args| {
            let s = text(args, 0);
            let fmt = text(args, 1);
            NaiveDateTime::parse_from_str(s.trim(), &fmt)
                .or_else(|_| {
                    NaiveDate::parse_from_str(s.trim(), &fmt)
                        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_else(crate::value::epoch))
                })
                .map(Value::Timestamp)
                .map_err(|_| format!("cannot parse '{s}' with format '{fmt}'"))
        },
    ));
}

// ── Conversions & formatting ──────────────────────────────────────────────────

fn add_conversions(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "toNumber", 1, 1,
        "The value coerced to a number.",
        &["value: the value to convert"],
        |_, args| Ok(Value::Number(number(args, 0))),
    ));
    reg.add(Function::new(
        "toBoolean", 1, 1,
        "The value coerced to a boolean.",
        &["value: the value to convert"],
        |_, args| Ok(Value::Bool(boolean(args, 0))),
    ));
    reg.add(Function::new(
        "toText", 1, 1,
        "The value coerced to text.",
        &["value: the value to convert"],
        |_, args| Ok(Value::Text(text(args, 0))),
    ));
    reg.add(Function::new(
        "toTimestamp", 1, 1,
        "The value coerced to a timestamp.",
        &["value: the value to convert"],
        |_, args| Ok(Value::Timestamp(timestamp(args, 0))),
    ));
    reg.add(Function::new(
        "formatNumber", 2, 2,
        "A number rendered with a fixed number of decimal places.",
        &["value: the number to render", "places: decimal places to show"],
        |_, args| {
            let places = integer(args, 1).clamp(0, 17) as usize;
            Ok(Value::Text(format!("{:.*}", places, number(args, 0))))
        },
    ));
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

fn add_http(reg: &mut FunctionRegistry) {
    reg.add(Function::new(
        "httpGet", 1, 1,
        "The body of a blocking GET request, through the host's URL fetcher.",
        &["url: the address to fetch"],
        |ctx, args| {
            let url = text(args, 0);
            let fetch = ctx
                .fetcher()
                .cloned()
                .ok_or_else(|| "no URL fetcher configured".to_owned())?;
            fetch(&url, None).map(Value::Text)
        },
    ));
    reg.add(Function::new(
        "httpPost", 2, 2,
        "The body of a blocking POST request, through the host's URL fetcher.",
        &["url: the address to post to", "body: the request body"],
        |ctx, args| {
            let url = text(args, 0);
            let body = text(args, 1);
            let fetch = ctx
                .fetcher()
                .cloned()
                .ok_or_else(|| "no URL fetcher configured".to_owned())?;
            fetch(&url, Some(&body)).map(Value::Text)
        },
    ));
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::epoch;

    fn call(name: &str, args: Vec<Value>) -> Value {
        let reg = FunctionRegistry::standard();
        let mut ctx = Context::new();
        reg.get(name)
            .unwrap_or_else(|| panic!("{name} not registered"))
            .invoke(&mut ctx, &args)
            .unwrap_or_else(|e| panic!("{name} failed: {e}"))
    }

    fn call_err(name: &str, args: Vec<Value>) -> String {
        let reg = FunctionRegistry::standard();
        let mut ctx = Context::new();
        reg.get(name)
            .unwrap_or_else(|| panic!("{name} not registered"))
            .invoke(&mut ctx, &args)
            .expect_err("expected an error")
    }

    fn ts(y: i32, m: u32, d: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid date"),
        )
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = FunctionRegistry::standard();
        assert!(reg.get("ABS").is_some());
        assert!(reg.get("toboolean").is_some());
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn add_refuses_duplicates() {
        let mut reg = FunctionRegistry::new();
        assert!(reg.add(Function::new("one", 0, 0, "", &[], |_, _| Ok(Value::Void))));
        assert!(!reg.add(Function::new("ONE", 0, 0, "", &[], |_, _| Ok(Value::Void))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn invoke_checks_arity_bounds() {
        let err = call_err("power", vec![Value::Number(2.0)]);
        assert!(err.contains("at least 2"));
        let err = call_err("abs", vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(err.contains("at most 1"));
    }

    #[test]
    fn math_basics() {
        assert_eq!(call("abs", vec![Value::Number(-7.0)]), Value::Number(7.0));
        assert_eq!(
            call("round", vec![Value::Number(2.567), Value::Number(2.0)]),
            Value::Number(2.57)
        );
        assert_eq!(
            call("power", vec![Value::Number(2.0), Value::Number(10.0)]),
            Value::Number(1024.0)
        );
        assert_eq!(
            call("mod", vec![Value::Number(10.0), Value::Number(3.0)]),
            Value::Number(1.0)
        );
    }

    #[test]
    fn aggregates() {
        let nums = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(6.0)];
        assert_eq!(call("sum", nums.clone()), Value::Number(9.0));
        assert_eq!(call("average", nums.clone()), Value::Number(3.0));
        assert_eq!(call("min", nums.clone()), Value::Number(1.0));
        assert_eq!(call("max", nums.clone()), Value::Number(6.0));
        assert_eq!(call("count", nums), Value::Number(3.0));
    }

    #[test]
    fn aggregates_coerce_text() {
        assert_eq!(
            call("sum", vec![Value::Text("2".into()), Value::Text("3".into())]),
            Value::Number(5.0)
        );
    }

    #[test]
    fn string_basics() {
        assert_eq!(call("length", vec!["héllo".into()]), Value::Number(5.0));
        assert_eq!(call("upper", vec!["ab".into()]), Value::Text("AB".into()));
        assert_eq!(
            call("proper", vec!["war and peace".into()]),
            Value::Text("War And Peace".into())
        );
        assert_eq!(
            call("mid", vec!["abcdef".into(), Value::Number(2.0), Value::Number(3.0)]),
            Value::Text("bcd".into())
        );
        assert_eq!(
            call("right", vec!["abcdef".into(), Value::Number(2.0)]),
            Value::Text("ef".into())
        );
    }

    #[test]
    fn position_is_one_based() {
        assert_eq!(
            call("position", vec!["foobar".into(), "bar".into()]),
            Value::Number(4.0)
        );
        assert_eq!(
            call("position", vec!["foobar".into(), "zzz".into()]),
            Value::Number(0.0)
        );
    }

    #[test]
    fn pad_both_sides() {
        assert_eq!(
            call("padLeft", vec!["7".into(), Value::Number(3.0), "0".into()]),
            Value::Text("007".into())
        );
        assert_eq!(
            call("padRight", vec!["ab".into(), Value::Number(4.0)]),
            Value::Text("ab  ".into())
        );
    }

    #[test]
    fn regex_helpers() {
        assert_eq!(
            call("matches", vec!["hello".into(), "^hel+o$".into()]),
            Value::Bool(true)
        );
        assert_eq!(
            call(
                "replacePattern",
                vec!["a1b22c".into(), "[0-9]+".into(), "#".into()]
            ),
            Value::Text("a#b#c".into())
        );
        let err = call_err("matches", vec!["x".into(), "(".into()]);
        assert!(err.contains("invalid pattern"));
    }

    #[test]
    fn conditionals() {
        assert_eq!(
            call("if", vec![Value::Bool(true), "a".into(), "b".into()]),
            Value::Text("a".into())
        );
        assert_eq!(
            call("ifEmpty", vec!["".into(), "fallback".into()]),
            Value::Text("fallback".into())
        );
        assert_eq!(call("isNumber", vec!["12.5".into()]), Value::Bool(true));
        assert_eq!(call("isNumber", vec!["12x".into()]), Value::Bool(false));
        assert_eq!(
            call("and", vec![Value::Bool(true), Value::Bool(false)]),
            Value::Bool(false)
        );
    }

    #[test]
    fn date_parts() {
        let when = ts(2024, 3, 9);
        assert_eq!(call("year", vec![when.clone()]), Value::Number(2024.0));
        assert_eq!(call("month", vec![when.clone()]), Value::Number(3.0));
        assert_eq!(call("day", vec![when.clone()]), Value::Number(9.0));
        // 2024-03-09 was a Saturday.
        assert_eq!(call("weekday", vec![when]), Value::Number(6.0));
    }

    #[test]
    fn date_arithmetic() {
        assert_eq!(
            call("addDays", vec![ts(2024, 2, 28), Value::Number(2.0)]),
            ts(2024, 3, 1)
        );
        // Month arithmetic clamps the day of month.
        assert_eq!(
            call("addMonths", vec![ts(2024, 1, 31), Value::Number(1.0)]),
            ts(2024, 2, 29)
        );
        assert_eq!(
            call("daysBetween", vec![ts(2024, 1, 1), ts(2024, 2, 1)]),
            Value::Number(31.0)
        );
    }

    #[test]
    fn date_formatting() {
        assert_eq!(
            call("formatDate", vec![ts(2024, 3, 9), "%d.%m.%Y".into()]),
            Value::Text("09.03.2024".into())
        );
        let err = call_err("formatDate", vec![ts(2024, 3, 9), "%Q!".into()]);
        assert!(err.contains("invalid date format"));
        assert_eq!(
            call("parseDate", vec!["09.03.2024".into(), "%d.%m.%Y".into()]),
            ts(2024, 3, 9)
        );
    }

    #[test]
    fn invalid_date_is_an_error() {
        let err = call_err(
            "date",
            vec![Value::Number(2024.0), Value::Number(13.0), Value::Number(1.0)],
        );
        assert!(err.contains("invalid date"));
    }

    #[test]
    fn conversions() {
        assert_eq!(call("toNumber", vec!["$5".into()]), Value::Number(5.0));
        assert_eq!(call("toBoolean", vec!["yes".into()]), Value::Bool(true));
        assert_eq!(call("toText", vec![Value::Bool(true)]), Value::Text("1".into()));
        assert_eq!(call("toTimestamp", vec!["bad".into()]), Value::Timestamp(epoch()));
        assert_eq!(
            call("formatNumber", vec![Value::Number(1.5), Value::Number(3.0)]),
            Value::Text("1.500".into())
        );
    }

    #[test]
    fn http_without_fetcher_is_an_error() {
        let err = call_err("httpGet", vec!["http://example.test".into()]);
        assert!(err.contains("no URL fetcher"));
    }

    #[test]
    fn http_delegates_to_fetcher() {
        let reg = FunctionRegistry::standard();
        let mut ctx = Context::new();
        ctx.set_fetcher(Arc::new(
            |url: &str, body: Option<&str>| -> Result<String, String> {
                Ok(format!("{url}|{}", body.unwrap_or("-")))
            },
        ));
        let get = reg
            .get("httpGet")
            .expect("registered")
            .invoke(&mut ctx, &["u".into()])
            .expect("fetch");
        assert_eq!(get, Value::Text("u|-".into()));
        let post = reg
            .get("httpPost")
            .expect("registered")
            .invoke(&mut ctx, &["u".into(), "b".into()])
            .expect("fetch");
        assert_eq!(post, Value::Text("u|b".into()));
    }

    #[test]
    fn reference_lists_every_function() {
        let reg = FunctionRegistry::standard();
        let doc = reg.reference();
        for name in reg.names() {
            assert!(doc.contains(name), "missing {name} in reference");
        }
        assert!(doc.contains("httpGet(url)"));
    }
}
