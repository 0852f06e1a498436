//! # Value Coercion
//!
//! Raw option and argument values arrive as text (or as a native boolean for a bare flag).
//! Each option declares an [`OptionType`] that selects a conversion rule. Conversions are
//! total: they either produce a [`serde_json::Value`] or fail with a [`CoerceError`].
//!
//! | type                            | rule                                                        |
//! |---------------------------------|-------------------------------------------------------------|
//! | `number`                        | longest float prefix, fail if none or not finite            |
//! | `int`                           | longest base-10 integer prefix, fail if none                |
//! | `boolean`                       | `""`, `0`, `false/null/nan/undefined/no/off/disabled` → false |
//! | `flag`                          | empty → true, otherwise the boolean rule                    |
//! | `number[]`, `int[]`, `string[]` | split on commas (spaces/tabs around them dropped)           |
//! | `json`                          | `serde_json` decode                                         |
//! | `string` or any other tag       | identity                                                    |

use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoerceError {
    #[error("input {input:?} is NaN and not float")]
    NotFloat { input: String },

    #[error("input {input:?} is NaN and not integer")]
    NotInteger { input: String },

    #[error("input {input:?} is not a finite number")]
    NotFinite { input: String },

    #[error("input is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tag selecting the coercion rule of an option.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionType {
    #[default]
    String,
    Number,
    Int,
    Boolean,
    Flag,
    NumberList,
    IntList,
    StringList,
    Json,
    /// A tag with no registered rule; values pass through unchanged.
    Custom(String),
}

impl OptionType {
    /// Whether a bare occurrence (`--name` with no value) is meaningful for this type.
    pub fn accepts_bare(&self) -> bool {
        matches!(self, OptionType::Boolean | OptionType::Flag)
    }

    pub fn coerce(&self, input: &str) -> Result<Value, CoerceError> {
        match self {
            OptionType::Number => to_number(input),
            OptionType::Int => to_int(input),
            OptionType::Boolean => Ok(Value::Bool(to_bool(input))),
            OptionType::Flag => Ok(Value::Bool(input.is_empty() || to_bool(input))),
            OptionType::NumberList => split_list(input).into_iter().map(to_number).collect(),
            OptionType::IntList => split_list(input).into_iter().map(to_int).collect(),
            OptionType::StringList => Ok(Value::Array(
                split_list(input)
                    .into_iter()
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            )),
            OptionType::Json => Ok(serde_json::from_str(input)?),
            OptionType::String | OptionType::Custom(_) => Ok(Value::String(input.to_string())),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            OptionType::String => "string",
            OptionType::Number => "number",
            OptionType::Int => "int",
            OptionType::Boolean => "boolean",
            OptionType::Flag => "flag",
            OptionType::NumberList => "number[]",
            OptionType::IntList => "int[]",
            OptionType::StringList => "string[]",
            OptionType::Json => "json",
            OptionType::Custom(tag) => tag,
        };
        f.write_str(tag)
    }
}

impl FromStr for OptionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "string" => OptionType::String,
            "number" => OptionType::Number,
            "int" => OptionType::Int,
            "boolean" => OptionType::Boolean,
            "flag" => OptionType::Flag,
            "number[]" => OptionType::NumberList,
            "int[]" => OptionType::IntList,
            "string[]" => OptionType::StringList,
            "json" => OptionType::Json,
            other => OptionType::Custom(other.to_string()),
        })
    }
}

/// Length of the leading run of ASCII digits.
fn digits(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}

/// Length of an optional leading sign.
fn sign(text: &str) -> usize {
    usize::from(text.starts_with(['+', '-']))
}

/// The longest prefix of `text` that reads as a decimal float, e.g. `2` in `2px`.
fn float_prefix(text: &str) -> Option<&str> {
    let mut end = sign(text);
    if text[end..].starts_with("Infinity") {
        return Some(&text[..end + "Infinity".len()]);
    }
    let whole = digits(&text[end..]);
    end += whole;
    let mut fraction = 0;
    if text[end..].starts_with('.') {
        fraction = digits(&text[end + 1..]);
        if whole > 0 || fraction > 0 {
            end += 1 + fraction;
        }
    }
    if whole == 0 && fraction == 0 {
        return None;
    }
    if text[end..].starts_with(['e', 'E']) {
        let exp_sign = sign(&text[end + 1..]);
        let exp = digits(&text[end + 1 + exp_sign..]);
        if exp > 0 {
            end += 1 + exp_sign + exp;
        }
    }
    Some(&text[..end])
}

fn to_number(input: &str) -> Result<Value, CoerceError> {
    let prefix = float_prefix(input.trim_start()).ok_or_else(|| CoerceError::NotFloat {
        input: input.to_string(),
    })?;
    let value = match prefix.trim_start_matches('+') {
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        number => number.parse::<f64>().map_err(|_| CoerceError::NotFloat {
            input: input.to_string(),
        })?,
    };
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| CoerceError::NotFinite {
            input: input.to_string(),
        })
}

fn to_int(input: &str) -> Result<Value, CoerceError> {
    let text = input.trim_start();
    let signed = sign(text);
    let whole = digits(&text[signed..]);
    if whole == 0 {
        return Err(CoerceError::NotInteger {
            input: input.to_string(),
        });
    }
    let prefix = text[..signed + whole].trim_start_matches('+');
    if let Ok(int) = prefix.parse::<i64>() {
        return Ok(Value::from(int));
    }
    // beyond i64: keep the magnitude as a float
    prefix
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| CoerceError::NotFinite {
            input: input.to_string(),
        })
}

fn to_bool(input: &str) -> bool {
    !matches!(
        input.to_lowercase().as_str(),
        "" | "0" | "false" | "null" | "nan" | "undefined" | "no" | "off" | "disabled"
    )
}

/// Splits on commas, dropping spaces and tabs that pad the separators.
fn split_list(input: &str) -> Vec<&str> {
    let is_pad = |c: char| c == ' ' || c == '\t';
    let parts: Vec<&str> = input.split(',').collect();
    let last = parts.len() - 1;
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let mut part = part;
            if i > 0 {
                part = part.trim_start_matches(is_pad);
            }
            if i < last {
                part = part.trim_end_matches(is_pad);
            }
            part
        })
        .collect()
}
