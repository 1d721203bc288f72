//! Primitive validators for loosely typed JSON input.
//!
//! A field counts as absent when it is missing, `null` or the empty string.
//! Coercions follow what a browser form would send: numbers may arrive as
//! strings, booleans as `"true"`/`"false"`.

use crate::error::{GenerationError, Result};
use crate::models::Choice;
use serde_json::Value;

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Length is measured on the value as sent, untrimmed, in UTF-16 code units
/// so limits agree with the browser's `maxLength` counters.
fn check_length(value: &str, name: &str, max_length: usize) -> Result<()> {
    if value.encode_utf16().count() > max_length {
        return Err(GenerationError::validation(format!(
            "{} exceeds {} characters.",
            name, max_length
        )));
    }
    Ok(())
}

pub fn required_string(value: Option<&Value>, name: &str, max_length: usize) -> Result<String> {
    let raw = match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        _ => {
            return Err(GenerationError::validation(format!(
                "{} is required.",
                name
            )))
        }
    };
    check_length(raw, name, max_length)?;
    Ok(raw.trim().to_string())
}

pub fn optional_string(
    value: Option<&Value>,
    name: &str,
    max_length: usize,
) -> Result<Option<String>> {
    if is_absent(value) {
        return Ok(None);
    }
    let Some(Value::String(s)) = value else {
        return Err(GenerationError::validation(format!(
            "{} must be a string.",
            name
        )));
    };
    check_length(s, name, max_length)?;
    let trimmed = s.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// String form of a scalar, the way it would appear in a form field.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

pub fn choice<C: Choice>(value: Option<&Value>, default: Option<C>) -> Result<Option<C>> {
    if is_absent(value) {
        return Ok(default);
    }
    let raw = value.map(coerce_to_string).unwrap_or_default();
    C::from_wire(&raw).map(Some).ok_or_else(|| {
        GenerationError::validation(format!(
            "{} must be one of: {}",
            C::FIELD,
            C::wire_values().join(", ")
        ))
    })
}

/// Numeric value of a JSON scalar; `None` means "not a number".
fn coerce_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn bounded(value: Option<&Value>, name: &str, min: f64, max: f64) -> Result<Option<f64>> {
    if is_absent(value) {
        return Ok(None);
    }
    let num = value
        .and_then(coerce_to_number)
        .filter(|num| num.is_finite())
        .ok_or_else(|| GenerationError::validation(format!("{} must be a number.", name)))?;
    if num < min || num > max {
        return Err(GenerationError::validation(format!(
            "{} must be between {} and {}.",
            name, min, max
        )));
    }
    Ok(Some(num))
}

/// Accepted values are rounded half-up to one decimal place.
pub fn bounded_number(value: Option<&Value>, name: &str, min: f64, max: f64) -> Result<Option<f64>> {
    Ok(bounded(value, name, min, max)?.map(|num| (num * 10.0 + 0.5).floor() / 10.0))
}

pub fn bounded_integer(value: Option<&Value>, name: &str, min: i64, max: i64) -> Result<Option<i64>> {
    if is_absent(value) {
        return Ok(None);
    }
    let num = value
        .and_then(coerce_to_number)
        .filter(|num| num.is_finite() && num.fract() == 0.0)
        .ok_or_else(|| GenerationError::validation(format!("{} must be an integer.", name)))?;
    if num < min as f64 || num > max as f64 {
        return Err(GenerationError::validation(format!(
            "{} must be between {} and {}.",
            name, min, max
        )));
    }
    Ok(Some(num as i64))
}

pub fn optional_boolean(value: Option<&Value>, default: bool) -> bool {
    if is_absent(value) {
        return default;
    }
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s == "true" => true,
        Some(Value::String(s)) if s == "false" => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => default,
    }
}
