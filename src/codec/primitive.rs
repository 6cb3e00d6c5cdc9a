use crate::report::quote;
use crate::spec::{SchemaSpec, SchemaType};
use serde_json::{Number, Value};

/// Coerce one wire token to the primitive type its schema declares.
///
/// Booleans accept `true`/`false` in any case and nothing else. Integers and
/// numbers accept anything Rust parses as a finite `f64`, with no surrounding
/// whitespace. Integers must have no fractional part and always decode to an
/// integer value. Strings, files and untyped values pass through unchanged.
pub fn coerce(schema: Option<&SchemaSpec>, raw: &str) -> Result<Value, String> {
    let Some(ty) = schema.and_then(|s| s.schema_type) else {
        return Ok(Value::String(raw.to_string()));
    };
    match ty {
        SchemaType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(mismatch(ty, raw))
            }
        }
        SchemaType::Integer => {
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::from(i));
            }
            if let Ok(u) = raw.parse::<u64>() {
                return Ok(Value::from(u));
            }
            // `1.0` and `1e3` decode exactly like `1` and `1000`.
            match parse_finite(raw) {
                Some(f) if f.fract() == 0.0 && (I64_MIN..I64_END).contains(&f) => {
                    Ok(Value::from(f as i64))
                }
                Some(f) if f.fract() == 0.0 && (0.0..U64_END).contains(&f) => {
                    Ok(Value::from(f as u64))
                }
                _ => Err(mismatch(ty, raw)),
            }
        }
        SchemaType::Number => {
            if let Ok(i) = raw.parse::<i64>() {
                return Ok(Value::from(i));
            }
            parse_finite(raw)
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(ty, raw))
        }
        SchemaType::String | SchemaType::File | SchemaType::Array | SchemaType::Object => {
            Ok(Value::String(raw.to_string()))
        }
    }
}

const I64_MIN: f64 = -9_223_372_036_854_775_808.0;
const I64_END: f64 = 9_223_372_036_854_775_808.0;
const U64_END: f64 = 18_446_744_073_709_551_616.0;

/// Surrounding whitespace is not part of a number.
fn parse_finite(raw: &str) -> Option<f64> {
    if raw.trim() != raw {
        return None;
    }
    raw.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn mismatch(ty: SchemaType, raw: &str) -> String {
    format!(
        "Expected {}. Received: {}",
        ty.described(),
        quote(&Value::String(raw.to_string()))
    )
}
