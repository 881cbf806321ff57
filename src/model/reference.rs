use serde_json::Value;

/// An identifier picked by the user, either from a list (which also gives
/// a display label) or typed in directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub value: Value,
    pub label: Option<String>,
}

impl Reference {
    /// Unwrap a parameter value that may or may not carry the `{value}` wrapper.
    pub fn from_value(raw: &Value) -> Self {
        match raw {
            Value::Object(map) if map.contains_key("value") => Reference {
                value: map.get("value").cloned().unwrap_or(Value::Null),
                label: map
                    .get("cachedResultName")
                    .or_else(|| map.get("label"))
                    .and_then(Value::as_str)
                    .map(String::from),
            },
            other => Reference {
                value: other.clone(),
                label: None,
            },
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        coerce_number(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        is_blank(&self.value)
    }
}

/// Lenient numeric reading: numbers pass, numeric strings parse, blanks
/// count as zero and anything else is not a number.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// A whole number greater than zero, or nothing.
pub fn positive_integer(value: &Value) -> Option<u64> {
    coerce_number(value)
        .filter(|n| *n > 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
        .map(|n| n as u64)
}

pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
