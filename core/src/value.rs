//! Runtime value type
//!
//! Block values are loosely typed: every input slot may receive a number,
//! a string or a boolean, and primitives cast on read. The casting rules
//! here follow the legacy behaviour scripts depend on (e.g. `"0"` is
//! falsy, `" "` is not numeric when compared).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/* ===================== Value ===================== */

/// A value reported by a block or stored in a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Value {
    /// Cast to a number. Unparseable input and NaN become 0.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => {
                if n.is_nan() {
                    0.0
                } else {
                    *n
                }
            }
            Value::Str(s) => parse_number(s).unwrap_or(0.0),
        }
    }

    /// Cast to a boolean
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        }
    }

    /// Number if this value reads as one; whitespace-only strings do not
    fn as_strict_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Num(n) if n.is_nan() => None,
            Value::Num(n) => Some(*n),
            Value::Str(s) => parse_number(s),
        }
    }

    /// Compare two values: numerically when both are numeric, otherwise
    /// as case-insensitive strings.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self.as_strict_number(), other.as_strict_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => {
                let a = self.to_string().to_lowercase();
                let b = other.to_string().to_lowercase();
                a.cmp(&b)
            }
        }
    }

    /// Loose equality used by `operator_equals`
    pub fn loosely_equals(&self, other: &Value) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => trimmed.parse::<f64>().ok().filter(|n| !n.is_nan()),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
