//! Lenient readers for host values.
//!
//! Hosts report booleans as `0`/`1` and numbers as floats or strings in
//! places; these helpers accept every spelling seen in practice.

use serde_json::Value;

/// Reads a host flag: `true`/`false`, a nonzero/zero number, or `"1"`/`"0"`.
pub fn as_flag(value: &Value) -> Option<bool> {
	match value {
		Value::Bool(b) => Some(*b),
		Value::Number(n) => n.as_i64().map(|n| n != 0).or_else(|| n.as_f64().map(|f| f != 0.0)),
		Value::String(s) => s.trim().parse::<i64>().ok().map(|n| n != 0),
		_ => None,
	}
}

/// Reads a host integer.
pub fn as_int(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n.as_i64(),
		Value::String(s) => s.trim().parse().ok(),
		Value::Bool(b) => Some(i64::from(*b)),
		_ => None,
	}
}

/// Reads a host string; numbers are rendered the way the host would.
pub fn as_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Reads a list of host strings.
pub fn as_lines(value: &Value) -> Option<Vec<String>> {
	value.as_array()?.iter().map(as_string).collect()
}
