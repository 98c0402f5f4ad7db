//! Declarative rule checks over JSON resource representations.

use precept_core::CheckOp;
use regex::Regex;
use serde_json::{Map, Value};

/// Resolve a dotted field path against a resource map. A `null` leaf is
/// treated as absent.
pub(crate) fn field_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut cur = root.get(segments.next()?)?;
    for seg in segments {
        cur = cur.get(seg)?;
    }
    if cur.is_null() { None } else { Some(cur) }
}

/// Whether a resolved value passes one check.
pub(crate) fn passes(
    op: CheckOp,
    found: Option<&Value>,
    expected: Option<&Value>,
    pattern: Option<&Regex>,
) -> bool {
    match op {
        CheckOp::Required => found.is_some(),
        CheckOp::Forbidden => found.is_none(),
        CheckOp::Equals => found == expected,
        CheckOp::NotEquals => found.is_none() || found != expected,
        CheckOp::Pattern => match (found.and_then(Value::as_str), pattern) {
            (Some(s), Some(re)) => re.is_match(s),
            _ => false,
        },
        CheckOp::Min => compare_numbers(found, expected, |v, min| v >= min),
        CheckOp::Max => compare_numbers(found, expected, |v, max| v <= max),
        CheckOp::OneOf => match (found, expected.and_then(Value::as_array)) {
            (Some(v), Some(allowed)) => allowed.contains(v),
            _ => false,
        },
    }
}

fn compare_numbers(
    found: Option<&Value>,
    expected: Option<&Value>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (found.and_then(Value::as_f64), expected.and_then(Value::as_f64)) {
        (Some(v), Some(bound)) => cmp(v, bound),
        _ => false,
    }
}
