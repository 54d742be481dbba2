//! Default three-way comparison used by client-side evaluation.
//!
//! Values compare with loose equality and numeric coercion. Strings are
//! ordered with [`locale_compare`], `null` never orders against anything but
//! another `null`.

use std::cmp::Ordering;

use serde_json::Value;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Returns `None` when the values are not comparable.
pub fn default_comparator(a: &Value, b: &Value) -> Option<Ordering> {
    if loose_equals(a, b) {
        return Some(Ordering::Equal);
    }
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Value::String(a), Value::String(b)) = (a, b) {
        return Some(locale_compare(a, b));
    }

    let (a, b) = (to_number(a), to_number(b));
    if a < b {
        Some(Ordering::Less)
    } else if a > b {
        Some(Ordering::Greater)
    } else {
        None
    }
}

/// Equality with type coercion between numbers, numeric strings and booleans.
/// Arrays and objects equal a primitive only through their string form and
/// never equal each other.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_), Value::Number(_)) => to_number(a) == to_number(b),
        (Value::Bool(flag), other) | (other, Value::Bool(flag)) => {
            loose_equals(&Value::from(u8::from(*flag)), other)
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => to_number(a) == to_number(b),
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => false,
        (composite @ (Value::Array(_) | Value::Object(_)), primitive)
        | (primitive, composite @ (Value::Array(_) | Value::Object(_))) => {
            loose_equals(&Value::String(to_js_string(composite)), primitive)
        }
    }
}

/// Locale-aware string ordering: base letters first, then accents, then
/// case (lower before upper), then code points.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    base_key(a)
        .cmp(&base_key(b))
        .then_with(|| accent_key(a).cmp(&accent_key(b)))
        .then_with(|| case_key(a).cmp(&case_key(b)))
        .then_with(|| a.cmp(b))
}

fn base_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn accent_key(s: &str) -> String {
    s.nfd().flat_map(char::to_lowercase).collect()
}

fn case_key(s: &str) -> Vec<bool> {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(char::is_uppercase)
        .collect()
}

/// Numeric coercion, `NaN` for values without a numeric reading.
pub(crate) fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number(s),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    // `str::parse` also accepts "inf" and "nan"
    if s.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

pub(crate) fn to_js_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            // -0 打印为 "0"
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_js_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_large_integers_stringify_exactly() {
        assert_eq!(to_js_string(&json!(1e20)), "100000000000000000000");
        assert_eq!(to_js_string(&json!(-3.0)), "-3");
        assert_eq!(to_js_string(&json!(-0.0)), "0");
        assert_eq!(to_js_string(&json!(2.5)), "2.5");
        assert_eq!(
            default_comparator(&json!([1e20]), &json!("100000000000000000000")),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_loose_equality_short_circuits() {
        assert_eq!(default_comparator(&json!(5), &json!("5")), Some(Ordering::Equal));
        assert_eq!(default_comparator(&json!(true), &json!(1)), Some(Ordering::Equal));
        assert_eq!(default_comparator(&json!(null), &json!(null)), Some(Ordering::Equal));
        assert_eq!(default_comparator(&json!([5]), &json!(5)), Some(Ordering::Equal));
    }

    #[test]
    fn test_null_is_not_comparable() {
        assert_eq!(default_comparator(&json!(null), &json!(5)), None);
        assert_eq!(default_comparator(&json!("a"), &json!(null)), None);
        assert_eq!(default_comparator(&json!(null), &json!(0)), None);
    }

    #[test]
    fn test_strings_use_locale_order() {
        assert_eq!(default_comparator(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(default_comparator(&json!("a"), &json!("B")), Some(Ordering::Less));
        assert_eq!(default_comparator(&json!("é"), &json!("f")), Some(Ordering::Less));
        assert_eq!(default_comparator(&json!("10"), &json!("9")), Some(Ordering::Less));
    }

    #[test]
    fn test_locale_compare_tie_breaks() {
        assert_eq!(locale_compare("e", "é"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("résumé", "resume"), Ordering::Greater);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(default_comparator(&json!(1), &json!(2)), Some(Ordering::Less));
        assert_eq!(default_comparator(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(default_comparator(&json!("10"), &json!(9)), Some(Ordering::Greater));
        assert_eq!(default_comparator(&json!(false), &json!(1)), Some(Ordering::Less));
    }

    #[test]
    fn test_no_relation_is_not_comparable() {
        assert_eq!(default_comparator(&json!({}), &json!({})), None);
        assert_eq!(default_comparator(&json!("abc"), &json!(1)), None);
        assert_eq!(default_comparator(&json!([1, 2]), &json!([1, 2])), None);
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(to_number(&json!(" 42 ")), 42.0);
        assert_eq!(to_number(&json!("")), 0.0);
        assert_eq!(to_number(&json!("0x10")), 16.0);
        assert_eq!(to_number(&json!("1e3")), 1000.0);
        assert!(to_number(&json!("inf")).is_nan());
        assert_eq!(to_number(&json!("-Infinity")), f64::NEG_INFINITY);
    }
}
