use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Structural equality over JSON values.
///
/// Objects compare by key set and per-key value, so key order never
/// matters. Numbers compare numerically (`1` equals `1.0`). A missing value
/// and `null` are only equal to each other.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, v)| ym.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly; an integer equals a float only when the float
/// is integral and converts to that same integer without loss.
fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (x.is_f64(), y.is_f64()) {
        (false, false) => integer(x) == integer(y),
        (true, true) => x.as_f64() == y.as_f64(),
        (true, false) => float_is_integer(x.as_f64(), y),
        (false, true) => float_is_integer(y.as_f64(), x),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn float_is_integer(f: Option<f64>, n: &Number) -> bool {
    let (Some(f), Some(i)) = (f, integer(n)) else {
        return false;
    };
    f.is_finite() && f.fract() == 0.0 && f as i128 == i && i as f64 == f
}

/// Keys whose values differ between `original` and `updated`, with their
/// new values. `fields` restricts the comparison to the named keys. A key
/// absent on either side counts as `null`, so a cleared field shows up as
/// an explicit `null`.
pub fn extract_changed_fields(
    original: &Map<String, Value>,
    updated: &Map<String, Value>,
    fields: Option<&[&str]>,
) -> Map<String, Value> {
    let keys: Vec<&str> = match fields {
        Some(f) => f.to_vec(),
        None => {
            let mut keys: Vec<&str> = updated.keys().map(String::as_str).collect();
            keys.extend(
                original
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !updated.contains_key(*k)),
            );
            keys
        }
    };
    let mut changed = Map::new();
    for key in keys {
        let old_value = original.get(key).unwrap_or(&Value::Null);
        let new_value = updated.get(key).unwrap_or(&Value::Null);
        if !values_equal(old_value, new_value) {
            changed.insert(key.to_string(), new_value.clone());
        }
    }
    changed
}

/// Typed form of [`extract_changed_fields`]. If either side fails to
/// serialize to a JSON object the failure is logged and an empty patch is
/// returned.
pub fn changed_fields<S: Serialize>(
    original: &S,
    updated: &S,
    fields: Option<&[&str]>,
) -> Map<String, Value> {
    match (serde_json::to_value(original), serde_json::to_value(updated)) {
        (Ok(Value::Object(old)), Ok(Value::Object(new))) => {
            extract_changed_fields(&old, &new, fields)
        }
        _ => {
            warn!("could not serialize values for field diff");
            Map::new()
        }
    }
}
