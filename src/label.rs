//! Feature label extraction

use crate::config::DEFAULT_LABEL_KEYS;
use crate::geojson::Properties;
use serde_json::Value;

/// Whether a property value counts as present for labelling.
///
/// Falsy: `null`, `false`, `""`, `0`, `-0` and `NaN`. Everything else,
/// including empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => f != 0.0 && !f.is_nan(),
            None => true,
        },
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Picks a label using the default key priority
pub fn extract_label(properties: &Properties) -> Option<&Value> {
    extract_label_with(properties, &DEFAULT_LABEL_KEYS)
}

/// Picks a label: the first truthy value among `keys`, else the first truthy
/// value in property order.
pub fn extract_label_with<'a, S: AsRef<str>>(
    properties: &'a Properties,
    keys: &[S],
) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| properties.get(key.as_ref()))
        .find(|value| is_truthy(value))
        .or_else(|| properties.values().find(|value| is_truthy(value)))
}

/// Plain-text rendering of a label value; strings lose their quotes
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
