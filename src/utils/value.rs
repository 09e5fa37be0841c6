use serde_json::Value;

/// Convert arbitrary JSON values into sanitized strings for user attributes.
pub fn value_to_string(value: Value) -> String {
    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    sanitize_attribute_value(raw)
}

/// Strip control characters so attribute values stay single-line.
fn sanitize_attribute_value(s: String) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}
