//! `${Name}` placeholder substitution for plan and validation parameters.

use serde_json::Value;

/// Substitute `${Name}` placeholders in every string inside `value`.
///
/// A string that is exactly one placeholder takes the looked-up value as is,
/// so numbers and booleans keep their type. Placeholders `lookup` cannot
/// resolve are left verbatim and their names are pushed onto `unresolved`.
pub fn substitute<F>(value: &Value, lookup: &F, unresolved: &mut Vec<String>) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    match value {
        Value::String(s) => substitute_str(s, lookup, unresolved),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute(v, lookup, unresolved))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, lookup, unresolved)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str<F>(s: &str, lookup: &F, unresolved: &mut Vec<String>) -> Value
where
    F: Fn(&str) -> Option<Value>,
{
    if let Some(name) = whole_placeholder(s) {
        return match lookup(name) {
            Some(v) => v,
            None => {
                unresolved.push(name.to_string());
                Value::String(s.to_string())
            }
        };
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &after[..end];
        match lookup(name) {
            Some(Value::String(v)) => out.push_str(&v),
            Some(Value::Null) | None => {
                unresolved.push(name.to_string());
                out.push_str(&rest[start..start + 2 + end + 1]);
            }
            Some(other) => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Value::String(out)
}

fn whole_placeholder(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    (!inner.is_empty() && !inner.contains('}') && !inner.contains("${")).then_some(inner)
}
