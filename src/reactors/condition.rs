//! # Match rules.
//!
//! A reactor's predicate is a list of [`MatchRule`]s over the parsed
//! message body. All rules must hold (AND); an empty list accepts every
//! message. A body that does not parse as JSON is rejected by any
//! non-empty rule list — match failures are indistinguishable from
//! non-matches by design.

use serde::Deserialize;
use serde_json::Value;

/// One condition over the message body.
///
/// `path` is a dot-separated route into the JSON document (`"meta.kind"`,
/// numeric segments index into arrays). `equals` is the accepted value;
/// when it is an array, the rule holds if the field equals the array
/// itself or any of its elements (any-of shorthand).
#[derive(Clone, Debug, Deserialize)]
pub struct MatchRule {
    pub path: String,
    pub equals: Value,
}

impl MatchRule {
    fn holds(&self, body: &Value) -> bool {
        let Some(found) = lookup(body, &self.path) else {
            return false;
        };
        if found == &self.equals {
            return true;
        }
        match &self.equals {
            Value::Array(options) => options.iter().any(|v| v == found),
            _ => false,
        }
    }
}

/// Applies all rules to a parsed body. `None` body (not JSON) only
/// matches an empty rule list.
pub(crate) fn matches(rules: &[MatchRule], body: Option<&Value>) -> bool {
    if rules.is_empty() {
        return true;
    }
    let Some(body) = body else { return false };
    rules.iter().all(|r| r.holds(body))
}

/// Walks a dot-separated path through objects and arrays.
pub(crate) fn lookup<'a>(mut value: &'a Value, path: &str) -> Option<&'a Value> {
    for segment in path.split('.') {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}
