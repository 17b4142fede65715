//! Template interpolation for step inputs.
//!
//! Pipeline configs and agent prompts reference upstream outputs with
//! `{{dotted.path}}` placeholders. [`interpolate`] substitutes each
//! placeholder with the stringified value found in the run context;
//! [`interpolate_value`] applies the same substitution recursively through
//! nested JSON structures (used for tool configs).
//!
//! # Resolution rules
//!
//! A path is resolved segment by segment against the context. When a segment
//! misses, a single fallback level is tried: the top-level context values are
//! scanned in insertion order and the first object containing the segment
//! continues the walk. A direct path always wins over the fallback; among
//! fallback candidates the first context entry wins. That ordering is an
//! observable contract, which is why the crate enables `serde_json`'s
//! `preserve_order` feature.
//!
//! Placeholders that still fail to resolve are preserved verbatim, so
//! interpolation is idempotent on fully resolved strings.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

lazy_static! {
    /// `{{ ... }}` with anything but a closing brace inside.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{([^}]+)\}\}").expect("valid placeholder regex");
}

/// Replace every `{{path}}` placeholder in `template` with the value resolved
/// from `ctx`. Unresolved placeholders are left untouched.
pub fn interpolate(template: &str, ctx: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let path = caps[1].trim();
            match resolve(path, ctx) {
                Some(value) => render(&value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Recursively interpolate a JSON structure: strings are interpolated,
/// objects are traversed, string elements of arrays are interpolated, and
/// everything else passes through unchanged.
pub fn interpolate_value(value: &Value, ctx: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, ctx)),
        Value::Object(map) => Value::Object(interpolate_map(map, ctx)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Value::String(interpolate(s, ctx)),
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// [`interpolate_value`] over every entry of a JSON object.
pub fn interpolate_map(map: &Map<String, Value>, ctx: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), interpolate_value(value, ctx)))
        .collect()
}

/// Walk `path` through the context, falling back one level into child
/// objects whenever a segment misses at the current position.
fn resolve(path: &str, ctx: &Map<String, Value>) -> Option<Value> {
    let mut current = Value::Object(ctx.clone());

    for segment in path.split('.') {
        let direct = current
            .as_object()
            .and_then(|obj| obj.get(segment))
            .cloned();

        match direct {
            Some(next) => current = next,
            None => {
                // One fallback level: the first top-level child object that
                // contains this segment continues the walk.
                let fallback = ctx
                    .values()
                    .filter_map(|v| v.as_object())
                    .find_map(|obj| obj.get(segment))
                    .cloned();
                match fallback {
                    Some(next) => current = next,
                    None => return None,
                }
            }
        }
    }

    Some(current)
}

/// Stringify a resolved value: nulls render empty, strings render bare, and
/// everything else renders in its canonical JSON form.
fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().expect("object context").clone()
    }

    #[test]
    fn substitutes_simple_variables() {
        let ctx = ctx(json!({"name": "Ada"}));
        assert_eq!(interpolate("Hello {{name}}!", &ctx), "Hello Ada!");
    }

    #[test]
    fn strips_whitespace_inside_braces() {
        let ctx = ctx(json!({"name": "Ada"}));
        assert_eq!(interpolate("Hello {{  name  }}!", &ctx), "Hello Ada!");
    }

    #[test]
    fn resolves_dotted_paths() {
        let ctx = ctx(json!({"search": {"query": "rust"}}));
        assert_eq!(interpolate("q={{search.query}}", &ctx), "q=rust");
    }

    #[test]
    fn preserves_unresolved_placeholders() {
        let ctx = Map::new();
        assert_eq!(interpolate("{{x.y}}", &ctx), "{{x.y}}");
    }

    #[test]
    fn idempotent_on_resolved_strings() {
        let ctx = ctx(json!({"a": "1"}));
        let once = interpolate("{{a}} and {{missing}}", &ctx);
        assert_eq!(interpolate(&once, &ctx), once);
    }

    #[test]
    fn falls_back_into_child_objects() {
        let ctx = ctx(json!({"step1": {"result": "found"}}));
        assert_eq!(interpolate("{{result}}", &ctx), "found");
    }

    #[test]
    fn direct_path_wins_over_fallback() {
        let ctx = ctx(json!({
            "result": "direct",
            "step1": {"result": "nested"}
        }));
        assert_eq!(interpolate("{{result}}", &ctx), "direct");
    }

    #[test]
    fn first_child_object_wins_among_fallbacks() {
        let ctx = ctx(json!({
            "step1": {"result": "first"},
            "step2": {"result": "second"}
        }));
        assert_eq!(interpolate("{{result}}", &ctx), "first");
    }

    #[test]
    fn null_renders_empty_and_numbers_render_canonically() {
        let ctx = ctx(json!({"a": null, "b": 3, "c": true}));
        assert_eq!(interpolate("[{{a}}|{{b}}|{{c}}]", &ctx), "[|3|true]");
    }

    #[test]
    fn interpolates_nested_structures() {
        let ctx = ctx(json!({"idea": "llm crm"}));
        let config = json!({
            "query": "{{idea}} competitors",
            "nested": {"echo": "{{idea}}"},
            "list": ["{{idea}}", 7],
            "count": 5
        });
        let out = interpolate_value(&config, &ctx);
        assert_eq!(
            out,
            json!({
                "query": "llm crm competitors",
                "nested": {"echo": "llm crm"},
                "list": ["llm crm", 7],
                "count": 5
            })
        );
    }
}
