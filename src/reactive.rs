//! Reactive Dependency Tracking
//!
//! Decides which state variables a converted JavaScript expression reads. The
//! result drives the reactive/bare split at every block open site: a non-empty
//! dependency list means the block subscribes through a watch ID.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Method names: identifier after `.` and before `(`.
    static ref METHOD_NAME_RE: Regex =
        Regex::new(r"\.([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    /// Every word-boundary identifier, in source order.
    static ref IDENT_RE: Regex = Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\b").unwrap();
    /// Never state variables no matter what the state set says.
    static ref RESERVED: HashSet<&'static str> = [
        "if", "else", "return", "function", "const", "let", "var",
        "true", "false", "null", "undefined",
        "Array", "Object", "String", "Number",
        "App", "View", "Helper",
    ]
    .into_iter()
    .collect();
}

/// State variables the expression depends on, ordered by first occurrence,
/// deduplicated. `user.profile.getName()` with state `{user}` yields exactly
/// `["user"]` — member and method names never count.
pub fn dependencies_of(js_expr: &str, state_vars: &HashSet<String>) -> Vec<String> {
    let methods: HashSet<&str> = METHOD_NAME_RE
        .captures_iter(js_expr)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let mut seen = HashSet::new();
    let mut deps = Vec::new();

    for cap in IDENT_RE.captures_iter(js_expr) {
        let m = match cap.get(1) {
            Some(m) => m,
            None => continue,
        };
        let name = m.as_str();
        if RESERVED.contains(name) || methods.contains(name) {
            continue;
        }
        // Only the head of a member chain can be a dependency.
        if m.start() > 0 && js_expr.as_bytes()[m.start() - 1] == b'.' {
            continue;
        }
        if state_vars.contains(name) && seen.insert(name.to_string()) {
            deps.push(name.to_string());
        }
    }

    deps
}

/// Render a dependency list as the JS array literal the runtime subscribes
/// with: `["count", "user"]`.
pub fn render_watch_keys(keys: &[String]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("\"{}\"", k)).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(vars: &[&str]) -> HashSet<String> {
        vars.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_dependency() {
        assert_eq!(
            dependencies_of("count > 0", &state(&["count"])),
            vec!["count"]
        );
    }

    #[test]
    fn test_member_chain_head_only() {
        assert_eq!(
            dependencies_of("user.profile.getName()", &state(&["user", "profile"])),
            vec!["user"]
        );
    }

    #[test]
    fn test_non_state_identifiers_excluded() {
        assert!(dependencies_of("other + thing", &state(&["count"])).is_empty());
    }

    #[test]
    fn test_reserved_words_excluded() {
        // Even a state set that (wrongly) contains a reserved word never
        // produces it as a dependency.
        assert!(dependencies_of("true && App.go()", &state(&["true", "App"])).is_empty());
    }

    #[test]
    fn test_order_and_dedup() {
        assert_eq!(
            dependencies_of("b + a + b + a", &state(&["a", "b"])),
            vec!["b", "a"]
        );
    }

    #[test]
    fn test_method_name_matching_state_var() {
        // `count` appears only as a method; `items` is the dependency.
        assert_eq!(
            dependencies_of("items.count() > 0", &state(&["items", "count"])),
            vec!["items"]
        );
    }

    #[test]
    fn test_render_watch_keys() {
        assert_eq!(render_watch_keys(&[]), "[]");
        assert_eq!(
            render_watch_keys(&["count".to_string(), "user".to_string()]),
            "[\"count\", \"user\"]"
        );
    }
}
