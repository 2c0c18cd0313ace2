//! Compiler Session and Entry Point
//!
//! A session owns the watch-ID counter and the state-variable set. The
//! counter belongs to the session, not to the process: it resets at the start
//! of every compile, so a template always produces the same IDs no matter
//! what compiled before it.

use crate::emit::{Emitter, SectionFragment};
use crate::frame::DirectiveMachine;
use crate::report::CompileWarning;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[cfg(feature = "napi")]
use napi_derive::napi;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompileResult {
    /// The document body as one JS template-literal interior.
    pub body: String,
    /// Section fragments, in source order; each also appears in the body.
    pub sections: Vec<SectionFragment>,
    pub warnings: Vec<CompileWarning>,
}

pub struct CompilerSession {
    watch_counter: u64,
    state_vars: HashSet<String>,
}

impl CompilerSession {
    pub fn new(state_vars: HashSet<String>) -> Self {
        CompilerSession {
            watch_counter: 0,
            state_vars,
        }
    }

    pub fn state_vars(&self) -> &HashSet<String> {
        &self.state_vars
    }

    /// Pre-increment, so the first reactive block of a compile is `watch-1`.
    pub(crate) fn next_watch_number(&mut self) -> u64 {
        self.watch_counter += 1;
        self.watch_counter
    }

    /// Compile one template. Malformed input degrades to literal text and
    /// warnings; this never fails.
    pub fn compile(&mut self, source: &str) -> CompileResult {
        self.watch_counter = 0;
        let mut machine = DirectiveMachine::new(self);
        let (body, sections) = Emitter::new(&mut machine).run(source);
        let warnings = machine.warnings;
        CompileResult {
            body,
            sections,
            warnings,
        }
    }
}

/// One-shot convenience over [`CompilerSession`].
pub fn compile_template(source: &str, state_vars: HashSet<String>) -> CompileResult {
    CompilerSession::new(state_vars).compile(source)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_template_native(source: String, state_vars: Vec<String>) -> serde_json::Value {
    let result = compile_template(&source, state_vars.into_iter().collect());
    serde_json::to_value(&result).unwrap_or(serde_json::Value::Null)
}

#[cfg(feature = "napi")]
#[napi]
pub fn convert_expression_native(expr: String) -> String {
    crate::convert::convert_expression(&expr)
}

#[cfg(feature = "napi")]
#[napi]
pub fn dependencies_native(js_expr: String, state_vars: Vec<String>) -> Vec<String> {
    crate::reactive::dependencies_of(&js_expr, &state_vars.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(vars: &[&str]) -> HashSet<String> {
        vars.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counter_resets_between_compiles() {
        let mut session = CompilerSession::new(state(&["count"]));
        let first = session.compile("@if($count)a@endif");
        let second = session.compile("@if($count)b@endif");
        assert!(first.body.contains("watch-1"));
        assert!(second.body.contains("watch-1"));
        assert!(!second.body.contains("watch-2"));
    }

    #[test]
    fn test_three_reactive_blocks_get_increasing_ids() {
        let result = compile_template(
            "@if($a)1@endif@if($b)2@endif@if($c)3@endif",
            state(&["a", "b", "c"]),
        );
        let pos1 = result.body.find("watch-1").unwrap();
        let pos2 = result.body.find("watch-2").unwrap();
        let pos3 = result.body.find("watch-3").unwrap();
        assert!(pos1 < pos2 && pos2 < pos3, "got: {}", result.body);
        assert!(!result.body.contains("watch-4"));
    }

    #[test]
    fn test_result_serializes() {
        let result = compile_template("@endif", state(&[]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["warnings"][0]["code"], "BL-W002");
    }
}
