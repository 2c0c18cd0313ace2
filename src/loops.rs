//! Loop Directives — `@foreach`, `@for`, `@while`
//!
//! `foreach` renders each item through a runtime callback and interpolates the
//! joined result; `for` and `while` accumulate into a loop-local buffer
//! variable that block directives nested inside them append to with `+=`.
//!
//! A malformed header (`@foreach` without `as`, `@for` that is not the
//! `$i = start; $i OP end; $i++` shape) is not an error: the handler declines
//! and the emitter passes the whole occurrence through as literal text.

use crate::convert::convert_expression;
use crate::frame::{DirectiveMachine, Frame, FrameKind};
use crate::reactive::{dependencies_of, render_watch_keys};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `arrayExpr as $value` or `arrayExpr as $key => $value`.
    static ref FOREACH_HEADER_RE: Regex =
        Regex::new(r"^\s*(.*?)\s+as\s+\$?(\w+)(\s*=>\s*\$?(\w+))?\s*$").unwrap();
    /// `$i = start; $i OP end; $i++`. The three variable positions are
    /// captured separately and compared in code.
    static ref FOR_HEADER_RE: Regex = Regex::new(
        r"^\s*\$?(\w+)\s*=\s*(.*?);\s*\$?(\w+)\s*([<>=!]+)\s*(.*?);\s*\$?(\w+)\s*\+\+\s*$"
    )
    .unwrap();
}

impl DirectiveMachine<'_> {
    // ═══════════════════════════════════════════════════════════════════════════
    // FOREACH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Returns `false` when the header does not parse; the caller falls
    /// through to literal-text handling.
    pub(crate) fn open_foreach(&mut self, raw_args: &str, is_attribute: bool) -> bool {
        let caps = match FOREACH_HEADER_RE.captures(raw_args) {
            Some(caps) => caps,
            None => return false,
        };
        let array_expr = convert_expression(&caps[1]);
        let first_var = &caps[2];

        let callback = if caps.get(3).is_some() {
            // key => value form: the first name is the key.
            format!("({}, {}, __loopIndex, __loop) => `", &caps[4], first_var)
        } else {
            format!("({}, __loopKey, __loopIndex, __loop) => `", first_var)
        };

        let watch_keys = dependencies_of(&array_expr, self.session.state_vars());
        let foreach_call = format!("this.__foreach({}, {}", array_expr, callback);

        // A non-state array never re-renders, so it gets no subscription and
        // no watch ID. Attribute context is always bare.
        let reactive = !is_attribute && !watch_keys.is_empty();
        let fragment = if reactive {
            let id = self.next_watch_id_flat();
            format!(
                "${{this.__reactive(`{}`, {}, () => {}",
                id,
                render_watch_keys(&watch_keys),
                foreach_call
            )
        } else {
            format!("${{{}", foreach_call)
        };

        let open_index = self.output.len();
        let parent_is_loop = self.parent_is_loop();
        self.push_fragment(fragment);
        self.stack.push(Frame {
            kind: FrameKind::ForEach { reactive },
            open_index,
            watch_keys,
            is_attribute,
            parent_is_loop,
        });
        true
    }

    pub(crate) fn close_foreach(&mut self, position: usize) {
        if let Some(frame) = self.pop_matching("endforeach", position, |k| {
            matches!(k, FrameKind::ForEach { .. })
        }) {
            let closer = match frame.kind {
                FrameKind::ForEach { reactive: true } => "`))}",
                _ => "`)}",
            };
            self.push_fragment(closer.to_string());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FOR
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn open_for(&mut self, raw_args: &str, is_attribute: bool) -> bool {
        let caps = match FOR_HEADER_RE.captures(raw_args) {
            Some(caps) => caps,
            None => return false,
        };
        // All three positions must name the same counter variable.
        if caps[1] != caps[3] || caps[1] != caps[6] {
            return false;
        }
        let var_name = &caps[1];
        let start = convert_expression(&caps[2]);
        let operator = &caps[4];
        let end = convert_expression(&caps[5]);

        let mut watch_keys = dependencies_of(&start, self.session.state_vars());
        for key in dependencies_of(&end, self.session.state_vars()) {
            if !watch_keys.contains(&key) {
                watch_keys.push(key);
            }
        }

        let for_call = format!(
            "this.__for('increment', {start}, {end}, (__loop) => {{\nlet __forOutputContent__ = ``;\nfor (let {var} = {start}; {var} {op} {end}; {var}++) {{__loop.setCurrentTimes({var});",
            start = start,
            end = end,
            var = var_name,
            op = operator,
        );

        let reactive = !is_attribute && !watch_keys.is_empty();
        let fragment = if reactive {
            let id = self.next_watch_id_flat();
            format!(
                "${{this.__reactive(`{}`, {}, () => {{ return {}",
                id,
                render_watch_keys(&watch_keys),
                for_call
            )
        } else {
            format!("${{{}", for_call)
        };

        let open_index = self.output.len();
        let parent_is_loop = self.parent_is_loop();
        self.push_fragment(fragment);
        self.stack.push(Frame {
            kind: FrameKind::For { reactive },
            open_index,
            watch_keys,
            is_attribute,
            parent_is_loop,
        });
        true
    }

    pub(crate) fn close_for(&mut self, position: usize) {
        if let Some(frame) = self.pop_matching("endfor", position, |k| {
            matches!(k, FrameKind::For { .. })
        }) {
            let closer = match frame.kind {
                FrameKind::For { reactive: true } => {
                    "\n}\nreturn __forOutputContent__;\n})\n})}"
                }
                _ => "\n}\nreturn __forOutputContent__;\n})\n}",
            };
            self.push_fragment(closer.to_string());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WHILE
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn open_while(&mut self, raw_args: &str, is_attribute: bool) {
        let condition = convert_expression(raw_args.trim());
        let watch_keys = dependencies_of(&condition, self.session.state_vars());

        let while_logic = format!(
            "let __whileOutputContent__ = ``;\nwhile({}) {{",
            condition
        );

        let reactive = !is_attribute && !watch_keys.is_empty();
        let fragment = if reactive {
            let id = self.next_watch_id_flat();
            format!(
                "${{this.__reactive(`{}`, {}, () => {{\n{}",
                id,
                render_watch_keys(&watch_keys),
                while_logic
            )
        } else {
            format!("${{this.__execute(() => {{\n{}", while_logic)
        };

        let open_index = self.output.len();
        let parent_is_loop = self.parent_is_loop();
        self.push_fragment(fragment);
        self.stack.push(Frame {
            kind: FrameKind::While { reactive },
            open_index,
            watch_keys,
            is_attribute,
            parent_is_loop,
        });
    }

    pub(crate) fn close_while(&mut self, position: usize) {
        if self
            .pop_matching("endwhile", position, |k| {
                matches!(k, FrameKind::While { .. })
            })
            .is_some()
        {
            self.push_fragment("\n}\nreturn __whileOutputContent__;\n})}".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompilerSession;

    fn session(vars: &[&str]) -> CompilerSession {
        CompilerSession::new(vars.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_foreach_non_state_array_is_bare() {
        let mut s = session(&["count"]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(m.open_foreach("$items as $item", false));
        m.close_foreach(0);
        let js = m.output.concat();
        assert_eq!(
            js,
            "${this.__foreach(items, (item, __loopKey, __loopIndex, __loop) => ``)}"
        );
    }

    #[test]
    fn test_foreach_state_array_is_reactive() {
        let mut s = session(&["items"]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(m.open_foreach("$items as $item", false));
        m.close_foreach(0);
        let js = m.output.concat();
        assert_eq!(
            js,
            "${this.__reactive(`${__VIEW_ID__}-watch-1`, [\"items\"], () => this.__foreach(items, (item, __loopKey, __loopIndex, __loop) => ``))}"
        );
    }

    #[test]
    fn test_foreach_key_value_callback_order() {
        let mut s = session(&[]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(m.open_foreach("$users as $id => $user", false));
        let js = m.output.concat();
        assert!(js.contains("(user, id, __loopIndex, __loop) => `"), "got: {}", js);
    }

    #[test]
    fn test_foreach_without_as_declines() {
        let mut s = session(&[]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(!m.open_foreach("$items", false));
        assert!(m.output.is_empty());
        assert!(m.stack.is_empty());
    }

    #[test]
    fn test_for_header_parses_and_emits_buffer_loop() {
        let mut s = session(&[]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(m.open_for("$i = 0; $i < 3; $i++", false));
        m.close_for(0);
        let js = m.output.concat();
        assert_eq!(
            js,
            "${this.__for('increment', 0, 3, (__loop) => {\nlet __forOutputContent__ = ``;\nfor (let i = 0; i < 3; i++) {__loop.setCurrentTimes(i);\n}\nreturn __forOutputContent__;\n})\n}"
        );
    }

    #[test]
    fn test_for_mismatched_counter_names_decline() {
        let mut s = session(&[]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(!m.open_for("$i = 0; $j < 3; $i++", false));
        assert!(!m.open_for("$i = 0; $i < 3; $i--", false));
    }

    #[test]
    fn test_for_reactive_bound() {
        let mut s = session(&["total"]);
        let mut m = DirectiveMachine::new(&mut s);
        assert!(m.open_for("$i = 0; $i < $total; $i++", false));
        m.close_for(0);
        let js = m.output.concat();
        assert!(js.starts_with(
            "${this.__reactive(`${__VIEW_ID__}-watch-1`, [\"total\"], () => { return this.__for('increment', 0, total, (__loop) => {"
        ));
        assert!(js.ends_with("\n}\nreturn __forOutputContent__;\n})\n})}"));
    }

    #[test]
    fn test_while_bare_and_reactive() {
        let mut s = session(&["running"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_while("$done", false);
        m.close_while(0);
        let bare = m.output.concat();
        assert!(bare.starts_with("${this.__execute(() => {\nlet __whileOutputContent__ = ``;\nwhile(done) {"));
        assert!(bare.ends_with("\n}\nreturn __whileOutputContent__;\n})}"));

        m.output.clear();
        m.open_while("$running", false);
        m.close_while(0);
        let reactive = m.output.concat();
        assert!(reactive.contains("__reactive"));
        assert!(reactive.contains("[\"running\"]"));
    }
}
