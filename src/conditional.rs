//! Conditional Directives — `@if` family and `@switch` family
//!
//! The if-family picks one of four closing shapes at open time from
//! `{attribute} × {parent_is_loop} × {watch_keys nonempty}` and records it on
//! the frame; `@endif` only replays what was chosen. `@elseif` widens the
//! frame's watch-key union and, when the block is reactive, re-renders the
//! already-emitted open fragment so the wrapper subscribes to every branch's
//! dependencies.
//!
//! The switch family nests differently: `@case`, `@default` and `@break`
//! never touch the frame stack, they emit straight into the switch buffer.

use crate::convert::convert_expression;
use crate::frame::{CloseShape, DirectiveMachine, Frame, FrameKind};
use crate::reactive::{dependencies_of, render_watch_keys};

fn render_if_open(
    shape: CloseShape,
    loop_buffer: Option<&str>,
    watch_id: Option<&str>,
    watch_keys: &[String],
    condition: &str,
) -> String {
    match shape {
        CloseShape::LoopReactive => format!(
            "{} += this.__reactive(`{}`, {}, () => {{ if({}){{ return `",
            loop_buffer.unwrap_or("__forOutputContent__"),
            watch_id.unwrap_or_default(),
            render_watch_keys(watch_keys),
            condition
        ),
        CloseShape::LoopBare => format!(
            "{} += (() => {{ if({}){{ return `",
            loop_buffer.unwrap_or("__forOutputContent__"),
            condition
        ),
        CloseShape::Bare => format!("${{this.__execute(() => {{ if({}){{ return `", condition),
        CloseShape::Reactive => format!(
            "${{this.__reactive(`{}`, {}, () => {{ if({}){{ return `",
            watch_id.unwrap_or_default(),
            render_watch_keys(watch_keys),
            condition
        ),
    }
}

impl DirectiveMachine<'_> {
    // ═══════════════════════════════════════════════════════════════════════════
    // IF FAMILY
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn open_if(&mut self, raw_args: &str, is_attribute: bool) {
        let condition = convert_expression(raw_args.trim());
        let watch_keys = dependencies_of(&condition, self.session.state_vars());
        let parent_is_loop = self.parent_is_loop();

        let shape = if parent_is_loop && !watch_keys.is_empty() {
            CloseShape::LoopReactive
        } else if parent_is_loop {
            CloseShape::LoopBare
        } else if is_attribute || watch_keys.is_empty() {
            CloseShape::Bare
        } else {
            CloseShape::Reactive
        };

        let watch_id = match shape {
            CloseShape::LoopReactive | CloseShape::Reactive => Some(self.next_watch_id()),
            CloseShape::LoopBare | CloseShape::Bare => None,
        };

        let fragment = render_if_open(
            shape,
            self.enclosing_loop_buffer(),
            watch_id.as_deref(),
            &watch_keys,
            &condition,
        );
        let open_index = self.output.len();
        self.push_fragment(fragment);
        self.stack.push(Frame {
            kind: FrameKind::If {
                shape,
                watch_id,
                condition,
            },
            open_index,
            watch_keys,
            is_attribute,
            parent_is_loop,
        });
    }

    pub(crate) fn handle_elseif(&mut self, raw_args: &str) {
        let condition = convert_expression(raw_args.trim());
        let new_keys = dependencies_of(&condition, self.session.state_vars());

        // Widen the open block's subscription to cover this branch too. The
        // open fragment is already in the output, so a reactive wrapper gets
        // re-rendered in place with the union.
        let loop_buffer = self.enclosing_loop_buffer();
        if let Some(frame) = self.stack.last_mut() {
            if let FrameKind::If {
                shape,
                watch_id,
                condition: open_condition,
            } = &frame.kind
            {
                for key in new_keys {
                    if !frame.watch_keys.contains(&key) {
                        frame.watch_keys.push(key);
                    }
                }
                if watch_id.is_some() {
                    self.output[frame.open_index] = render_if_open(
                        *shape,
                        loop_buffer,
                        watch_id.as_deref(),
                        &frame.watch_keys,
                        open_condition,
                    );
                }
            }
        }

        self.push_fragment(format!("`; }} else if({}){{ return `", condition));
    }

    pub(crate) fn handle_else(&mut self) {
        self.push_fragment("`; } else { return `".to_string());
    }

    pub(crate) fn close_if(&mut self, position: usize) {
        if let Some(frame) =
            self.pop_matching("endif", position, |k| matches!(k, FrameKind::If { .. }))
        {
            if let FrameKind::If { shape, .. } = frame.kind {
                self.push_fragment(shape.closer().to_string());
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SWITCH FAMILY
    // ═══════════════════════════════════════════════════════════════════════════

    pub(crate) fn open_switch(&mut self, raw_args: &str, is_attribute: bool) {
        let subject = convert_expression(raw_args.trim());
        let watch_keys = dependencies_of(&subject, self.session.state_vars());
        let parent_is_concat = self.parent_is_loop();
        let reactive = !is_attribute && !watch_keys.is_empty();

        let switch_logic = format!(
            "let __switchOutputContent__ = '';\nswitch({}) {{",
            subject
        );

        let fragment = match (parent_is_concat, reactive) {
            (true, false) => format!(
                "{} += this.__execute(() => {{\n{}",
                self.enclosing_loop_buffer().unwrap_or("__forOutputContent__"),
                switch_logic
            ),
            (true, true) => {
                let id = self.next_watch_id_flat();
                format!(
                    "{} += this.__reactive(`{}`, {}, () => {{\n{}",
                    self.enclosing_loop_buffer().unwrap_or("__forOutputContent__"),
                    id,
                    render_watch_keys(&watch_keys),
                    switch_logic
                )
            }
            (false, false) => format!("${{this.__execute(() => {{\n{}", switch_logic),
            (false, true) => {
                let id = self.next_watch_id_flat();
                format!(
                    "${{this.__reactive(`{}`, {}, () => {{\n{}",
                    id,
                    render_watch_keys(&watch_keys),
                    switch_logic
                )
            }
        };

        let open_index = self.output.len();
        self.push_fragment(fragment);
        self.stack.push(Frame {
            kind: FrameKind::Switch { parent_is_concat },
            open_index,
            watch_keys,
            is_attribute,
            parent_is_loop: parent_is_concat,
        });
    }

    pub(crate) fn handle_case(&mut self, raw_args: &str) {
        let value = convert_expression(raw_args.trim());
        self.push_fragment(format!(
            "\ncase {}:\n__switchOutputContent__ += `",
            value
        ));
    }

    pub(crate) fn handle_default(&mut self) {
        self.push_fragment("\ndefault:\n__switchOutputContent__ += `".to_string());
    }

    pub(crate) fn handle_break(&mut self) {
        self.push_fragment("`;\nbreak;".to_string());
    }

    pub(crate) fn close_switch(&mut self, position: usize) {
        if let Some(frame) = self.pop_matching("endswitch", position, |k| {
            matches!(k, FrameKind::Switch { .. })
        }) {
            let closer = match frame.kind {
                FrameKind::Switch {
                    parent_is_concat: true,
                } => "`;\n}\nreturn __switchOutputContent__;\n})",
                _ => "`;\n}\nreturn __switchOutputContent__;\n})}",
            };
            self.push_fragment(closer.to_string());
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
    fn test_if_block_reactive_shape() {
        let mut s = session(&["count"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_if("$count > 0", false);
        m.close_if(0);
        let js = m.output.concat();
        assert_eq!(
            js,
            "${this.__reactive(`${__VIEW_ID__}-watch-1`, [\"count\"], () => { if(count > 0){ return ``; }\nreturn '';\n})}"
        );
    }

    #[test]
    fn test_if_attribute_never_reactive() {
        let mut s = session(&["count"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_if("$count > 0", true);
        m.close_if(0);
        let js = m.output.concat();
        assert!(js.starts_with("${this.__execute(() => { if(count > 0){ return `"));
        assert!(!js.contains("__reactive"));
    }

    #[test]
    fn test_if_without_state_vars_is_bare() {
        let mut s = session(&["count"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_if("$other", false);
        m.close_if(0);
        assert!(m.output.concat().contains("__execute"));
        // No watch ID consumed.
        assert_eq!(s.next_watch_number(), 1);
    }

    #[test]
    fn test_elseif_widens_reactive_wrapper() {
        let mut s = session(&["count", "total"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_if("$count > 0", false);
        m.handle_elseif("$total > 10");
        m.handle_else();
        m.close_if(0);
        let js = m.output.concat();
        assert!(js.contains("[\"count\", \"total\"]"), "got: {}", js);
        assert!(js.contains("`; } else if(total > 10){ return `"));
        assert!(js.contains("`; } else { return `"));
    }

    #[test]
    fn test_endif_without_if_is_warning_only() {
        let mut s = session(&[]);
        let mut m = DirectiveMachine::new(&mut s);
        m.close_if(3);
        assert!(m.output.is_empty());
        assert_eq!(m.warnings[0].code, "BL-W002");
    }

    #[test]
    fn test_switch_block_reactive() {
        let mut s = session(&["status"]);
        let mut m = DirectiveMachine::new(&mut s);
        m.open_switch("$status", false);
        m.handle_case("'active'");
        m.handle_break();
        m.handle_default();
        m.close_switch(0);
        let js = m.output.concat();
        assert!(js.starts_with("${this.__reactive(`${__VIEW_ID__}-watch-1`, [\"status\"], () => {\nlet __switchOutputContent__ = '';\nswitch(status) {"));
        assert!(js.contains("\ncase 'active':\n__switchOutputContent__ += `"));
        assert!(js.contains("`;\nbreak;"));
        assert!(js.ends_with("`;\n}\nreturn __switchOutputContent__;\n})}"));
    }
}
