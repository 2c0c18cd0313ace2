//! Directive Stack Machine — frames and shared machinery
//!
//! Every block directive pushes a frame recording, at open time, everything
//! its `end*` needs: the closing shape, the output index of the open fragment
//! (so `@elseif` can patch an already-emitted reactive wrapper in place), the
//! watch-key union, and the context flags. The if-family handlers live in
//! `conditional.rs`, the loop and switch families in `loops.rs` and
//! `conditional.rs`; this module owns the types and the helpers they share.

use crate::compile::CompilerSession;
use crate::report::CompileWarning;

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// The four closing shapes an if-family block can take, fixed at open time by
/// `{attribute} × {parent_is_loop} × {watch_keys nonempty}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseShape {
    /// Inside a `for`/`while` buffer, subscribed: `+= this.__reactive(...)`.
    LoopReactive,
    /// Inside a `for`/`while` buffer, unsubscribed IIFE.
    LoopBare,
    /// Interpolated `${this.__execute(...)}` (attribute context or no keys).
    Bare,
    /// Interpolated `${this.__reactive(...)}` with a watch ID.
    Reactive,
}

impl CloseShape {
    /// Exact closer text emitted by `@endif`, chosen when the block opened.
    pub fn closer(self) -> &'static str {
        match self {
            CloseShape::LoopReactive => "`; }\nreturn '';\n});",
            CloseShape::LoopBare => "`; }\nreturn '';\n})();",
            CloseShape::Bare => "`; }\nreturn '';\n})}",
            CloseShape::Reactive => "`; }\nreturn '';\n})}",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    If {
        shape: CloseShape,
        /// Watch ID string, present iff the open fragment is reactive. Kept so
        /// `@elseif` can re-render the wrapper with a widened key union.
        watch_id: Option<String>,
        /// Converted condition of the opening `@if`, for the same re-render.
        condition: String,
    },
    ForEach {
        reactive: bool,
    },
    For {
        reactive: bool,
    },
    While {
        reactive: bool,
    },
    Switch {
        /// Whether the switch emits `+=` into an enclosing loop buffer rather
        /// than interpolating into the template literal.
        parent_is_concat: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Index of this frame's open fragment in the machine's output buffer.
    pub open_index: usize,
    /// Ordered unique state dependencies, widened by `@elseif`.
    pub watch_keys: Vec<String>,
    pub is_attribute: bool,
    pub parent_is_loop: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Drives the frame stack over the directive token stream, accumulating output
/// fragments in strict source order. Owned by the emitter for the duration of
/// one compile.
pub struct DirectiveMachine<'a> {
    pub(crate) session: &'a mut CompilerSession,
    pub(crate) stack: Vec<Frame>,
    pub(crate) output: Vec<String>,
    pub(crate) warnings: Vec<CompileWarning>,
}

impl<'a> DirectiveMachine<'a> {
    pub fn new(session: &'a mut CompilerSession) -> Self {
        DirectiveMachine {
            session,
            stack: Vec::new(),
            output: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn push_fragment(&mut self, fragment: String) {
        self.output.push(fragment);
    }

    /// Buffer variable of the innermost accumulation loop, when the machine is
    /// currently inside one. `foreach` renders through a callback and has no
    /// buffer of its own.
    pub(crate) fn enclosing_loop_buffer(&self) -> Option<&'static str> {
        self.stack.iter().rev().find_map(|f| match f.kind {
            FrameKind::For { .. } => Some("__forOutputContent__"),
            FrameKind::While { .. } => Some("__whileOutputContent__"),
            _ => None,
        })
    }

    /// Whether the immediately enclosing frame is an accumulation loop. Only
    /// the direct parent counts; an `if` between the loop and the directive
    /// switches emission back to template-literal interpolation.
    pub(crate) fn parent_is_loop(&self) -> bool {
        matches!(
            self.stack.last().map(|f| &f.kind),
            Some(FrameKind::For { .. }) | Some(FrameKind::While { .. })
        )
    }

    /// Fresh watch ID for a reactive wrapper at the current position. Inside
    /// an accumulation loop the ID carries the loop index so each iteration
    /// subscribes independently.
    pub(crate) fn next_watch_id(&mut self) -> String {
        let n = self.session.next_watch_number();
        if self.parent_is_loop() {
            format!("${{__VIEW_ID__}}-watch-{}-${{__loop.index}}", n)
        } else {
            format!("${{__VIEW_ID__}}-watch-{}", n)
        }
    }

    /// Fresh watch ID without the loop-index suffix. Switch wrappers subscribe
    /// once per compile even inside an accumulation loop.
    pub(crate) fn next_watch_id_flat(&mut self) -> String {
        let n = self.session.next_watch_number();
        format!("${{__VIEW_ID__}}-watch-{}", n)
    }

    /// Pop the top frame if its kind matches; otherwise record a mismatched
    /// `end*` warning and leave both stack and output untouched.
    pub(crate) fn pop_matching<F>(
        &mut self,
        directive: &str,
        position: usize,
        matches_kind: F,
    ) -> Option<Frame>
    where
        F: Fn(&FrameKind) -> bool,
    {
        match self.stack.last() {
            Some(frame) if matches_kind(&frame.kind) => self.stack.pop(),
            _ => {
                self.warnings
                    .push(CompileWarning::mismatched_end(directive, position));
                None
            }
        }
    }

    /// Report every frame still open at end of document.
    pub(crate) fn report_unterminated(&mut self, end_position: usize) {
        let open: Vec<&'static str> = self
            .stack
            .iter()
            .map(|f| match f.kind {
                FrameKind::If { .. } => "if",
                FrameKind::ForEach { .. } => "foreach",
                FrameKind::For { .. } => "for",
                FrameKind::While { .. } => "while",
                FrameKind::Switch { .. } => "switch",
            })
            .collect();
        for name in open {
            self.warnings
                .push(CompileWarning::unterminated_block(name, end_position));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompilerSession;

    #[test]
    fn test_close_shapes_are_distinct_variants() {
        let shapes = [
            CloseShape::LoopReactive,
            CloseShape::LoopBare,
            CloseShape::Bare,
            CloseShape::Reactive,
        ];
        for (i, a) in shapes.iter().enumerate() {
            for (j, b) in shapes.iter().enumerate() {
                assert_eq!(i == j, a == b);
            }
        }
    }

    #[test]
    fn test_loop_closers_terminate_the_wrapper() {
        // The loop-bare shape is an IIFE and must invoke itself.
        assert!(CloseShape::LoopBare.closer().ends_with("})();"));
        assert!(CloseShape::LoopReactive.closer().ends_with("});"));
    }

    #[test]
    fn test_watch_id_inside_loop_carries_loop_index() {
        let mut session = CompilerSession::new(Default::default());
        let mut machine = DirectiveMachine::new(&mut session);
        machine.stack.push(Frame {
            kind: FrameKind::While { reactive: false },
            open_index: 0,
            watch_keys: vec![],
            is_attribute: false,
            parent_is_loop: false,
        });
        let id = machine.next_watch_id();
        assert_eq!(id, "${__VIEW_ID__}-watch-1-${__loop.index}");
    }

    #[test]
    fn test_mismatched_pop_warns_and_keeps_stack() {
        let mut session = CompilerSession::new(Default::default());
        let mut machine = DirectiveMachine::new(&mut session);
        let popped = machine.pop_matching("endif", 7, |k| matches!(k, FrameKind::If { .. }));
        assert!(popped.is_none());
        assert_eq!(machine.warnings.len(), 1);
        assert_eq!(machine.warnings[0].code, "BL-W002");
    }
}
