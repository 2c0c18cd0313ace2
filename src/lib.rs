//! # Blade Directive Compiler Core
//!
//! Compiles a PHP/Blade-flavored directive template into JavaScript
//! view-engine code: a template-literal body plus a side list of section
//! fragments.
//!
//! ## Emission Invariants
//!
//! 1. **Lenient by construction**: no input fails a compile. Unknown `@name`
//!    text, unbalanced argument lists and malformed loop headers pass through
//!    as literal content; structural defects become `CompileWarning`s on the
//!    result.
//!
//! 2. **Closing shape fixed at open**: every `@if` picks one of four closing
//!    shapes from `{attribute} × {parent_is_loop} × {watch_keys nonempty}`
//!    and records it on its frame. `@endif` only replays the recorded shape.
//!
//! 3. **Reactive iff state-dependent**: a block subscribes (and consumes a
//!    watch ID) exactly when its controlling expression reads at least one
//!    state variable and the block is not in attribute position.
//!
//! 4. **Session-scoped watch IDs**: the watch counter lives on the session
//!    and resets at the start of every compile. Identical templates always
//!    produce identical IDs.
//!
//! 5. **Strict source order**: literal text, echo spans and directive
//!    fragments land in the output in document order; `for`/`while` bodies
//!    accumulate through their loop buffer variable instead of interpolating.

mod compile;
mod conditional;
mod convert;
mod emit;
mod extract;
mod frame;
mod loops;
mod reactive;
mod registry;
mod report;

pub use compile::{compile_template, CompileResult, CompilerSession};
pub use convert::convert_expression;
pub use emit::SectionFragment;
pub use extract::extract_balanced;
pub use reactive::dependencies_of;
pub use report::{
    CompileWarning, WARN_MISMATCHED_END, WARN_UNTERMINATED_BLOCK, WARN_UNTERMINATED_SECTION,
};

#[cfg(feature = "napi")]
pub use compile::{compile_template_native, convert_expression_native, dependencies_native};
