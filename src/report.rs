//! Compile Diagnostics
//!
//! Malformed templates still compile; defects surface as warnings on the
//! result instead of failing the call. Codes are stable so tooling can match
//! on them.

use serde::{Deserialize, Serialize};

/// Unterminated block directive at end of document.
pub const WARN_UNTERMINATED_BLOCK: &str = "BL-W001";
/// `end*` directive with no matching open frame on the stack.
pub const WARN_MISMATCHED_END: &str = "BL-W002";
/// `@section` block never closed by `@endsection`.
pub const WARN_UNTERMINATED_SECTION: &str = "BL-W003";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompileWarning {
    pub code: String,
    pub message: String,
    /// Directive name the warning concerns, without the `@`.
    pub directive: String,
    /// Byte offset of the directive occurrence in the source document.
    pub position: usize,
}

impl CompileWarning {
    pub fn unterminated_block(directive: &str, position: usize) -> Self {
        CompileWarning {
            code: WARN_UNTERMINATED_BLOCK.to_string(),
            message: format!("unterminated @{} block at end of document", directive),
            directive: directive.to_string(),
            position,
        }
    }

    pub fn mismatched_end(directive: &str, position: usize) -> Self {
        CompileWarning {
            code: WARN_MISMATCHED_END.to_string(),
            message: format!("@{} has no matching open block", directive),
            directive: directive.to_string(),
            position,
        }
    }

    pub fn unterminated_section(name: &str, position: usize) -> Self {
        CompileWarning {
            code: WARN_UNTERMINATED_SECTION.to_string(),
            message: format!("section '{}' is never closed by @endsection", name),
            directive: "section".to_string(),
            position,
        }
    }
}
