//! Balanced Delimiter Extraction
//!
//! The directive argument list is never parsed with a grammar; handlers locate
//! the opening delimiter and take everything up to its balanced close. Quoted
//! spans are opaque so `@if($label == ')')` extracts correctly.

/// Matching close for a supported opening delimiter.
fn closing_delimiter(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Extract the content between `text[open_pos]` and its balanced closing
/// delimiter. Returns the inner content (delimiters excluded) and the index
/// one past the closing delimiter.
///
/// Single- and double-quoted spans are treated as opaque, with backslash
/// escapes honored inside them. Returns `None` when `open_pos` does not sit
/// on a supported opening delimiter or the input ends before the delimiter
/// closes; the caller then treats the surrounding directive as unrecognized
/// and falls through to literal-text handling.
pub fn extract_balanced(text: &str, open_pos: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let open = *bytes.get(open_pos)? as char;
    let close = closing_delimiter(open)?;

    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut i = open_pos;

    while i < bytes.len() {
        let c = bytes[i];

        if let Some(quote) = in_string {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }

        if c == b'"' || c == b'\'' {
            in_string = Some(c);
        } else if c == open as u8 {
            depth += 1;
        } else if c == close as u8 {
            depth -= 1;
            if depth == 0 {
                return Some((&text[open_pos + 1..i], i + 1));
            }
        }
        i += 1;
    }

    None
}
