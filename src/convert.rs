//! Expression Conversion Module
//!
//! Rewrites one PHP-flavored template expression into an equivalent JavaScript
//! expression. The conversion is a fixed sequence of passes over a lexed token
//! list; string literals are single opaque tokens, so structural rewrites can
//! never corrupt literal content and no placeholder protection is needed.
//!
//! Pass order (each pass leaves anything it cannot confidently rewrite
//! unchanged — conversion never fails):
//!
//! 1. Lex into `Str | Ident | Number | Op | Punct | Ws` spans; `$name`
//!    becomes an `Ident` tagged as sigil-derived.
//! 2. Concatenation dots become `+`. A dot is concatenation only when at
//!    least one adjacent operand is a string literal or a sigil variable,
//!    the expression contains no comparison, null-coalescing or ternary
//!    operator, and the right operand is not a call. Decimal points live
//!    inside `Number` tokens and member chains between bare identifiers are
//!    never rewritten.
//! 3. `->` and `::` become `.`.
//! 4. Registered call-site identifiers gain their `App.View.` /
//!    `App.Helper.` namespace prefix. This runs before bracket conversion so
//!    calls inside literals keep their prefix when elements are flattened.
//! 5. Bracket literals become JS literals: `['k' => $v]` turns into
//!    `{"k": v}`, `[1, 2]` stays an array, recursively. A bracket preceded
//!    by an operand, or holding a single literal/identifier with no
//!    separators, is index access and kept as-is.
//! 6. Render. Double-quoted strings containing `$name` references become JS
//!    template literals with `${name}` interpolation.
//!
//! `++`/`--` are single operator tokens and survive every pass verbatim.

use crate::registry::function_prefix;
use lazy_static::lazy_static;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    /// String literal including its quotes, exactly as written.
    Str { raw: String, quote: char },
    Ident { text: String, from_sigil: bool },
    Number(String),
    Op(String),
    Punct(char),
    Ws(String),
    /// Already-rendered JavaScript produced by a structural rewrite.
    Raw(String),
    Other(char),
}

impl Tok {
    fn is_ws(&self) -> bool {
        matches!(self, Tok::Ws(_))
    }

    /// Token that can end an operand (left side of a binary operator).
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Tok::Str { .. }
                | Tok::Ident { .. }
                | Tok::Number(_)
                | Tok::Raw(_)
                | Tok::Punct(')')
                | Tok::Punct(']')
        )
    }

    /// Token that can start an operand (right side of a binary operator).
    fn starts_operand(&self) -> bool {
        matches!(
            self,
            Tok::Str { .. } | Tok::Ident { .. } | Tok::Number(_) | Tok::Raw(_) | Tok::Punct('(')
        )
    }

    fn is_sigil_ident(&self) -> bool {
        matches!(
            self,
            Tok::Ident {
                from_sigil: true,
                ..
            }
        )
    }

    fn is_str(&self) -> bool {
        matches!(self, Tok::Str { .. })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEXER
// ═══════════════════════════════════════════════════════════════════════════════

const MULTI_OPS: &[&str] = &[
    "===", "!==", "<=>", "**=", "++", "--", "->", "::", "==", "!=", "<=", ">=", "??", "&&", "||",
    "=>", "**", "+=", "-=", "*=", "/=", ".=",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex(expr: &str) -> Vec<Tok> {
    let chars: Vec<char> = expr.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            let start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            toks.push(Tok::Ws(chars[start..i].iter().collect()));
            continue;
        }

        if c == '\'' || c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == c {
                    i += 1;
                    break;
                }
                i += 1;
            }
            // An unterminated literal swallows the rest of the input; the
            // converter degrades rather than failing.
            let end = i.min(chars.len());
            toks.push(Tok::Str {
                raw: chars[start..end].iter().collect(),
                quote: c,
            });
            continue;
        }

        if c == '$' && i + 1 < chars.len() && is_ident_start(chars[i + 1]) {
            let start = i + 1;
            i += 1;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            toks.push(Tok::Ident {
                text: chars[start..i].iter().collect(),
                from_sigil: true,
            });
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            toks.push(Tok::Ident {
                text: chars[start..i].iter().collect(),
                from_sigil: false,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            // A decimal point belongs to the number, never to concatenation.
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            toks.push(Tok::Number(chars[start..i].iter().collect()));
            continue;
        }

        if matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',') {
            toks.push(Tok::Punct(c));
            i += 1;
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        if let Some(op) = MULTI_OPS.iter().find(|op| rest.starts_with(**op)) {
            toks.push(Tok::Op((*op).to_string()));
            i += op.len();
            continue;
        }

        if "+-*/%<>!?:=&|^~.".contains(c) {
            toks.push(Tok::Op(c.to_string()));
            i += 1;
            continue;
        }

        toks.push(Tok::Other(c));
        i += 1;
    }

    toks
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONCATENATION REWRITE
// ═══════════════════════════════════════════════════════════════════════════════

/// Operators whose presence disables the concatenation rewrite for the whole
/// expression (comparison, null-coalescing, ternary).
fn blocks_concatenation(toks: &[Tok]) -> bool {
    toks.iter().any(|t| {
        matches!(
            t,
            Tok::Op(op) if matches!(
                op.as_str(),
                "==" | "===" | "!=" | "!==" | "<" | ">" | "<=" | ">=" | "??" | "?"
            )
        )
    })
}

fn prev_non_ws(toks: &[Tok], from: usize) -> Option<usize> {
    toks[..from].iter().rposition(|t| !t.is_ws())
}

fn next_non_ws(toks: &[Tok], from: usize) -> Option<usize> {
    toks[from + 1..]
        .iter()
        .position(|t| !t.is_ws())
        .map(|p| from + 1 + p)
}

fn rewrite_concatenation(toks: Vec<Tok>) -> Vec<Tok> {
    if blocks_concatenation(&toks) {
        return toks;
    }

    let mut drop = vec![false; toks.len()];
    let mut out = toks.clone();

    for i in 0..toks.len() {
        if !matches!(&toks[i], Tok::Op(op) if op == ".") {
            continue;
        }
        let Some(p) = prev_non_ws(&toks, i) else { continue };
        let Some(n) = next_non_ws(&toks, i) else { continue };
        if !toks[p].ends_operand() || !toks[n].starts_operand() {
            continue;
        }
        // A call on the right is member access (now() . format(...) chains).
        if matches!(toks[n], Tok::Ident { .. }) {
            if let Some(after) = next_non_ws(&toks, n) {
                if toks[after] == Tok::Punct('(') {
                    continue;
                }
            }
        }
        let qualifies = toks[p].is_str()
            || toks[p].is_sigil_ident()
            || toks[n].is_str()
            || toks[n].is_sigil_ident();
        if !qualifies {
            continue;
        }
        out[i] = Tok::Op("+".to_string());
        // Joined tightly, matching the engine's emitted style.
        for t in drop.iter_mut().take(i).skip(p + 1) {
            *t = true;
        }
        for t in drop.iter_mut().take(n).skip(i + 1) {
            *t = true;
        }
    }

    out.into_iter()
        .zip(drop)
        .filter_map(|(t, d)| if d { None } else { Some(t) })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCESSOR AND PREFIX REWRITES
// ═══════════════════════════════════════════════════════════════════════════════

fn rewrite_accessors(toks: Vec<Tok>) -> Vec<Tok> {
    toks.into_iter()
        .map(|t| match t {
            Tok::Op(op) if op == "->" || op == "::" => Tok::Op(".".to_string()),
            other => other,
        })
        .collect()
}

fn rewrite_function_prefixes(toks: Vec<Tok>) -> Vec<Tok> {
    let mut out = toks.clone();
    for i in 0..toks.len() {
        let Tok::Ident { text, .. } = &toks[i] else { continue };
        let Some(n) = next_non_ws(&toks, i) else { continue };
        if toks[n] != Tok::Punct('(') {
            continue;
        }
        if let Some(p) = prev_non_ws(&toks, i) {
            if matches!(&toks[p], Tok::Op(op) if op == ".") {
                continue;
            }
        }
        if let Some(prefix) = function_prefix(text) {
            out[i] = Tok::Raw(format!("{}.{}", prefix, text));
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// BRACKET LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

fn matching_bracket(toks: &[Tok], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in toks.iter().enumerate().skip(open) {
        match t {
            Tok::Punct('[') => depth += 1,
            Tok::Punct(']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a token slice on top-level commas.
fn split_elements(toks: &[Tok]) -> Vec<Vec<Tok>> {
    let mut elements = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0i32;
    for t in toks {
        match t {
            Tok::Punct('(') | Tok::Punct('[') | Tok::Punct('{') => depth += 1,
            Tok::Punct(')') | Tok::Punct(']') | Tok::Punct('}') => depth -= 1,
            Tok::Punct(',') if depth == 0 => {
                elements.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(t.clone());
    }
    if current.iter().any(|t| !t.is_ws()) || !elements.is_empty() {
        elements.push(current);
    }
    elements
}

/// Split one element at its top-level `=>`, if any.
fn split_key_value(toks: &[Tok]) -> Option<(Vec<Tok>, Vec<Tok>)> {
    let mut depth = 0i32;
    for (i, t) in toks.iter().enumerate() {
        match t {
            Tok::Punct('(') | Tok::Punct('[') | Tok::Punct('{') => depth += 1,
            Tok::Punct(')') | Tok::Punct(']') | Tok::Punct('}') => depth -= 1,
            Tok::Op(op) if op == "=>" && depth == 0 => {
                return Some((toks[..i].to_vec(), toks[i + 1..].to_vec()));
            }
            _ => {}
        }
    }
    None
}

fn trim_ws(toks: &[Tok]) -> Vec<Tok> {
    let start = toks.iter().position(|t| !t.is_ws()).unwrap_or(toks.len());
    let end = toks.iter().rposition(|t| !t.is_ws()).map_or(start, |p| p + 1);
    toks[start..end].to_vec()
}

/// Object-literal key: quotes stripped, re-quoted with double quotes.
fn render_object_key(toks: &[Tok]) -> String {
    let trimmed = trim_ws(toks);
    if let [Tok::Str { raw, .. }] = trimmed.as_slice() {
        if raw.len() >= 2 {
            return format!("\"{}\"", &raw[1..raw.len() - 1]);
        }
    }
    format!("\"{}\"", render(&trimmed))
}

fn rewrite_bracket_literals(toks: Vec<Tok>) -> Vec<Tok> {
    let mut out: Vec<Tok> = Vec::with_capacity(toks.len());
    let mut i = 0;

    while i < toks.len() {
        if toks[i] != Tok::Punct('[') {
            out.push(toks[i].clone());
            i += 1;
            continue;
        }

        // A bracket after an operand is index/property access.
        let after_operand = out
            .iter()
            .rposition(|t| !t.is_ws())
            .map(|p| out[p].ends_operand())
            .unwrap_or(false);

        let Some(close) = matching_bracket(&toks, i) else {
            out.push(toks[i].clone());
            i += 1;
            continue;
        };

        let inner = rewrite_bracket_literals(toks[i + 1..close].to_vec());

        if after_operand {
            out.push(Tok::Punct('['));
            out.extend(inner);
            out.push(Tok::Punct(']'));
            i = close + 1;
            continue;
        }

        let elements = split_elements(&inner);

        // A single literal/identifier with no separators is access, not a
        // literal (`['key']` indexes; `['key' => 1]` constructs).
        let single_operand = elements.len() == 1 && {
            let only = trim_ws(&elements[0]);
            matches!(
                only.as_slice(),
                [Tok::Str { .. }] | [Tok::Ident { .. }] | [Tok::Number(_)]
            )
        };
        if single_operand {
            out.push(Tok::Punct('['));
            out.extend(inner);
            out.push(Tok::Punct(']'));
            i = close + 1;
            continue;
        }

        let has_kv = elements.iter().any(|e| split_key_value(e).is_some());
        let all_kv = !elements.is_empty() && elements.iter().all(|e| split_key_value(e).is_some());

        let rendered = if all_kv {
            let pairs: Vec<String> = elements
                .iter()
                .filter_map(|e| split_key_value(e))
                .map(|(k, v)| format!("{}: {}", render_object_key(&k), render(&trim_ws(&v))))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        } else if has_kv {
            // Mixed sequential/associative entries become an array whose
            // associative entries are single-pair objects.
            let items: Vec<String> = elements
                .iter()
                .map(|e| match split_key_value(e) {
                    Some((k, v)) => format!(
                        "{{{}: {}}}",
                        render_object_key(&k),
                        render(&trim_ws(&v))
                    ),
                    None => render(&trim_ws(e)),
                })
                .collect();
            format!("[{}]", items.join(", "))
        } else {
            let items: Vec<String> = elements.iter().map(|e| render(&trim_ws(e))).collect();
            format!("[{}]", items.join(", "))
        };

        out.push(Tok::Raw(rendered));
        i = close + 1;
    }

    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref SIGIL_REF_RE: Regex = Regex::new(r"\$([a-zA-Z_][a-zA-Z0-9_]*)").unwrap();
}

/// Double-quoted DSL strings with `$name` references become JS template
/// literals; everything else renders verbatim.
fn render_string(raw: &str, quote: char) -> String {
    // Unterminated literals (no closing quote) render verbatim.
    if quote != '"' || raw.len() < 2 || !raw.ends_with('"') || !SIGIL_REF_RE.is_match(raw) {
        return raw.to_string();
    }
    let inner = &raw[1..raw.len() - 1];
    let escaped = inner.replace('`', "\\`").replace("${", "\\${");
    let interpolated = SIGIL_REF_RE.replace_all(&escaped, |caps: &regex::Captures| {
        format!("${{{}}}", &caps[1])
    });
    format!("`{}`", interpolated)
}

fn render(toks: &[Tok]) -> String {
    let mut out = String::new();
    for t in toks {
        match t {
            Tok::Str { raw, quote } => out.push_str(&render_string(raw, *quote)),
            Tok::Ident { text, .. } => out.push_str(text),
            Tok::Number(n) => out.push_str(n),
            Tok::Op(op) => out.push_str(op),
            Tok::Punct(c) => out.push(*c),
            Tok::Ws(w) => out.push_str(w),
            Tok::Raw(js) => out.push_str(js),
            Tok::Other(c) => out.push(*c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Convert one PHP-flavored template expression to JavaScript. Never fails;
/// anything a pass cannot confidently rewrite passes through unchanged.
pub fn convert_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return "''".to_string();
    }

    let mut toks = lex(trimmed);
    toks = rewrite_concatenation(toks);
    toks = rewrite_accessors(toks);
    // Prefixes before brackets: bracket rendering flattens its elements, so
    // a registered call inside a literal must already carry its namespace.
    toks = rewrite_function_prefixes(toks);
    toks = rewrite_bracket_literals(toks);
    render(&toks)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arithmetic_identity() {
        assert_eq!(convert_expression("1+2*3"), "1+2*3");
        assert_eq!(convert_expression("(a + b) * c"), "(a + b) * c");
        assert_eq!(convert_expression("1.5 + 2.25"), "1.5 + 2.25");
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(convert_expression(""), "''");
        assert_eq!(convert_expression("   "), "''");
    }

    #[test]
    fn test_sigil_stripping() {
        assert_eq!(convert_expression("$count"), "count");
        assert_eq!(convert_expression("$count > 0"), "count > 0");
        assert_eq!(convert_expression("$a + $b"), "a + b");
    }

    #[test]
    fn test_member_access_rewrite() {
        assert_eq!(convert_expression("$user->name"), "user.name");
        assert_eq!(convert_expression("a->b->c"), "a.b.c");
        assert_eq!(convert_expression("Helper::format($x)"), "Helper.format(x)");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(convert_expression("'a' . $b . 'c'"), "'a'+b+'c'");
        assert_eq!(convert_expression("$first . ' ' . $last"), "first+' '+last");
    }

    #[test]
    fn test_concatenation_skips_member_chains() {
        // Dots between bare identifiers are member access, never concat.
        assert_eq!(convert_expression("user.profile.name"), "user.profile.name");
    }

    #[test]
    fn test_concatenation_skips_calls() {
        let js = convert_expression("route('api.users')");
        assert!(js.contains("('api.users')"), "got: {}", js);
        assert!(!js.contains('+'), "got: {}", js);
        // Unregistered call, fully untouched.
        assert_eq!(convert_expression("myfunc('a.b')"), "myfunc('a.b')");
        // Call chain on the right of a dot is access, not concat; `now` also
        // picks up its registry prefix.
        assert_eq!(
            convert_expression("now()->format('Y')"),
            "App.Helper.now().format('Y')"
        );
    }

    #[test]
    fn test_concatenation_disabled_by_comparison() {
        assert_eq!(
            convert_expression("$path === 'layouts.base'"),
            "path === 'layouts.base'"
        );
        assert_eq!(
            convert_expression("$name ?? 'app.default'"),
            "name ?? 'app.default'"
        );
        assert_eq!(
            convert_expression("$ok ? 'a.b' : 'c.d'"),
            "ok ? 'a.b' : 'c.d'"
        );
    }

    #[test]
    fn test_increment_decrement_preserved() {
        assert_eq!(convert_expression("$i++"), "i++");
        assert_eq!(convert_expression("--$n"), "--n");
        assert_eq!(convert_expression("$i++ + $j--"), "i++ + j--");
    }

    #[test]
    fn test_double_quoted_interpolation() {
        assert_eq!(
            convert_expression(r#""Hello $name""#),
            "`Hello ${name}`"
        );
        assert_eq!(convert_expression(r#""plain text""#), r#""plain text""#);
        assert_eq!(convert_expression("'no $interp here'"), "'no $interp here'");
    }

    #[test]
    fn test_associative_array_to_object() {
        assert_eq!(
            convert_expression("['name' => $user, 'age' => 30]"),
            "{\"name\": user, \"age\": 30}"
        );
    }

    #[test]
    fn test_sequential_array_literal() {
        assert_eq!(convert_expression("[1, 2, 3]"), "[1, 2, 3]");
        assert_eq!(convert_expression("['a', 'b']"), "['a', 'b']");
    }

    #[test]
    fn test_nested_array_literals() {
        assert_eq!(
            convert_expression("['tags' => ['a', 'b']]"),
            "{\"tags\": ['a', 'b']}"
        );
    }

    #[test]
    fn test_index_access_untouched() {
        assert_eq!(convert_expression("$arr['key']"), "arr['key']");
        assert_eq!(convert_expression("$rows[0]"), "rows[0]");
        assert_eq!(convert_expression("$m[$k]"), "m[k]");
    }

    #[test]
    fn test_function_prefixing() {
        assert_eq!(convert_expression("count($items)"), "App.Helper.count(items)");
        assert_eq!(
            convert_expression("route('home')"),
            "App.View.route('home')"
        );
        assert_eq!(convert_expression("unknownFn($x)"), "unknownFn(x)");
        // Method position never gets a prefix.
        assert_eq!(convert_expression("$list->count()"), "list.count()");
    }

    #[test]
    fn test_function_prefix_inside_bracket_literal() {
        assert_eq!(
            convert_expression("['total' => count($items)]"),
            "{\"total\": App.Helper.count(items)}"
        );
        assert_eq!(
            convert_expression("[count($a), strlen($b)]"),
            "[App.Helper.count(a), App.Helper.strlen(b)]"
        );
    }

    #[test]
    fn test_unterminated_string_degrades() {
        // Worst case is a pass-through, never a panic.
        let js = convert_expression("'unterminated");
        assert_eq!(js, "'unterminated");
    }
}
