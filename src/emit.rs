//! Fragment Emitter
//!
//! Walks the document once, splitting it into literal text runs, echo spans
//! and directive occurrences, and drives the stack machine in strict source
//! order. Anything that does not resolve to a known directive with a balanced
//! argument list stays literal text; the emitter never rejects a document.
//!
//! Sections are captured with an emitter-local stack: a block `@section`
//! records where its content starts in the output buffer, `@endsection` lifts
//! that range out and wraps it in a runtime section call that lands in both
//! the body and the side section list.

use crate::convert::convert_expression;
use crate::extract::extract_balanced;
use crate::frame::DirectiveMachine;
use crate::registry::{APP_HELPER_NAMESPACE, APP_VIEW_NAMESPACE};
use crate::report::CompileWarning;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One compiled section, also present in the body where it occurred.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionFragment {
    pub name: String,
    pub js: String,
}

lazy_static! {
    /// Block form: a single quoted section name.
    static ref SECTION_NAME_RE: Regex = Regex::new(r#"^\s*['"]([^'"]*)['"]\s*$"#).unwrap();
    /// Inline form: quoted name, comma, value expression.
    static ref SECTION_TWO_RE: Regex =
        Regex::new(r#"(?s)^\s*['"]([^'"]*)['"]\s*,\s*(.*)$"#).unwrap();
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[a-zA-Z][^>]*>").unwrap();
}

const DIRECTIVES_WITH_ARGS: &[&str] = &[
    "if", "elseif", "foreach", "for", "while", "switch", "case", "section",
];
const DIRECTIVES_BARE: &[&str] = &[
    "else",
    "endif",
    "endforeach",
    "endfor",
    "endwhile",
    "default",
    "break",
    "endswitch",
    "endsection",
];

struct OpenSection {
    name: String,
    start_index: usize,
    position: usize,
}

/// Escape literal text for inclusion in a JS template literal.
fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push_str("\\${");
            }
            other => out.push(other),
        }
    }
    out
}

/// A directive sits in attribute position when the nearest `<` before it has
/// no intervening `>`.
fn in_attribute_context(source: &str, pos: usize) -> bool {
    let head = &source[..pos];
    match (head.rfind('<'), head.rfind('>')) {
        (Some(lt), Some(gt)) => lt > gt,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Inline section values keep simple string literals verbatim; anything else
/// goes through the expression converter.
fn render_section_value(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return "''".to_string();
    }
    let simple_literal = value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')))
        && !value.contains('$')
        && !value.contains(" .")
        && !value.contains(". ");
    if simple_literal {
        value.to_string()
    } else {
        convert_expression(value)
    }
}

pub(crate) struct Emitter<'a, 'm> {
    machine: &'m mut DirectiveMachine<'a>,
    sections: Vec<SectionFragment>,
    section_stack: Vec<OpenSection>,
    /// Pending literal text, already escaped; echo spans land here raw.
    literal: String,
}

impl<'a, 'm> Emitter<'a, 'm> {
    pub(crate) fn new(machine: &'m mut DirectiveMachine<'a>) -> Self {
        Emitter {
            machine,
            sections: Vec::new(),
            section_stack: Vec::new(),
            literal: String::new(),
        }
    }

    /// Move pending literal text into the output. Inside a `for`/`while`
    /// frame it appends to the loop's buffer variable; everywhere else it
    /// lands directly in the surrounding template literal.
    fn flush_literal(&mut self) {
        if self.literal.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.literal);
        if self.machine.parent_is_loop() {
            let buffer = self
                .machine
                .enclosing_loop_buffer()
                .unwrap_or("__forOutputContent__");
            self.machine.push_fragment(format!("{} += `{}`;", buffer, text));
        } else {
            self.machine.push_fragment(text);
        }
    }

    /// Returns `false` when neither section form matches, so the occurrence
    /// stays literal.
    fn handle_section_open(&mut self, raw_args: &str, position: usize) -> bool {
        if let Some(caps) = SECTION_NAME_RE.captures(raw_args) {
            self.section_stack.push(OpenSection {
                name: caps[1].to_string(),
                start_index: self.machine.output.len(),
                position,
            });
            return true;
        }
        // Inline form emits a complete section call in place.
        if let Some(caps) = SECTION_TWO_RE.captures(raw_args) {
            let name = caps[1].to_string();
            let value = render_section_value(&caps[2]);
            let js = format!(
                "${{{}.section('{}', {}, 'string')}}",
                APP_VIEW_NAMESPACE, name, value
            );
            self.machine.push_fragment(js.clone());
            self.sections.push(SectionFragment { name, js });
            return true;
        }
        false
    }

    fn handle_section_close(&mut self, position: usize) {
        let Some(open) = self.section_stack.pop() else {
            self.machine
                .warnings
                .push(CompileWarning::mismatched_end("endsection", position));
            return;
        };
        let content: String = self.machine.output.split_off(open.start_index).concat();
        let section_type = if HTML_TAG_RE.is_match(&content) {
            "html"
        } else {
            "string"
        };
        let js = format!(
            "${{{}.section('{}', `{}`, '{}')}}",
            APP_VIEW_NAMESPACE, open.name, content, section_type
        );
        self.machine.push_fragment(js.clone());
        self.sections.push(SectionFragment {
            name: open.name,
            js,
        });
    }

    /// Dispatch one recognized directive. Returns `false` when the handler
    /// declines (malformed loop header) and the occurrence must stay literal.
    fn dispatch(&mut self, name: &str, args: &str, position: usize, is_attribute: bool) -> bool {
        match name {
            "if" => self.machine.open_if(args, is_attribute),
            "elseif" => self.machine.handle_elseif(args),
            "else" => self.machine.handle_else(),
            "endif" => self.machine.close_if(position),
            "foreach" => return self.machine.open_foreach(args, is_attribute),
            "endforeach" => self.machine.close_foreach(position),
            "for" => return self.machine.open_for(args, is_attribute),
            "endfor" => self.machine.close_for(position),
            "while" => self.machine.open_while(args, is_attribute),
            "endwhile" => self.machine.close_while(position),
            "switch" => self.machine.open_switch(args, is_attribute),
            "case" => self.machine.handle_case(args),
            "default" => self.machine.handle_default(),
            "break" => self.machine.handle_break(),
            "endswitch" => self.machine.close_switch(position),
            "section" => return self.handle_section_open(args, position),
            "endsection" => self.handle_section_close(position),
            _ => return false,
        }
        true
    }

    pub(crate) fn run(mut self, source: &str) -> (String, Vec<SectionFragment>) {
        let bytes = source.as_bytes();
        let mut i = 0;
        let mut seg_start = 0;

        while i < bytes.len() {
            // Raw echo first so `{!!` is never read as `{` + `!!`.
            if bytes[i] == b'{' && source[i..].starts_with("{!!") {
                if let Some(close) = source[i + 3..].find("!!}") {
                    self.literal.push_str(&escape_literal(&source[seg_start..i]));
                    let expr = &source[i + 3..i + 3 + close];
                    self.literal
                        .push_str(&format!("${{{}}}", convert_expression(expr.trim())));
                    i += 3 + close + 3;
                    seg_start = i;
                    continue;
                }
            }
            if bytes[i] == b'{' && source[i..].starts_with("{{") {
                if let Some(close) = source[i + 2..].find("}}") {
                    self.literal.push_str(&escape_literal(&source[seg_start..i]));
                    let expr = &source[i + 2..i + 2 + close];
                    self.literal.push_str(&format!(
                        "${{{}.escString({})}}",
                        APP_HELPER_NAMESPACE,
                        convert_expression(expr.trim())
                    ));
                    i += 2 + close + 2;
                    seg_start = i;
                    continue;
                }
            }

            if bytes[i] == b'@' {
                let name_start = i + 1;
                let mut name_end = name_start;
                while name_end < bytes.len() && bytes[name_end].is_ascii_alphabetic() {
                    name_end += 1;
                }
                let name = &source[name_start..name_end];

                let (args, consumed_to) = if DIRECTIVES_WITH_ARGS.contains(&name) {
                    // Only horizontal whitespace between the name and its
                    // argument list.
                    let mut p = name_end;
                    while p < bytes.len() && (bytes[p] == b' ' || bytes[p] == b'\t') {
                        p += 1;
                    }
                    match extract_balanced(source, p) {
                        Some((content, end)) if p < bytes.len() && bytes[p] == b'(' => {
                            (Some(content), end)
                        }
                        _ => {
                            i += 1;
                            continue;
                        }
                    }
                } else if DIRECTIVES_BARE.contains(&name) {
                    (None, name_end)
                } else {
                    i += 1;
                    continue;
                };

                self.literal.push_str(&escape_literal(&source[seg_start..i]));
                self.flush_literal();

                let is_attribute = in_attribute_context(source, i);
                if self.dispatch(name, args.unwrap_or(""), i, is_attribute) {
                    i = consumed_to;
                } else {
                    // Handler declined; the raw occurrence stays literal.
                    self.literal
                        .push_str(&escape_literal(&source[i..consumed_to]));
                    i = consumed_to;
                }
                seg_start = i;
                continue;
            }

            i += 1;
        }

        self.literal.push_str(&escape_literal(&source[seg_start..]));
        self.flush_literal();

        while let Some(open) = self.section_stack.pop() {
            self.machine
                .warnings
                .push(CompileWarning::unterminated_section(&open.name, open.position));
        }
        self.machine.report_unterminated(source.len());

        (self.machine.output.concat(), self.sections)
    }
}
