//! Line-oriented `key: value` block parser.
//!
//! # Responsibility
//! - Turn a text block into an ordered `FieldMap`.
//!
//! # Invariants
//! - A `key: value` line always opens a new field and finalizes the open one.
//! - A field listed with no value yields an explicit empty string.
//! - Unrecognized lines close the open field and are otherwise dropped.
//! - Field keys are letters only; other key-like lines are plain text.

use crate::model::recipe::{FieldMap, INGREDIENTS_FIELD};
use once_cell::sync::Lazy;
use regex::Regex;

static FIELD_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+):[ \t]*(.*)$").expect("valid field line regex"));
static KEY_LIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[^\s:]+:(?:\s|$)").expect("valid key-like regex"));

/// Parser state: either no field is open, or one field is accumulating.
#[derive(Debug)]
enum ParserState {
    Idle,
    Open { key: String, lines: Vec<String> },
}

impl ParserState {
    /// Finalizes an open field into `fields` and returns to `Idle`.
    fn close(self, fields: &mut FieldMap) -> Self {
        if let Self::Open { key, lines } = self {
            fields.insert(key, lines.join("\n"));
        }
        Self::Idle
    }

    fn accepts_continuation(&self, line: &str) -> bool {
        let Self::Open { key, .. } = self else {
            return false;
        };
        if key == INGREDIENTS_FIELD {
            return true;
        }
        let indented = line.starts_with([' ', '\t']) && !line.trim().is_empty();
        indented || KEY_LIKE_RE.is_match(line)
    }
}

/// Parses a `key: value` block.
///
/// Continuation lines are kept verbatim (trailing whitespace trimmed) and
/// joined with `\n`. Any line after an `ingredients:` header is a
/// continuation until the next field line.
pub fn parse_block(text: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    let mut state = ParserState::Idle;

    for line in text.lines() {
        if let Some(caps) = FIELD_LINE_RE.captures(line) {
            state = state.close(&mut fields);
            state = ParserState::Open {
                key: caps[1].to_string(),
                lines: vec![caps[2].trim().to_string()],
            };
            continue;
        }

        if state.accepts_continuation(line) {
            if let ParserState::Open { lines, .. } = &mut state {
                lines.push(line.trim_end().to_string());
            }
            continue;
        }

        state = state.close(&mut fields);
    }

    state.close(&mut fields);
    fields
}
