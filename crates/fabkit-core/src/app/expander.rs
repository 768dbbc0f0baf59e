//! ArgExpander - argument template expansion
//!
//! Grammar:
//! ```text
//! value     := chunk*
//! chunk     := literal | pad_expr | rand_expr
//! pad_expr  := "$pad(" uint "," value ")"
//! rand_expr := "$rand(" uint ")"
//! ```
//!
//! - `$rand(N)` becomes a uniform integer in `[0, N)`.
//! - `$pad(N, S)` becomes `S` repeated `N` times; expressions inside `S` are
//!   expanded first, once, so `$pad(3,$rand(9))` repeats a single sample.
//! - Malformed forms (no closing paren, non-numeric or zero count, missing
//!   comma) stay verbatim: the `$` is emitted as a literal and scanning
//!   continues right after it.
//! - A `$pad` that would push the expanded value past `MAX_EXPANDED_LEN`
//!   bytes stays as written, with the forms inside it expanded. The budget is
//!   shared by nested and sibling forms.
//!
//! A left-to-right scanner with balanced-paren matching; a regex can't
//! handle `$rand` nested inside `$pad`.

use std::sync::Arc;

use crate::ports::RandomSource;

const RAND_OPEN: &str = "$rand(";
const PAD_OPEN: &str = "$pad(";

/// Pad counts above this are treated as malformed.
pub const MAX_PAD_COUNT: u64 = 1 << 20;

/// Upper bound on the bytes `$pad` expansions may produce in one value.
pub const MAX_EXPANDED_LEN: usize = 4 << 20;

/// Expands `$rand` / `$pad` expressions in chaincode arguments.
#[derive(Clone)]
pub struct ArgExpander {
    rng: Arc<dyn RandomSource>,
}

impl ArgExpander {
    pub fn new(rng: Arc<dyn RandomSource>) -> Self {
        Self { rng }
    }

    pub fn expand(&self, template: &str) -> String {
        expand_with(template, self.rng.as_ref())
    }

    /// Expand every argument, in order.
    pub fn expand_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.expand(t)).collect()
    }
}

/// Expand `template`, drawing random values from `rng` in lexical order.
pub fn expand_with(template: &str, rng: &dyn RandomSource) -> String {
    expand_within(template, rng, MAX_EXPANDED_LEN)
}

/// `expand_with` where pads may add at most `limit` bytes.
fn expand_within(template: &str, rng: &dyn RandomSource, limit: usize) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(ch) = rest.chars().next() {
        if ch == '$'
            && let Some((value, consumed)) =
                expand_form(rest, rng, limit.saturating_sub(out.len()))
        {
            out.push_str(&value);
            rest = &rest[consumed..];
            continue;
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Try to expand a form starting at the beginning of `input`.
///
/// Returns the replacement and the number of bytes of `input` it replaces.
/// A pad longer than `room` bytes is not repeated.
fn expand_form(input: &str, rng: &dyn RandomSource, room: usize) -> Option<(String, usize)> {
    if let Some(after) = input.strip_prefix(RAND_OPEN) {
        let close = closing_paren(after)?;
        let upper = parse_count(&after[..close])?;
        return Some((rng.below(upper).to_string(), RAND_OPEN.len() + close + 1));
    }

    if let Some(after) = input.strip_prefix(PAD_OPEN) {
        let close = closing_paren(after)?;
        let body = &after[..close];
        let comma = top_level_comma(body)?;
        let count = parse_count(&body[..comma]).filter(|n| *n <= MAX_PAD_COUNT)?;
        let consumed = PAD_OPEN.len() + close + 1;
        let expanded = expand_within(&body[comma + 1..], rng, room);
        let unit = expanded.trim();
        let fits = unit
            .len()
            .checked_mul(count as usize)
            .is_some_and(|len| len <= room);
        if !fits {
            return Some((format!("{PAD_OPEN}{},{expanded})", &body[..comma]), consumed));
        }
        return Some((unit.repeat(count as usize), consumed));
    }

    None
}

/// Byte offset of the `)` that closes an already opened `(`.
fn closing_paren(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
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

fn top_level_comma(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Positive decimal integer, surrounding whitespace allowed.
fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok().filter(|n| *n > 0)
}
