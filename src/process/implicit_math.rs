// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Upgrades bare `d/dx(...)`, `( ... )` and `[ ... ]` spans that look like
//! mathematics into explicit math.
//!
//! Runs on escaped prose, after delimited math has been extracted.

use std::{ops::Range, sync::LazyLock};

use regex_lite::Regex;

use crate::{
    config::{sort_by_priority, DelimiterPattern},
    edits::Edits,
    recorder::{Derivative, MathBlock, Recorder},
    token,
};

/// Prose longer than this many words needs a strong math signal.
const PROSE_WORD_LIMIT: usize = 4;

/// Bare spans longer than this are left alone.
const MAX_BARE_SPAN: usize = 1024;

static DERIVATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^A-Za-z\\])d/d([A-Za-z])\s*[(\[]").unwrap());

static LATEX_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[A-Za-z]+").unwrap());

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9)\]}]\^|[A-Za-z0-9]_(?:\{|[A-Za-z0-9](?:[^A-Za-z0-9_]|$))").unwrap()
});

static MATH_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[∑∏∫√≤≥≠±∓×÷∞∈∉⊂⊆∪∩∀∃∂∇≈≡∝→⇒⇔πθαβγδλμσωΔΣΩ⁰¹²³⁴⁵⁶⁷⁸⁹ⁿ₀₁₂₃₄₅₆₇₈₉]").unwrap());

/// An operator between a single-letter variable, number or closing bracket
/// and another operand: `x+1`, `2 * y`, `a = b`, `n<5`.
static OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:^|[^A-Za-z])(?:[A-Za-z]|\d+(?:\.\d+)?|[)\]}])\s*",
        r"(?:[-+*/=<>]|<=|>=|!=)\s*",
        r"(?:[A-Za-z]|\d|[(\\])(?:[^A-Za-z]|$)"
    ))
    .unwrap()
});

static NUMERIC_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+(?:\.\d+)?\s*-\s*\d+(?:\.\d+)?(?:\s|$)").unwrap());

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[^\\A-Za-z])([A-Za-z]{2,})").unwrap());

const ARTICLES: &[&str] = &["a", "an", "the"];

const CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "because", "which", "that", "although", "however", "since", "unless",
    "whereas", "while",
];

const EXPLANATORY_PHRASES: &[&str] = &[
    "for example",
    "for instance",
    "e.g.",
    "i.e.",
    "such as",
    "see ",
    "note",
    "in other words",
    "known as",
    "called",
    "refer to",
    "optional",
    "default",
];

/// Promote derivatives and bare spans in `text`.
pub fn promote(text: String, recorder: &mut Recorder) -> String {
    if !recorder.config.rules.implicit_math {
        return text;
    }
    let text = promote_derivatives(&text, recorder);
    promote_bare_spans(&text, recorder)
}

/// Replace `d/dx(...)` units with derivative tokens. The argument extent is
/// found by balanced scanning, so nested parentheses are fine.
pub fn promote_derivatives(text: &str, recorder: &mut Recorder) -> String {
    let pairs = bracket_pairs(text);
    let mut edits = Edits::new();
    let mut last_end = 0;
    for caps in DERIVATIVE.captures_iter(text) {
        let (Some(whole), Some(variable)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = whole.end() - 1;
        if open < last_end {
            continue;
        }
        let start = text[whole.start()..whole.end()]
            .find("d/d")
            .map_or(whole.start(), |pos| whole.start() + pos);
        let Some(close) = closing_of(&pairs, open) else {
            continue;
        };
        let argument = &text[open + 1..close];
        if argument.trim().is_empty() || token::contains_any(argument) || argument.contains('\n') {
            continue;
        }
        let raw = htmlize::unescape(&text[start..=close]).to_string();
        let token = recorder.push_derivative(Derivative {
            variable: variable.as_str().to_string(),
            argument: htmlize::unescape(argument.trim()).to_string(),
            raw,
        });
        edits.push(start, close + 1, token.to_string());
        last_end = close + 1;
    }
    edits.apply(text)
}

/// Bracket pairs `(open, close)` that open and close on the same line, sorted
/// by opening index. Parentheses and square brackets nest independently.
fn bracket_pairs(text: &str) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut parens = Vec::new();
    let mut squares = Vec::new();
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'\n' => {
                parens.clear();
                squares.clear();
            }
            b'(' => parens.push(i),
            b'[' => squares.push(i),
            b')' => pairs.extend(parens.pop().map(|open| (open, i))),
            b']' => pairs.extend(squares.pop().map(|open| (open, i))),
            _ => {}
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Index of the bracket closing the one at `open`, looked up in `pairs`.
fn closing_of(pairs: &[(usize, usize)], open: usize) -> Option<usize> {
    pairs
        .binary_search_by_key(&open, |&(o, _)| o)
        .ok()
        .map(|at| pairs[at].1)
}

/// Byte ranges of backtick code spans on each line, which must not be touched.
fn code_span_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;
    for (i, c) in text.char_indices() {
        match c {
            '`' => match open.take() {
                Some(start) => ranges.push(start..i + 1),
                None => open = Some(i),
            },
            '\n' => open = None,
            _ => {}
        }
    }
    ranges
}

fn first_delimiter(patterns: &[DelimiterPattern]) -> Option<&DelimiterPattern> {
    sort_by_priority(patterns)
        .into_iter()
        .find(|p| !p.include_delimiters)
}

/// Promote `( ... )` and `[ ... ]` spans whose content looks mathematical.
pub fn promote_bare_spans(text: &str, recorder: &mut Recorder) -> String {
    let config = recorder.config;
    let Some(inline) = first_delimiter(&config.inline) else {
        return text.to_string();
    };
    let display = first_delimiter(&config.display).unwrap_or(inline);
    let protected = code_span_ranges(text);

    let bytes = text.as_bytes();
    let mut edits = Edits::new();
    let mut ranges = protected.iter().peekable();
    let mut next_free = 0;
    for (open, close) in bracket_pairs(text) {
        if open < next_free {
            continue;
        }
        while ranges.next_if(|r| r.end <= open).is_some() {}
        if ranges.peek().is_some_and(|r| r.contains(&open)) {
            continue;
        }
        let b = bytes[open];
        let prev = text[..open].chars().next_back();
        // function application `f(x)`, link targets `](...)`, images `![..]`
        let attached = prev.is_some_and(|c| c.is_alphanumeric() || c == ']' || c == '\\' || c == '!');
        let followed_by_link = b == b'[' && bytes.get(close + 1) == Some(&b'(');
        let content = &text[open + 1..close];

        if attached || followed_by_link || content.len() > MAX_BARE_SPAN || !should_promote(content) {
            continue;
        }

        let source = htmlize::unescape(content.trim()).to_string();
        let own_line = b == b'['
            && text[..open].chars().rev().take_while(|c| *c != '\n').all(char::is_whitespace)
            && text[close + 1..].chars().take_while(|c| *c != '\n').all(char::is_whitespace);
        let (pattern, is_display) = if own_line { (display, true) } else { (inline, false) };
        let token = recorder.push_math(MathBlock {
            raw: format!("{}{}{}", pattern.left, source, pattern.right),
            source,
            display: is_display,
        });
        edits.push(open, close + 1, token.to_string());
        next_free = close + 1;
    }
    edits.apply(text)
}

fn should_promote(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.is_empty() || trimmed.starts_with('^') || token::contains_any(trimmed) {
        return false;
    }
    let unescaped = htmlize::unescape(trimmed);
    looks_mathematical(&unescaped) && !looks_like_prose(&unescaped)
}

/// LaTeX commands and math symbols; enough on their own.
fn strong_math(s: &str) -> bool {
    LATEX_COMMAND.is_match(s) || MATH_SYMBOL.is_match(s)
}

pub fn looks_mathematical(s: &str) -> bool {
    if strong_math(s) || SCRIPT.is_match(s) {
        return true;
    }
    !NUMERIC_RANGE.is_match(s) && OPERATOR.is_match(s)
}

pub fn looks_like_prose(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    let words: Vec<&str> = WORD
        .captures_iter(&lower)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    // an article only reads as prose when a real word follows it, so the
    // variable in `a + b` is not mistaken for one
    let mut tokens = lower.split_whitespace();
    let leads_with_article = tokens.next().is_some_and(|w| ARTICLES.contains(&w))
        && tokens
            .next()
            .is_some_and(|w| w.chars().take_while(|c| c.is_alphabetic()).count() >= 2);
    if leads_with_article {
        return true;
    }
    if words.iter().any(|w| CONJUNCTIONS.contains(w)) && words.len() >= 2 {
        return true;
    }
    if EXPLANATORY_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    words.len() > PROSE_WORD_LIMIT && !strong_math(s)
}
