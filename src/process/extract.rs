// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Pulls code blocks and delimited math out of the text into placeholder
//! tokens before any rewriting pass runs.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::{
    config::{sort_by_priority, DelimiterPattern},
    edits::Edits,
    recorder::{CodeBlock, MathBlock, Recorder},
    token::{self, Family},
};

/// Indented blocks shorter than this (trimmed) are left as prose.
const MIN_INDENTED_CODE_LEN: usize = 20;

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•◦▪]|\d+[.)])\s+").unwrap());

static LATEX_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$|\\\[|\\\]|\\\(|\\\)|\\begin\{|\\end\{").unwrap());

static MATH_SYMBOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[∑∫√≤≥≠±×÷∞∈∉⊂⊆∀∃∂∇≈≡→⇒]|\\(?:frac|sqrt|sum|int|alpha|beta|pi|theta|lim)\b")
        .unwrap()
});

static CODE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[{};]|\(\)|=>|->|:=|[^=!<>]=[^=]|",
        r"\b(?:fn|def|function|return|let|const|var|class|import|from|if|else|for|while|",
        r"print|println|printf|public|private|static|void|int|struct|impl|use|pub|SELECT|FROM|echo)\b|",
        r"#include|</?[a-z]+>"
    ))
    .unwrap()
});

const FUNCTION_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "of", "to", "and", "in", "that", "this", "with", "it",
    "as", "be", "which", "these", "those", "we", "you",
];

/// Extract fenced and indented code blocks.
pub fn extract_code_blocks(text: String, recorder: &mut Recorder) -> String {
    let mut spans = fenced_spans(&text);
    if recorder.config.rules.indented_code {
        let indented = indented_spans(&text, &spans);
        spans.extend(indented);
        spans.sort_by_key(|s| s.start);
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in spans {
        out.push_str(&token::strip_sentinels(&text[last..span.start]));
        let token = recorder.push_code(CodeBlock {
            language: span.language,
            content: span.content,
            raw: text[span.start..span.end].to_string(),
        });
        out.push_str(&token.to_string());
        last = span.end;
    }
    out.push_str(&token::strip_sentinels(&text[last..]));
    out
}

/// Put the original source of every code block back.
pub fn restore_code_raw(text: &str, blocks: &[CodeBlock]) -> String {
    token::replace_family(text, Family::Code, |i| blocks.get(i).map(|b| b.raw.clone()))
}

#[derive(Debug)]
struct CodeSpan {
    start: usize,
    end: usize,
    language: Option<String>,
    content: String,
}

/// Lines of `text` with their byte offsets, line terminators excluded.
fn lines_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    text.split('\n')
        .map(|line| {
            let start = offset;
            offset += line.len() + 1;
            (start, line)
        })
        .collect()
}

fn opening_fence(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start();
    let fence_char = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let fence_len = trimmed.chars().take_while(|c| *c == fence_char).count();
    if fence_len < 3 {
        return None;
    }
    let info = trimmed[fence_len..].trim();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    Some((fence_char, fence_len, info))
}

fn is_closing_fence(line: &str, fence_char: char, fence_len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= fence_len && trimmed.chars().all(|c| c == fence_char)
}

fn fenced_spans(text: &str) -> Vec<CodeSpan> {
    let lines = lines_with_offsets(text);
    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (start, line) = lines[i];
        let Some((fence_char, fence_len, info)) = opening_fence(line) else {
            i += 1;
            continue;
        };
        let Some(close) = (i + 1..lines.len()).find(|&j| is_closing_fence(lines[j].1, fence_char, fence_len))
        else {
            // unterminated fence: leave the text alone
            i += 1;
            continue;
        };

        let (close_start, close_line) = lines[close];
        // the fence indent stays in the text so list items can claim the block
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        let content_lines: Vec<&str> = lines[i + 1..close]
            .iter()
            .map(|(_, l)| strip_spaces(l, indent))
            .collect();
        let language = info
            .split_whitespace()
            .next()
            .map(|lang| lang.trim_start_matches('{').trim_end_matches('}').to_string())
            .filter(|lang| !lang.is_empty());
        spans.push(CodeSpan {
            start: start + indent,
            end: close_start + close_line.len(),
            language,
            content: trim_blank_edges(&content_lines.join("\n")),
        });
        i = close + 1;
    }
    spans
}

/// Remove at most `n` leading spaces.
fn strip_spaces(line: &str, n: usize) -> &str {
    let spaces = line.bytes().take(n).take_while(|b| *b == b' ').count();
    &line[spaces..]
}

/// Drop a single leading and a single trailing blank line.
fn trim_blank_edges(content: &str) -> String {
    let mut content = content;
    if let Some((first, rest)) = content.split_once('\n') {
        if first.trim().is_empty() {
            content = rest;
        }
    }
    if let Some((rest, last)) = content.rsplit_once('\n') {
        if last.trim().is_empty() {
            content = rest;
        }
    }
    content.to_string()
}

fn strip_indent(line: &str) -> Option<&str> {
    line.strip_prefix("    ").or_else(|| line.strip_prefix('\t'))
}

fn indented_spans(text: &str, fenced: &[CodeSpan]) -> Vec<CodeSpan> {
    let lines = lines_with_offsets(text);
    let inside_fence = |(offset, line): (usize, &str)| {
        fenced.iter().any(|s| offset < s.end && offset + line.len() >= s.start)
    };

    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let (start, line) = lines[i];
        let after_break = i == 0 || lines[i - 1].1.trim().is_empty();
        if inside_fence(lines[i]) || !after_break || strip_indent(line).is_none() || line.trim().is_empty() {
            i += 1;
            continue;
        }

        let mut end = i;
        let mut j = i;
        while j < lines.len() && !inside_fence(lines[j]) {
            let (_, l) = lines[j];
            if strip_indent(l).is_some() && !l.trim().is_empty() {
                end = j;
            } else if !l.trim().is_empty() {
                break;
            }
            j += 1;
        }

        let block: Vec<&str> = lines[i..=end].iter().map(|(_, l)| *l).collect();
        if looks_like_indented_code(&block) {
            let content = block
                .iter()
                .map(|l| strip_indent(l).unwrap_or_else(|| l.trim_start()))
                .collect::<Vec<_>>()
                .join("\n");
            let (last_start, last_line) = lines[end];
            spans.push(CodeSpan {
                start,
                end: last_start + last_line.len(),
                language: None,
                content,
            });
        }
        i = end + 1;
    }
    spans
}

fn looks_like_indented_code(lines: &[&str]) -> bool {
    let joined = lines.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");
    if joined.len() < MIN_INDENTED_CODE_LEN {
        return false;
    }
    if lines.iter().any(|l| LIST_MARKER.is_match(l)) {
        return false;
    }
    if LATEX_DELIMITER.is_match(&joined) || MATH_SYMBOL.is_match(&joined) {
        return false;
    }
    if looks_like_prose(&joined) {
        return false;
    }
    CODE_TOKEN.is_match(&joined)
}

fn looks_like_prose(s: &str) -> bool {
    let words: Vec<String> = s
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return false;
    }
    let function_words = words
        .iter()
        .filter(|w| FUNCTION_WORDS.contains(&w.as_str()))
        .count();
    function_words >= 3 && function_words * 100 / words.len() >= 15
}

/// Extract display math, patterns tried in priority order.
pub fn extract_display_math(text: String, recorder: &mut Recorder) -> String {
    let config = recorder.config;
    sort_by_priority(&config.display)
        .into_iter()
        .fold(text, |text, pattern| extract_math(&text, pattern, true, recorder))
}

/// Extract inline math, patterns tried in priority order.
pub fn extract_inline_math(text: String, recorder: &mut Recorder) -> String {
    let config = recorder.config;
    sort_by_priority(&config.inline)
        .into_iter()
        .fold(text, |text, pattern| extract_math(&text, pattern, false, recorder))
}

fn extract_math(text: &str, pattern: &DelimiterPattern, display: bool, recorder: &mut Recorder) -> String {
    let mut edits = Edits::new();
    for m in find_math(text, pattern, display) {
        let token = recorder.push_math(MathBlock {
            raw: text[m.start..m.end].to_string(),
            source: m.source,
            display,
        });
        edits.push(m.start, m.end, token.to_string());
    }
    edits.apply(text)
}

#[derive(Debug, PartialEq, Eq)]
pub struct MathMatch {
    pub start: usize,
    pub end: usize,
    pub source: String,
}

fn is_escaped(text: &str, pos: usize) -> bool {
    text[..pos].bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}

/// Every non-overlapping match of `pattern` in `text`, left to right.
///
/// A closing delimiter is only looked for up to the opener's boundary, and
/// an opener without one lets every later opener before that boundary fail
/// too, so each part of the text is scanned a bounded number of times.
pub fn find_math(text: &str, pattern: &DelimiterPattern, display: bool) -> Vec<MathMatch> {
    let (left, right) = (pattern.left.as_str(), pattern.right.as_str());
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }
    let dollar = pattern.is_dollar();
    let escapable = !left.starts_with('\\');
    let boundaries = Boundaries::new(text, pattern, display);

    let mut matches = Vec::new();
    // a valid closer does not depend on its opener, so one found for an
    // opener rejected as currency also serves later openers in front of it
    let mut known_close: Option<usize> = None;
    let mut from = 0;
    while let Some(found) = text[from..].find(left) {
        let start = from + found;
        let body_start = start + left.len();
        let next_from = start + left.chars().next().map_or(1, char::len_utf8);

        if escapable && is_escaped(text, start) {
            from = next_from;
            continue;
        }
        if dollar && !opens_dollar(text, start) {
            from = next_from;
            continue;
        }

        let limit = boundaries.limit(body_start);
        let close = match known_close.filter(|close| *close > body_start) {
            Some(close) => Some(close),
            None => find_closing(text, body_start, limit, pattern),
        };
        match close {
            Some(close) => {
                known_close = Some(close);
                let end = close + right.len();
                if dollar && !pattern.include_delimiters && looks_like_currency(&text[body_start..close]) {
                    from = next_from;
                    continue;
                }
                let source = if pattern.include_delimiters {
                    text[start..end].to_string()
                } else {
                    text[body_start..close].to_string()
                };
                matches.push(MathMatch { start, end, source });
                from = end;
            }
            None if limit >= text.len() => break,
            None => from = limit.max(next_from),
        }
    }
    matches
}

/// Positions a closing delimiter may not reach past: every newline for
/// single dollars, every blank line for other inline math, none for display.
struct Boundaries {
    breaks: Vec<usize>,
    end: usize,
}

impl Boundaries {
    fn new(text: &str, pattern: &DelimiterPattern, display: bool) -> Self {
        let bytes = text.as_bytes();
        let breaks = match (display, pattern.is_dollar()) {
            (true, _) => Vec::new(),
            (false, true) => bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i)
                .collect(),
            (false, false) => bytes
                .windows(2)
                .enumerate()
                .filter(|(_, pair)| *pair == b"\n\n")
                .map(|(i, _)| i)
                .collect(),
        };
        Self { breaks, end: text.len() }
    }

    /// The first break at or after `body_start`.
    fn limit(&self, body_start: usize) -> usize {
        let i = self.breaks.partition_point(|b| *b < body_start);
        self.breaks.get(i).copied().unwrap_or(self.end)
    }
}

fn opens_dollar(text: &str, start: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[start + 1..].chars().next();
    before != Some('$') && after.is_some_and(|c| c != '$' && !c.is_whitespace())
}

fn closes_dollar(text: &str, pos: usize) -> bool {
    let before = text[..pos].chars().next_back();
    let after = text[pos + 1..].chars().next();
    before.is_some_and(|c| !c.is_whitespace())
        && !after.is_some_and(|c| c.is_ascii_digit() || c == '$')
}

/// The first valid closing delimiter in `body_start..limit`.
fn find_closing(text: &str, body_start: usize, limit: usize, pattern: &DelimiterPattern) -> Option<usize> {
    let right = pattern.right.as_str();
    let escapable = !right.starts_with('\\');
    let region = &text[..limit];
    let mut from = body_start;
    while let Some(found) = region.get(from..)?.find(right) {
        let close = from + found;
        let valid = close > body_start
            && !(escapable && is_escaped(text, close))
            && (!pattern.is_dollar() || closes_dollar(text, close));
        if valid {
            return Some(close);
        }
        from = close + right.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// `$5 and $10`: a dollar span starting with a digit and carrying plain words.
fn looks_like_currency(source: &str) -> bool {
    static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[^\\a-zA-Z])[a-zA-Z]{3,}").unwrap());
    source.starts_with(|c: char| c.is_ascii_digit()) && WORD.is_match(source)
}
