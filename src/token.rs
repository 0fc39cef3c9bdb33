// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Placeholder tokens standing in for protected spans while the pipeline
//! rewrites the surrounding text.
//!
//! Every token serializes as `OPEN tag index CLOSE`, where `OPEN`/`CLOSE`
//! are private-use code points that never survive in input text (see
//! [`strip_sentinels`]), so no pass can confuse a token with user content.

use std::fmt::{self, Display};

pub const OPEN: char = '\u{E000}';
pub const CLOSE: char = '\u{E001}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Code,
    Display,
    Inline,
    List,
    Derivative,
    /// List-local namespace for inline math while list items are formatted.
    Shield,
    /// Finished HTML: rendered math, inline code, links.
    Fragment,
}

impl Family {
    pub fn tag(&self) -> char {
        match self {
            Family::Code => 'C',
            Family::Display => 'D',
            Family::Inline => 'I',
            Family::List => 'L',
            Family::Derivative => 'V',
            Family::Shield => 'S',
            Family::Fragment => 'F',
        }
    }

    pub fn from_tag(tag: char) -> Option<Family> {
        match tag {
            'C' => Some(Family::Code),
            'D' => Some(Family::Display),
            'I' => Some(Family::Inline),
            'L' => Some(Family::List),
            'V' => Some(Family::Derivative),
            'S' => Some(Family::Shield),
            'F' => Some(Family::Fragment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub family: Family,
    pub index: usize,
}

impl Token {
    pub fn new(family: Family, index: usize) -> Self {
        Self { family, index }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", OPEN, self.family.tag(), self.index, CLOSE)
    }
}

/// A piece of text split around tokens.
#[derive(Debug, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    Token(Token),
    /// A sentinel that does not form a well-shaped token.
    Stray(&'a str),
}

/// Split `s` into text runs and tokens, in order.
pub fn pieces(s: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(pos) = rest.find([OPEN, CLOSE]) {
        if pos > 0 {
            out.push(Piece::Text(&rest[..pos]));
        }
        let tail = &rest[pos..];
        match parse_at(tail) {
            Some((token, len)) => {
                out.push(Piece::Token(token));
                rest = &tail[len..];
            }
            None => {
                let len = tail.chars().next().map_or(1, char::len_utf8);
                out.push(Piece::Stray(&tail[..len]));
                rest = &tail[len..];
            }
        }
    }
    if !rest.is_empty() {
        out.push(Piece::Text(rest));
    }
    out
}

/// Parse a token at the very start of `s`, returning it with its byte length.
fn parse_at(s: &str) -> Option<(Token, usize)> {
    let mut chars = s.char_indices();
    let (_, open) = chars.next()?;
    if open != OPEN {
        return None;
    }
    let (_, tag) = chars.next()?;
    let family = Family::from_tag(tag)?;
    let digits_start = OPEN.len_utf8() + tag.len_utf8();
    let digits_len = s[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    let close_at = digits_start + digits_len;
    if !s[close_at..].starts_with(CLOSE) {
        return None;
    }
    let index = s[digits_start..close_at].parse().ok()?;
    Some((Token::new(family, index), close_at + CLOSE.len_utf8()))
}

/// Replace every token of `family` with the result of `f`; `None` keeps the token.
pub fn replace_family<F>(s: &str, family: Family, mut f: F) -> String
where
    F: FnMut(usize) -> Option<String>,
{
    if !s.contains(OPEN) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for piece in pieces(s) {
        match piece {
            Piece::Text(t) | Piece::Stray(t) => out.push_str(t),
            Piece::Token(token) if token.family == family => match f(token.index) {
                Some(replacement) => out.push_str(&replacement),
                None => out.push_str(&token.to_string()),
            },
            Piece::Token(token) => out.push_str(&token.to_string()),
        }
    }
    out
}

pub fn contains_family(s: &str, family: Family) -> bool {
    s.contains(OPEN)
        && pieces(s)
            .iter()
            .any(|p| matches!(p, Piece::Token(t) if t.family == family))
}

pub fn contains_any(s: &str) -> bool {
    s.contains(OPEN) || s.contains(CLOSE)
}

/// Drop private-use sentinels from untrusted text so it cannot forge tokens.
pub fn strip_sentinels(s: &str) -> String {
    s.replace([OPEN, CLOSE], "")
}

/// Whether `s`, ignoring surrounding whitespace, is exactly one token.
pub fn sole_token(s: &str) -> Option<Token> {
    let s = s.trim();
    let (token, len) = parse_at(s)?;
    (len == s.len()).then_some(token)
}
