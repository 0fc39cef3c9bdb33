// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use crate::{
    config::RendererConfig,
    engine::Typesetter,
    token::{Family, Token},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub content: String,
    /// The span exactly as it appeared in the input, fences included.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathBlock {
    /// Source with its delimiters, re-matched after restoration.
    pub raw: String,
    pub source: String,
    pub display: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Unordered,
    Ordered,
    Task { checked: bool },
}

impl ListKind {
    pub fn is_ordered(&self) -> bool {
        matches!(self, ListKind::Ordered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    /// Leading whitespace width of the marker line.
    pub level: usize,
    pub kind: ListKind,
    pub ordinal: Option<u64>,
    pub content: String,
}

/// `d/dx(...)` awaiting expansion into a derivative fraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    pub variable: String,
    pub argument: String,
    pub raw: String,
}

/// Finished HTML kept out of the text until the very end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    /// The escaped text the fragment replaced.
    pub raw: String,
    /// Block-level fragments are never wrapped in paragraphs.
    pub block: bool,
}

/// Per-call state shared by the pipeline stages. Every block list is
/// append-only, so a token index stays valid for the whole call.
pub struct Recorder<'r> {
    pub config: &'r RendererConfig,
    pub typesetter: &'r dyn Typesetter,

    pub code: Vec<CodeBlock>,
    pub display: Vec<MathBlock>,
    pub inline: Vec<MathBlock>,
    pub lists: Vec<ListItem>,
    pub derivatives: Vec<Derivative>,
    /// Shield index to inline-math index.
    pub shielded: Vec<usize>,
    pub fragments: Vec<Fragment>,
}

impl<'r> Recorder<'r> {
    pub fn new(config: &'r RendererConfig, typesetter: &'r dyn Typesetter) -> Recorder<'r> {
        Recorder {
            config,
            typesetter,
            code: vec![],
            display: vec![],
            inline: vec![],
            lists: vec![],
            derivatives: vec![],
            shielded: vec![],
            fragments: vec![],
        }
    }

    pub fn push_code(&mut self, block: CodeBlock) -> Token {
        self.code.push(block);
        Token::new(Family::Code, self.code.len() - 1)
    }

    pub fn push_math(&mut self, block: MathBlock) -> Token {
        if block.display {
            self.display.push(block);
            Token::new(Family::Display, self.display.len() - 1)
        } else {
            self.inline.push(block);
            Token::new(Family::Inline, self.inline.len() - 1)
        }
    }

    pub fn push_list(&mut self, item: ListItem) -> Token {
        self.lists.push(item);
        Token::new(Family::List, self.lists.len() - 1)
    }

    pub fn push_derivative(&mut self, derivative: Derivative) -> Token {
        self.derivatives.push(derivative);
        Token::new(Family::Derivative, self.derivatives.len() - 1)
    }

    pub fn push_shield(&mut self, inline_index: usize) -> Token {
        self.shielded.push(inline_index);
        Token::new(Family::Shield, self.shielded.len() - 1)
    }

    pub fn push_fragment(&mut self, fragment: Fragment) -> Token {
        self.fragments.push(fragment);
        Token::new(Family::Fragment, self.fragments.len() - 1)
    }

    /// Whether `token` stands for block-level content once restored.
    pub fn is_block(&self, token: Token) -> bool {
        match token.family {
            Family::Code | Family::Display | Family::List => true,
            Family::Fragment => self.fragments.get(token.index).is_some_and(|f| f.block),
            _ => false,
        }
    }
}
