// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::{rules::MarkdownRules, typeset::TypesetOptions};

/// A pair of math delimiters. Lower `priority` is tried first; a missing
/// priority is tried last.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DelimiterPattern {
    pub left: String,
    pub right: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// Keep the delimiters in the typeset source, as environments need.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_delimiters: bool,
}

impl DelimiterPattern {
    pub fn new(left: &str, right: &str, priority: i64) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
            priority: Some(priority),
            include_delimiters: false,
        }
    }

    pub fn environment(name: &str, priority: i64) -> Self {
        Self {
            left: format!("\\begin{{{name}}}"),
            right: format!("\\end{{{name}}}"),
            priority: Some(priority),
            include_delimiters: true,
        }
    }

    /// Single-dollar delimiters follow the currency-avoiding rules.
    pub fn is_dollar(&self) -> bool {
        self.left == "$" && self.right == "$"
    }
}

/// Stable ascending sort on priority, missing priorities last.
pub fn sort_by_priority(patterns: &[DelimiterPattern]) -> Vec<&DelimiterPattern> {
    let mut sorted: Vec<&DelimiterPattern> = patterns.iter().collect();
    sorted.sort_by_key(|p| p.priority.unwrap_or(i64::MAX));
    sorted
}

pub type Hook = Arc<dyn Fn(&str) -> eyre::Result<String> + Send + Sync>;

/// Custom processing applied before the first and after the last stage.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre: Option<Hook>,
    pub post: Option<Hook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RendererConfig {
    pub display: Vec<DelimiterPattern>,
    pub inline: Vec<DelimiterPattern>,
    pub typeset: TypesetOptions,
    pub rules: MarkdownRules,

    #[serde(skip)]
    pub hooks: Hooks,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            display: vec![
                DelimiterPattern::new("$$", "$$", 0),
                DelimiterPattern::new("\\[", "\\]", 1),
                DelimiterPattern::environment("equation", 2),
                DelimiterPattern::environment("equation*", 2),
                DelimiterPattern::environment("align", 3),
                DelimiterPattern::environment("align*", 3),
                DelimiterPattern::environment("gather", 3),
                DelimiterPattern::environment("gather*", 3),
            ],
            inline: vec![
                DelimiterPattern::new("\\(", "\\)", 0),
                DelimiterPattern::new("$", "$", 1),
            ],
            typeset: TypesetOptions::default(),
            rules: MarkdownRules::default(),
            hooks: Hooks::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_pre_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> eyre::Result<String> + Send + Sync + 'static,
    {
        self.hooks.pre = Some(Arc::new(f));
        self
    }

    pub fn with_post_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> eyre::Result<String> + Send + Sync + 'static,
    {
        self.hooks.post = Some(Arc::new(f));
        self
    }
}
