// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use serde::{Deserialize, Serialize};

/// Markdown rule toggles.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MarkdownRules {
    pub process_tables: bool,
    pub process_bold_italic: bool,
    pub process_strikethrough: bool,
    pub process_headers: bool,
    pub process_horizontal_rules: bool,
    pub process_blockquotes: bool,
    pub process_lists: bool,
    pub process_links: bool,
    pub process_images: bool,
    pub fix_broken_links: bool,
    /// Promote bare `( ... )` / `[ ... ]` spans that look mathematical.
    pub implicit_math: bool,
    /// Detect four-space indented code blocks.
    pub indented_code: bool,
}

impl Default for MarkdownRules {
    fn default() -> Self {
        Self {
            process_tables: true,
            process_bold_italic: true,
            process_strikethrough: true,
            process_headers: true,
            process_horizontal_rules: true,
            process_blockquotes: true,
            process_lists: true,
            process_links: true,
            process_images: true,
            fix_broken_links: true,
            implicit_math: true,
            indented_code: true,
        }
    }
}
