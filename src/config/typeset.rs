// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Options handed through to the math typesetting engine.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TypesetOptions {
    /// Report malformed source as an error instead of typesetting it anyway.
    pub throw_on_error: bool,
    /// Color of the fallback shown for expressions that failed to typeset.
    pub error_color: String,
    /// `\name` to expansion, applied before typesetting.
    pub macros: IndexMap<String, String>,
}

impl Default for TypesetOptions {
    fn default() -> Self {
        Self {
            throw_on_error: true,
            error_color: "#cc0000".to_string(),
            macros: IndexMap::new(),
        }
    }
}
