// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! The rendering pipeline as an ordered list of stages. Each stage takes
//! the whole text and the per-call [`Recorder`], and returns the new text.

pub mod extract;
pub mod finalize;
pub mod implicit_math;
pub mod inline;
pub mod list;
pub mod normalize;
pub mod typeset;

use crate::{html_flake, recorder::Recorder};

pub type Stage = fn(String, &mut Recorder) -> String;

/// Stage order is the contract: code before math, math before prose
/// escaping, list tokens before implicit math, and every fragment restored
/// only at the very end.
pub const STAGES: &[(&str, Stage)] = &[
    ("extract-code", extract::extract_code_blocks),
    ("normalize-artifacts", normalize::normalize_artifacts),
    ("extract-display-math", extract::extract_display_math),
    ("extract-inline-math", extract::extract_inline_math),
    ("escape-prose", escape_prose),
    ("structure-lists", list::structure_lists),
    ("promote-implicit-math", implicit_math::promote),
    ("typeset-math", typeset::restore_and_typeset),
    ("format-markdown", inline::format_markdown),
    ("expand-lists", finalize::expand_lists),
    ("typeset-nested-math", typeset::restore_and_typeset),
    ("paragraphs", finalize::paragraphs),
    ("scrub-contamination", finalize::scrub),
    ("resolve-tokens", finalize::resolve_tokens),
];

/// Everything left in the text is prose now; tokens carry no markup
/// characters and pass through unchanged.
pub fn escape_prose(text: String, _recorder: &mut Recorder) -> String {
    html_flake::escape(&text)
}

/// Run every stage over `text`. Contamination is scrubbed again at each
/// stage boundary, except after the last, which has put code back.
pub fn run(text: &str, recorder: &mut Recorder) -> String {
    let last = STAGES.len() - 1;
    STAGES
        .iter()
        .enumerate()
        .fold(text.to_string(), |text, (n, (name, stage))| {
            log::trace!("stage `{}` on {} bytes", name, text.len());
            let text = stage(text, recorder);
            match n == last {
                true => text,
                false => normalize::scrub_contamination(&text),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RendererConfig, engine::KatexPassthrough, token};

    fn render(text: &str) -> String {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        run(text, &mut recorder)
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let names: Vec<&str> = STAGES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.first(), Some(&"extract-code"));
        assert_eq!(names.last(), Some(&"resolve-tokens"));
        let pos = |n: &str| names.iter().position(|m| *m == n);
        assert!(pos("extract-display-math") < pos("extract-inline-math"));
        assert!(pos("expand-lists") < pos("typeset-nested-math"));
    }

    #[test]
    fn test_escape_keeps_tokens() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let t = token::Token::new(token::Family::Code, 0);
        assert_eq!(escape_prose(format!("<b>{t}&"), &mut recorder), format!("&lt;b&gt;{t}&amp;"));
    }

    #[test]
    fn test_no_token_leaks() {
        let out = render("# T\n\n- $x$ and (a+b)\n  - `y`\n\n> q d/dx(x^2)\n\n| a |\n|---|\n| $1$ |");
        assert!(!token::contains_any(&out), "{out:?}");
        assert!(out.contains("<h1>T</h1>"));
        assert!(out.contains("<blockquote>"));
        assert!(out.contains("<table>"));
    }

    #[test]
    fn test_html_in_prose_is_escaped() {
        let out = render("<script>alert(1)</script> & done");
        assert_eq!(out, "<p>&lt;script&gt;alert(1)&lt;/script&gt; &amp; done</p>");
    }
}
