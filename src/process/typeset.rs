// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Math restoration and the adapter around the external typesetting engine.

use std::panic::{self, AssertUnwindSafe};

use crate::{
    config::sort_by_priority,
    edits::Edits,
    html_flake::{self, html_math_fallback},
    process::extract::find_math,
    recorder::{Fragment, Recorder},
    token::{self, Family, Token},
};

/// Put display then inline math back as escaped delimited source, typeset
/// everything exposed, and expand derivatives.
///
/// Math inside list items lives in the list records rather than the text,
/// so it stays untouched until the lists are expanded and this runs again.
pub fn restore_and_typeset(text: String, recorder: &mut Recorder) -> String {
    let text = restore_display(&text, recorder);
    let text = restore_inline(&text, recorder);
    let text = typeset_delimited(&text, recorder);
    expand_derivatives(&text, recorder)
}

pub fn restore_display(text: &str, recorder: &Recorder) -> String {
    token::replace_family(text, Family::Display, |i| {
        recorder.display.get(i).map(|m| html_flake::escape(&m.raw))
    })
}

pub fn restore_inline(text: &str, recorder: &Recorder) -> String {
    token::replace_family(text, Family::Inline, |i| {
        recorder.inline.get(i).map(|m| html_flake::escape(&m.raw))
    })
}

/// Typeset every delimited expression in escaped `text`: display patterns
/// first, then inline ones, each set in priority order.
pub fn typeset_delimited(text: &str, recorder: &mut Recorder) -> String {
    let config = recorder.config;
    let passes = sort_by_priority(&config.display)
        .into_iter()
        .map(|p| (p, true))
        .chain(sort_by_priority(&config.inline).into_iter().map(|p| (p, false)));

    let mut text = text.to_string();
    for (pattern, display) in passes {
        let mut edits = Edits::new();
        for m in find_math(&text, pattern, display) {
            let raw = &text[m.start..m.end];
            if raw.contains(recorder.typesetter.output_marker()) || token::contains_any(raw) {
                continue;
            }
            let source = htmlize::unescape(&m.source).to_string();
            let raw = htmlize::unescape(raw).to_string();
            let token = typeset_unit(&source, &raw, display, recorder);
            edits.push(m.start, m.end, token.to_string());
        }
        text = edits.apply(&text);
    }
    text
}

/// `d/dx(u)` becomes `\frac{d}{dx}\left(u\right)`.
pub fn expand_derivatives(text: &str, recorder: &mut Recorder) -> String {
    let derivatives = recorder.derivatives.clone();
    token::replace_family(text, Family::Derivative, |i| {
        let derivative = derivatives.get(i)?;
        let source = format!(
            r"\frac{{d}}{{d{}}}\left({}\right)",
            derivative.variable, derivative.argument
        );
        Some(typeset_unit(&source, &derivative.raw, false, recorder).to_string())
    })
}

/// Typeset one expression into a fragment. A failing or panicking engine
/// degrades only this expression to a fallback showing `raw`.
pub fn typeset_unit(source: &str, raw: &str, display: bool, recorder: &mut Recorder) -> Token {
    let (config, typesetter) = (recorder.config, recorder.typesetter);
    let options = &config.typeset;
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        typesetter.typeset(source, display, options)
    }));

    let html = match result {
        Ok(Ok(html)) => html,
        Ok(Err(error)) => {
            log::warn!("failed to typeset `{}`: {}", raw, error);
            html_math_fallback(raw, display, &options.error_color, &error.to_string())
        }
        Err(_) => {
            log::warn!("typesetting engine panicked on `{}`", raw);
            html_math_fallback(raw, display, &options.error_color, "typesetting engine panicked")
        }
    };
    recorder.push_fragment(Fragment {
        html,
        raw: html_flake::escape(raw),
        block: display,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{RendererConfig, TypesetOptions},
        engine::{KatexPassthrough, Typesetter},
        recorder::{Derivative, MathBlock},
    };

    struct Panicking;

    impl Typesetter for Panicking {
        fn typeset(&self, source: &str, _: bool, _: &TypesetOptions) -> eyre::Result<String> {
            if source.contains("boom") {
                panic!("engine bug");
            }
            Ok(format!(r#"<span class="katex">{source}</span>"#))
        }
    }

    fn fragment_html(recorder: &Recorder, text: &str) -> Vec<String> {
        token::pieces(text)
            .into_iter()
            .filter_map(|p| match p {
                token::Piece::Token(t) if t.family == Family::Fragment => {
                    Some(recorder.fragments[t.index].html.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_restore_then_typeset() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let d = recorder.push_math(MathBlock {
            raw: r"\[a<b\]".to_string(),
            source: "a<b".to_string(),
            display: true,
        });
        let i = recorder.push_math(MathBlock {
            raw: "$x$".to_string(),
            source: "x".to_string(),
            display: false,
        });
        let text = format!("see {d} and {i}.");
        let out = restore_and_typeset(text, &mut recorder);
        let html = fragment_html(&recorder, &out);
        assert_eq!(html.len(), 2);
        assert!(html[0].contains(r#"data-display="true">a&lt;b</span>"#));
        assert!(html[1].contains(r#"data-display="false">x"#));
        assert!(out.starts_with("see "));
        assert!(!out.contains('$'));
    }

    #[test]
    fn test_failure_is_local() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let out = typeset_delimited(r"\[ \frac{1}{0 \] and \(y\)", &mut recorder);
        let html = fragment_html(&recorder, &out);
        assert_eq!(html.len(), 2);
        assert!(html[0].contains("math-fallback-display"));
        assert!(html[0].contains(r"\frac{1}{0"));
        assert!(html[1].contains(crate::engine::OUTPUT_MARKER));
    }

    #[test]
    fn test_panicking_engine_contained() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &Panicking);
        let out = typeset_delimited(r"\(boom\) \(ok\)", &mut recorder);
        let html = fragment_html(&recorder, &out);
        assert!(html[0].contains("math-fallback-inline"));
        assert!(html[1].contains("ok"));
    }

    #[test]
    fn test_rendered_output_not_typeset_again() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let text = r#"\(<span class="katex">x</span>\)"#;
        assert_eq!(typeset_delimited(text, &mut recorder), text);
        assert!(recorder.fragments.is_empty());
    }

    #[test]
    fn test_expand_derivative() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let v = recorder.push_derivative(Derivative {
            variable: "x".to_string(),
            argument: "x^2".to_string(),
            raw: "d/dx(x^2)".to_string(),
        });
        let out = expand_derivatives(&v.to_string(), &mut recorder);
        let html = fragment_html(&recorder, &out);
        assert!(html[0].contains(r"\frac{d}{dx}\left(x^2\right)"));
    }
}
