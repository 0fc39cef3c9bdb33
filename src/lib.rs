// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Render untrusted AI model output, a mix of Markdown, several LaTeX
//! notations and provider artifacts, into sanitized HTML.
//!
//! ```
//! let html = chatmark::render(r"Area: $\pi r^2$", Some("deepseek-r1"));
//! assert!(html.contains(r#"class="katex""#));
//! ```

pub mod config;
pub mod edits;
pub mod engine;
pub mod html_flake;
mod html_macro;
pub mod process;
pub mod recorder;
pub mod token;

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::LazyLock,
};

use eyre::{eyre, WrapErr};

pub use config::{ProfileRegistry, RendererConfig};
pub use engine::{KatexPassthrough, Typesetter};

use crate::recorder::Recorder;

/// Input excerpts in error blocks are cut to this many characters.
pub const MAX_EXCERPT_CHARS: usize = 500;

static DEFAULT_RENDERER: LazyLock<Renderer> = LazyLock::new(Renderer::default);

/// Render `text` with the built-in profiles and engine. Never fails; see
/// [`Renderer::render`].
pub fn render(text: &str, profile: Option<&str>) -> String {
    DEFAULT_RENDERER.render(text, profile)
}

/// A profile registry paired with a typesetting engine. Rendering keeps no
/// state between calls, so one renderer may serve many threads.
pub struct Renderer {
    registry: ProfileRegistry,
    typesetter: Box<dyn Typesetter + Send + Sync>,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new(ProfileRegistry::default())
    }
}

impl Renderer {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self {
            registry,
            typesetter: Box::new(KatexPassthrough),
        }
    }

    pub fn with_typesetter<T>(mut self, typesetter: T) -> Self
    where
        T: Typesetter + Send + Sync + 'static,
    {
        self.typesetter = Box::new(typesetter);
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Render with the profile resolved for `profile`. Errors come from the
    /// custom hooks or from a panic inside the pipeline.
    pub fn try_render(&self, text: &str, profile: Option<&str>) -> eyre::Result<String> {
        render_with(text, self.registry.get(profile), self.typesetter.as_ref())
    }

    /// Like [`Renderer::try_render`], but any failure becomes an error block
    /// quoting the start of the input.
    pub fn render(&self, text: &str, profile: Option<&str>) -> String {
        self.try_render(text, profile).unwrap_or_else(|err| {
            log::warn!("render failed: {:#}", err);
            error_block(text, &err)
        })
    }
}

/// Run the hooks and the pipeline for one message.
pub fn render_with(
    text: &str,
    config: &RendererConfig,
    typesetter: &dyn Typesetter,
) -> eyre::Result<String> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> eyre::Result<String> {
        let text = match &config.hooks.pre {
            Some(hook) => hook(text).wrap_err("pre-processing hook failed")?,
            None => text.to_string(),
        };
        let mut recorder = Recorder::new(config, typesetter);
        let html = process::run(&text, &mut recorder);
        match &config.hooks.post {
            Some(hook) => hook(&html).wrap_err("post-processing hook failed"),
            None => Ok(html),
        }
    }));
    result.unwrap_or_else(|payload| Err(eyre!("rendering panicked: {}", panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// The marked block shown instead of a message that could not be rendered.
pub fn error_block(text: &str, err: &eyre::Report) -> String {
    let mut excerpt: String = text.chars().take(MAX_EXCERPT_CHARS).collect();
    if text.chars().nth(MAX_EXCERPT_CHARS).is_some() {
        excerpt.push('…');
    }
    html_flake::html_error_block(&format!("{:#}", err), &excerpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypesetOptions;

    struct Tagging;

    impl Typesetter for Tagging {
        fn typeset(&self, source: &str, _: bool, _: &TypesetOptions) -> eyre::Result<String> {
            Ok(format!("<m>{source}</m>"))
        }
    }

    #[test]
    fn test_hooks_run_around_pipeline() {
        let config = RendererConfig::default()
            .with_pre_hook(|s| Ok(s.replace("TODAY", "**now**")))
            .with_post_hook(|s| Ok(format!("<section>{s}</section>")));
        let html = render_with("see TODAY", &config, &KatexPassthrough).unwrap();
        assert_eq!(html, "<section><p>see <strong>now</strong></p></section>");
    }

    #[test]
    fn test_failing_hook_becomes_error_block() {
        let mut registry = ProfileRegistry::empty();
        registry.set_default(RendererConfig::default().with_pre_hook(|_| Err(eyre!("nope"))));
        let renderer = Renderer::new(registry);
        assert!(renderer.try_render("x", None).is_err());
        let html = renderer.render("<b>x</b>", None);
        assert!(html.starts_with(r#"<div class="render-error">"#));
        assert!(html.contains("nope"));
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn test_panic_contained() {
        let mut registry = ProfileRegistry::empty();
        registry.set_default(RendererConfig::default().with_post_hook(|_| panic!("hook bug")));
        let html = Renderer::new(registry).render("x", None);
        assert!(html.contains("render-error"));
        assert!(html.contains("hook bug"));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let text = "z".repeat(MAX_EXCERPT_CHARS * 2);
        let html = error_block(&text, &eyre!("x"));
        assert_eq!(html.matches('z').count(), MAX_EXCERPT_CHARS);
        assert!(html.contains('…'));
    }

    #[test]
    fn test_custom_typesetter() {
        let renderer = Renderer::default().with_typesetter(Tagging);
        assert_eq!(renderer.render("$x$", None), "<p><m>x</m></p>");
    }
}
