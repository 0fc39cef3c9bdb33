// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use itertools::Itertools;
use pulldown_cmark_escape::{escape_href, escape_html};

use crate::{html, token};

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_html(&mut out, s).unwrap_or_default();
    out
}

pub fn escape_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    escape_href(&mut out, s).unwrap_or_default();
    out
}

/// Keep only characters that are safe inside a `language-*` class.
fn language_class(language: &str) -> String {
    language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.'))
        .collect()
}

/// Code text with the token sentinels written as character references, so
/// the page shows them exactly while no raw sentinel reaches the output.
fn escape_code(content: &str) -> String {
    escape(content)
        .replace(token::OPEN, "&#xE000;")
        .replace(token::CLOSE, "&#xE001;")
}

pub fn html_code_block(language: Option<&str>, content: &str) -> String {
    let content = escape_code(content);
    match language.map(language_class).filter(|l| !l.is_empty()) {
        Some(language) => html!(pre => (html!(code class = format!("language-{language}") => {content}))),
        None => html!(pre => (html!(code => {content}))),
    }
}

/// `content` must already be escaped.
pub fn html_inline_code(content: &str) -> String {
    html!(code => {content})
}

/// Monospace rendition of math that failed to typeset, showing the
/// untouched source.
pub fn html_math_fallback(raw: &str, display: bool, color: &str, message: &str) -> String {
    let raw = escape(raw);
    if display {
        html!(span class = "math-fallback math-fallback-display", title = {message},
          style = format!("display: block; color: {color}") => (html!(code => {raw})))
    } else {
        html!(code class = "math-fallback math-fallback-inline", title = {message},
          style = format!("color: {color}") => {raw})
    }
}

pub fn html_error_block(message: &str, excerpt: &str) -> String {
    html!(div class = "render-error" =>
      (html!(p class = "render-error-message" => (escape(message))))
      (html!(pre => (escape(excerpt)))))
}

/// `href` is an already validated URL; `text` is HTML.
pub fn html_link(href: &str, title: Option<&str>, text: &str) -> String {
    let href = escape_url(href);
    match title {
        Some(title) => format!(r#"<a href="{}" title="{}">{}</a>"#, href, escape(title), text),
        None => format!(r#"<a href="{}">{}</a>"#, href, text),
    }
}

pub fn html_image(src: &str, alt: &str, title: Option<&str>) -> String {
    let src = escape_url(src);
    let alt = escape(alt);
    match title {
        Some(title) => format!(r#"<img src="{}" alt="{}" title="{}">"#, src, alt, escape(title)),
        None => format!(r#"<img src="{}" alt="{}">"#, src, alt),
    }
}

pub fn html_checkbox(checked: bool) -> &'static str {
    match checked {
        true => r#"<input type="checkbox" disabled checked> "#,
        false => r#"<input type="checkbox" disabled> "#,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn style(&self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("text-align: left"),
            Align::Center => Some("text-align: center"),
            Align::Right => Some("text-align: right"),
        }
    }
}

fn html_table_cell(tag: &str, align: Align, content: &str) -> String {
    match align.style() {
        Some(style) => format!(r#"<{tag} style="{style}">{content}</{tag}>"#),
        None => format!("<{tag}>{content}</{tag}>"),
    }
}

fn html_table_row(tag: &str, aligns: &[Align], cells: &[String]) -> String {
    let cells = (0..aligns.len())
        .map(|i| {
            let content = cells.get(i).map_or("", String::as_str);
            html_table_cell(tag, aligns[i], content)
        })
        .join("");
    html!(tr => {cells})
}

/// Cells are HTML. Rows are padded or cut to the header width.
pub fn html_table(aligns: &[Align], header: &[String], rows: &[Vec<String>]) -> String {
    let head = html!(thead => (html_table_row("th", aligns, header)));
    if rows.is_empty() {
        return html!(table => {head});
    }
    let body = rows.iter().map(|row| html_table_row("td", aligns, row)).join("");
    html!(table => {head} (html!(tbody => {body})))
}

pub fn html_doc(body: &str, title: &str) -> String {
    let doc_type = "<!DOCTYPE html>";
    let html = html!(html lang = "en-US" =>
      (html!(head => r#"
<meta http-equiv="Content-Type" content="text/html; charset=utf-8">
<meta name="viewport" content="width=device-width">
"#
        (html!(title => (escape(title))))
        (html_import_math())
        (html_import_highlight())
        (html_css())))
      (html!(body => (html!(article class = "chatmark" => {body})))));
    format!("{}\n{}", doc_type, &html)
}

pub fn html_css() -> String {
    html!(style => (html_main_style()))
}

pub fn html_import_math() -> &'static str {
    include_str!("include/import-math.html")
}

pub fn html_import_highlight() -> &'static str {
    include_str!("include/import-highlight.html")
}

pub fn html_main_style() -> &'static str {
    include_str!("include/main.css")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_block_escapes() {
        assert_eq!(
            html_code_block(Some("js"), "a < b && $$1$$"),
            r#"<pre><code class="language-js">a &lt; b &amp;&amp; $$1$$</code></pre>"#
        );
        assert_eq!(
            html_code_block(Some("\"><script>"), "x"),
            r#"<pre><code class="language-script">x</code></pre>"#
        );
        assert_eq!(html_code_block(None, ""), "<pre><code></code></pre>");
    }

    #[test]
    fn test_code_block_encodes_sentinels() {
        let html = html_code_block(None, "x \u{e000}C0\u{e001} y");
        assert_eq!(html, "<pre><code>x &#xE000;C0&#xE001; y</code></pre>");
    }

    #[test]
    fn test_math_fallback() {
        let html = html_math_fallback(r"\frac{1}{0", true, "#cc0000", "unclosed group");
        assert!(html.starts_with(r#"<span class="math-fallback math-fallback-display""#));
        assert!(html.contains(r#"style="display: block; color: #cc0000""#));
        assert!(html.ends_with(r"<code>\frac{1}{0</code></span>"));
        let html = html_math_fallback("a<b", false, "#cc0000", "");
        assert!(html.contains("math-fallback-inline"));
        assert!(html.contains("a&lt;b"));
    }

    #[test]
    fn test_table() {
        let html = html_table(
            &[Align::Left, Align::Right],
            &["a".to_string(), "b".to_string()],
            &[vec!["1".to_string()]],
        );
        assert_eq!(
            html,
            concat!(
                r#"<table><thead><tr><th style="text-align: left">a</th><th style="text-align: right">b</th></tr></thead>"#,
                r#"<tbody><tr><td style="text-align: left">1</td><td style="text-align: right"></td></tr></tbody></table>"#
            )
        );
    }

    #[test]
    fn test_doc_imports_assets() {
        let doc = html_doc("<p>x</p>", "t");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("katex"));
        assert!(doc.contains(r#"<article class="chatmark"><p>x</p></article>"#));
    }
}
