// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use chatmark::{
    config::{parse_config, RendererConfig},
    process::{extract, normalize},
    recorder::Recorder,
    render, token, KatexPassthrough, ProfileRegistry, Renderer,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::{Duration, Instant};

fn assert_clean(html: &str) {
    assert!(!html.contains([token::OPEN, token::CLOSE]), "token leaked: {html:?}");
    assert!(!html.contains("MDPH"), "contamination leaked: {html:?}");
}

#[rstest]
#[case("```js\nconst x = $$1$$;\n```")]
#[case("before\n\n```\n((MDPH3)) and \\(x\\)\n```\n\nafter")]
#[case("~~~python\n\n  print('$')\n\n~~~\ntext `inline` here\n```\n```")]
fn test_code_blocks_round_trip(#[case] text: &str) {
    let config = RendererConfig::default();
    let mut recorder = Recorder::new(&config, &KatexPassthrough);
    let extracted = extract::extract_code_blocks(text.to_string(), &mut recorder);
    assert!(!recorder.code.is_empty());
    assert_eq!(extract::restore_code_raw(&extracted, &recorder.code), text);
}

#[rstest]
#[case("answer is ((MDPH3)) 42")]
#[case("{{MDPH0}} ((( MDPH_12 ))) [[MDPH7]] &lt;&lt;MDPH1&gt;&gt; __MDPH2__ MDPH9")]
#[case("((({{MDPH4}})))")]
fn test_scrub_reaches_zero(#[case] text: &str) {
    let once = normalize::scrub_contamination(text);
    assert!(!once.contains("MDPH"), "{once:?}");
    assert_eq!(normalize::scrub_contamination(&once), once);
}

#[test]
fn test_scrub_on_clean_text_is_noop() {
    let html = render("plain *text* with (a + b) and `code`", None);
    assert_eq!(normalize::scrub_contamination(&html), html);
}

#[test]
fn test_math_inside_code_is_literal() {
    let html = render("```js\nconst x = $$1$$;\n```", None);
    assert!(html.starts_with(r#"<pre><code class="language-js">"#), "{html}");
    assert!(html.contains("$$1$$"));
    assert!(!html.contains("katex"));
    assert_clean(&html);
}

#[test]
fn test_dual_inline_math() {
    let html = render("Area: $\\pi r^2$ and \\(\\frac{1}{2}\\).", None);
    assert_eq!(html.matches(r#"class="katex""#).count(), 2, "{html}");
    assert!(html.starts_with("<p>Area: <span"));
    assert!(html.contains("</span> and <span"));
    assert!(html.ends_with("</span>.</p>"));
    assert!(!html.contains('$'));
    assert!(!html.contains("\\("));
    assert!(!html.contains("\\)"));
    assert_clean(&html);
}

#[test]
fn test_list_nesting_balance() {
    let html = render("- a\n  - b\n- c", None);
    assert_eq!(html.matches("<ul>").count(), 2);
    assert_eq!(html.matches("</ul>").count(), 2);
    assert_eq!(html.matches("<li>").count(), 3);
    assert_eq!(html.matches("</li>").count(), 3);
    assert_eq!(html, "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>");
}

#[test]
fn test_math_inside_list_items() {
    let html = render("1. first $x^2$\n2. then **bold** and \\(y\\)", None);
    assert!(html.starts_with("<ol><li>first <span"));
    assert_eq!(html.matches(r#"class="katex""#).count(), 2, "{html}");
    assert!(html.contains("<strong>bold</strong>"));
    assert_clean(&html);
}

#[test]
fn test_graceful_math_failure() {
    let html = render("\\[ \\frac{1}{0 \\]", None);
    assert!(html.contains("math-fallback"), "{html}");
    assert!(html.contains("\\frac{1}{0"));
    assert_clean(&html);
}

#[test]
fn test_contamination_scrubbed() {
    let html = render("answer is ((MDPH3)) 42", None);
    assert!(html.contains("42"));
    assert_clean(&html);
}

#[test]
fn test_unterminated_math_left_alone() {
    let html = render("costs $5 today", None);
    assert_eq!(html, "<p>costs $5 today</p>");
}

#[test]
fn test_mixed_document_has_no_leaks() {
    let text = concat!(
        "# Result\n\n",
        "We find d/dx(x^2) = 2x, see [docs](https://example.com \"Docs\").\n\n",
        "| n | n^2 |\n|:--|--:|\n| 2 | $4$ |\n\n",
        "- [x] done with (a + b)^2\n- [ ] todo\n\n",
        "> quoted <b>html</b>\n\n",
        "---\n\n",
        "$$\n\\sum_{i=1}^n i\n$$\n\n",
        "```rust\nfn main() { println!(\"{}\", \"<tag>\"); }\n```\n",
    );
    let html = render(text, Some("gpt-4o"));
    assert!(html.contains("<h1>Result</h1>"));
    assert!(html.contains(r#"<a href="https://example.com""#));
    assert!(html.contains("<table>"));
    assert!(html.contains(r#"<ul class="contains-task-list">"#));
    assert!(html.contains("<blockquote>"));
    assert!(html.contains("&lt;b&gt;html&lt;/b&gt;"));
    assert!(html.contains("<hr>"));
    assert!(html.contains(r#"class="katex-display""#));
    assert!(html.contains("&lt;tag&gt;"));
    assert!(!html.contains("<b>"));
    assert_clean(&html);
}

#[test]
fn test_script_links_are_not_emitted() {
    let html = render("[click](javascript:alert) ![pic](javascript:void)", None);
    assert_eq!(html, "<p>click pic</p>");
    assert_clean(&html);
}

#[test]
fn test_profile_from_config_file() {
    let mut registry = ProfileRegistry::builtin().unwrap();
    registry.merge(
        parse_config(
            r#"
            [profiles.strict]
            inline = [{ left = "\\(", right = "\\)" }]
            "#,
        )
        .unwrap(),
    );
    let renderer = Renderer::new(registry);
    let html = renderer.render("$a$ and \\(b\\)", Some("strict-v2"));
    assert_eq!(html.matches(r#"class="katex""#).count(), 1, "{html}");
    assert!(html.contains("$a$"));
}

#[test]
fn test_rendering_from_many_threads() {
    let renderer = Renderer::default();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let renderer = &renderer;
                scope.spawn(move || renderer.render(&format!("- item {n} $x_{n}$"), None))
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            let html = handle.join().unwrap();
            assert!(html.contains(&format!("item {n}")));
            assert_clean(&html);
        }
    });
}

#[test]
fn test_bracket_and_dollar_floods_finish() {
    let started = Instant::now();
    let html = render(&"$a ".repeat(5_000), None);
    assert!(html.starts_with("<p>$a $a"), "{}", &html[..40]);
    assert!(!html.contains("katex"));
    assert_clean(&html);

    let html = render(&"(".repeat(20_000), None);
    assert!(html.contains(&"(".repeat(100)));
    assert_clean(&html);
    assert!(started.elapsed() < Duration::from_secs(60), "took {:?}", started.elapsed());
}

#[test]
fn test_leading_variable_is_math() {
    let html = render("Expand (a + b) now", None);
    assert_eq!(html, r#"<p>Expand <span class="katex" data-display="false">a + b</span> now</p>"#);
}

#[test]
fn test_failed_display_math_inside_paragraph() {
    let html = render("see $$\\frac{1}{0$$ here", None);
    assert!(html.starts_with(r#"<p>see <span class="math-fallback math-fallback-display""#), "{html}");
    assert!(html.ends_with("</span> here</p>"), "{html}");
    assert!(!html.contains("<div"));
    assert_clean(&html);
}

#[test]
fn test_matrix_row_break_before_command() {
    let html = render("$$\\begin{matrix} 1 \\\\\\alpha \\end{matrix}$$", None);
    assert!(html.contains(r"1 \\\alpha"), "{html}");
}

#[test]
fn test_sentinels_in_code_are_encoded() {
    let html = render("```\nx \u{e000}C0\u{e001} y\n```", None);
    assert_eq!(html, "<pre><code>x &#xE000;C0&#xE001; y</code></pre>");
    assert_clean(&html);
}

#[test]
fn test_code_block_inside_list_item() {
    let html = render("1. x\n   ```py\n   a = 1\n   ```\n2. y", None);
    assert_eq!(html.matches("<ol>").count(), 1, "{html}");
    assert!(
        html.contains(r#"<li>x <pre><code class="language-py">a = 1</code></pre></li><li>y</li>"#),
        "{html}"
    );
    assert_clean(&html);
}
