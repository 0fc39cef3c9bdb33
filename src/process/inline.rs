// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Markdown spans and line blocks over escaped text: inline code, links,
//! images, emphasis, strikethrough, headers, rules, blockquotes and tables.

use std::sync::LazyLock;

use itertools::Itertools;
use regex_lite::{Captures, Regex};
use url::Url;

use crate::{
    edits::Edits,
    html_flake::{self, html_image, html_inline_code, html_link, html_table, Align},
    process::{list::is_horizontal_rule, normalize::MAX_SCRUB_PASSES, typeset::typeset_unit},
    recorder::{Fragment, Recorder},
    token::{self, Family, Piece},
};

static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``(?<double>[^\n]+?)``|`(?<single>[^`\n]+)`").unwrap());

static LATEX_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\[A-Za-z]{2,}").unwrap());

/// Signs that backticked text is code even though it holds a backslash
/// command: statements, strings, paths and arrows.
static CODE_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[;"']|::|=>|->|\(\)|//|[A-Za-z]:\\|\b(?:fn|def|let|var|const|return|print|printf|echo)\b"#)
        .unwrap()
});

static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[(?<text>[^\]\n]*)\]\((?<url>[^()\s]+)(?:\s+&quot;(?<title>[^\n]*?)&quot;)?\)")
        .unwrap()
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?<text>[^\]\n]+)\]\((?<url>[^()\s]+)(?:\s+&quot;(?<title>[^\n]*?)&quot;)?\)")
        .unwrap()
});

static SPACED_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\][ \t]+\(([^()\s]+)\)").unwrap());

static UNCLOSED_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(\[[^\]\n]+\]\([^()\s]+)[ \t]*$").unwrap());

static STRONG_EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*\*([^\s*](?:[^*\n]*?[^\s*])?)\*\*\*").unwrap());

static STRONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^\s*](?:.*?[^\s*])?)\*\*|(^|[^\w])__([^\s_](?:.*?[^\s_])?)__($|[^\w])")
        .unwrap()
});

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^*\\])\*([^\s*](?:[^*\n]*?[^\s*])?)\*($|[^*])|(^|[^\w])_([^\s_](?:[^_\n]*?[^\s_])?)_($|[^\w])")
        .unwrap()
});

static STRIKETHROUGH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^\s~](?:.*?[^\s~])?)~~").unwrap());

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(?<level>#{1,6})[ \t]+(?<content>.*)$").unwrap());

static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}&gt;[ \t]?(?<content>.*)$").unwrap());

static TABLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?\s*$").unwrap());

/// The inline formatter stage.
pub fn format_markdown(text: String, recorder: &mut Recorder) -> String {
    let text = format_spans(&text, recorder);
    format_blocks(&text, recorder)
}

/// Every span-level construct, in an order where earlier results are
/// protected from later patterns.
pub fn format_spans(text: &str, recorder: &mut Recorder) -> String {
    let config = recorder.config;
    let rules = &config.rules;
    let mut text = format_code_spans(text, recorder);
    if rules.fix_broken_links {
        text = fix_broken_links(&text);
    }
    if rules.process_images {
        text = format_images(&text, recorder);
    }
    if rules.process_links {
        text = format_links(&text, recorder);
    }
    if rules.process_bold_italic {
        text = format_emphasis(&text);
    }
    if rules.process_strikethrough {
        text = STRIKETHROUGH.replace_all(&text, "<del>$1</del>").into_owned();
    }
    text
}

/// Text with every token replaced by the escaped source it stands for.
fn source_text(text: &str, recorder: &Recorder) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in token::pieces(text) {
        let t = match piece {
            Piece::Text(s) | Piece::Stray(s) => {
                out.push_str(s);
                continue;
            }
            Piece::Token(t) => t,
        };
        let raw = match t.family {
            Family::Inline => recorder.inline.get(t.index).map(|m| html_flake::escape(&m.raw)),
            Family::Display => recorder.display.get(t.index).map(|m| html_flake::escape(&m.raw)),
            Family::Shield => recorder
                .shielded
                .get(t.index)
                .and_then(|i| recorder.inline.get(*i))
                .map(|m| html_flake::escape(&m.raw)),
            Family::Derivative => recorder.derivatives.get(t.index).map(|d| html_flake::escape(&d.raw)),
            Family::Fragment => recorder.fragments.get(t.index).map(|f| f.raw.clone()),
            Family::Code | Family::List => None,
        };
        out.push_str(&raw.unwrap_or_else(|| t.to_string()));
    }
    out
}

fn looks_like_latex(code: &str) -> bool {
    LATEX_COMMAND.is_match(code) && !CODE_HINT.is_match(code)
}

/// Backtick spans become inline code, or math when they hold nothing but
/// math or read as LaTeX.
pub fn format_code_spans(text: &str, recorder: &mut Recorder) -> String {
    if !text.contains('`') {
        return text.to_string();
    }
    let mut edits = Edits::new();
    for caps in CODE_SPAN.captures_iter(text) {
        let (Some(whole), Some(content)) = (caps.get(0), caps.name("double").or(caps.name("single")))
        else {
            continue;
        };
        let content = content.as_str();
        let replacement = match token::sole_token(content) {
            Some(t) if matches!(t.family, Family::Inline | Family::Shield | Family::Display | Family::Fragment | Family::Derivative) => {
                content.trim().to_string()
            }
            _ => {
                let code = source_text(content, recorder);
                let plain = htmlize::unescape(code.trim()).to_string();
                if looks_like_latex(&plain) {
                    let raw = htmlize::unescape(whole.as_str()).to_string();
                    typeset_unit(&plain, &raw, false, recorder).to_string()
                } else {
                    let code = match caps.name("double") {
                        Some(_) => code.trim().to_string(),
                        None => code,
                    };
                    recorder
                        .push_fragment(Fragment {
                            html: html_inline_code(&code),
                            raw: whole.as_str().to_string(),
                            block: false,
                        })
                        .to_string()
                }
            }
        };
        edits.push(whole.start(), whole.end(), replacement);
    }
    edits.apply(text)
}

/// `[text] (url)` loses the space; a link missing its closing parenthesis
/// at the end of a line gets one.
pub fn fix_broken_links(text: &str) -> String {
    let text = SPACED_LINK.replace_all(text, "[$1]($2)");
    UNCLOSED_LINK.replace_all(&text, "$1)").into_owned()
}

/// Only web, mail and relative targets are emitted.
pub fn safe_url(escaped: &str) -> Option<String> {
    let target = htmlize::unescape(escaped).trim().to_string();
    if target.is_empty() || token::contains_any(&target) {
        return None;
    }
    match Url::parse(&target) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "mailto").then_some(target),
        Err(url::ParseError::RelativeUrlWithoutBase) => Some(target),
        Err(_) => None,
    }
}

fn link_parts<'c>(caps: &'c Captures) -> Option<(&'c str, &'c str, Option<String>)> {
    let text = caps.name("text")?.as_str();
    let url = caps.name("url")?.as_str();
    let title = caps.name("title").map(|t| htmlize::unescape(t.as_str()).to_string());
    Some((text, url, title))
}

pub fn format_images(text: &str, recorder: &mut Recorder) -> String {
    let mut edits = Edits::new();
    for caps in IMAGE.captures_iter(text) {
        let (Some(whole), Some((alt, url, title))) = (caps.get(0), link_parts(&caps)) else {
            continue;
        };
        let alt = htmlize::unescape(&source_text(alt, recorder)).to_string();
        let replacement = match safe_url(url) {
            Some(src) => recorder
                .push_fragment(Fragment {
                    html: html_image(&src, &alt, title.as_deref()),
                    raw: whole.as_str().to_string(),
                    block: false,
                })
                .to_string(),
            None => html_flake::escape(&alt),
        };
        edits.push(whole.start(), whole.end(), replacement);
    }
    edits.apply(text)
}

pub fn format_links(text: &str, recorder: &mut Recorder) -> String {
    let emphasis = recorder.config.rules.process_bold_italic;
    let mut edits = Edits::new();
    for caps in LINK.captures_iter(text) {
        let (Some(whole), Some((label, url, title))) = (caps.get(0), link_parts(&caps)) else {
            continue;
        };
        let label = match emphasis {
            true => format_emphasis(label),
            false => label.to_string(),
        };
        let replacement = match safe_url(url) {
            Some(href) => recorder
                .push_fragment(Fragment {
                    html: html_link(&href, title.as_deref(), &label),
                    raw: whole.as_str().to_string(),
                    block: false,
                })
                .to_string(),
            None => label,
        };
        edits.push(whole.start(), whole.end(), replacement);
    }
    edits.apply(text)
}

fn replace_to_fixed_point(text: &str, regex: &Regex, replacement: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_SCRUB_PASSES {
        let next = regex.replace_all(&current, replacement).into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Bold and italic with `*` and `_`. Patterns that consume a neighbouring
/// character run until nothing changes, so adjacent spans are all found.
pub fn format_emphasis(text: &str) -> String {
    if !text.contains(['*', '_']) {
        return text.to_string();
    }
    let text = STRONG_EMPHASIS.replace_all(text, "<strong><em>$1</em></strong>");
    let text = STRONG.replace_all(&text, |caps: &Captures| match caps.get(1) {
        Some(inner) => format!("<strong>{}</strong>", inner.as_str()),
        None => format!("{}<strong>{}</strong>{}", &caps[2], &caps[3], &caps[4]),
    });
    let mut current = text.into_owned();
    for _ in 0..MAX_SCRUB_PASSES {
        let next = EMPHASIS
            .replace_all(&current, |caps: &Captures| match caps.get(2) {
                Some(inner) => format!("{}<em>{}</em>{}", &caps[1], inner.as_str(), &caps[3]),
                None => format!("{}<em>{}</em>{}", &caps[4], &caps[5], &caps[6]),
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Headers, rules, blockquotes and tables. Every block is emitted on a
/// single line so the paragraph pass can recognize it.
pub fn format_blocks(text: &str, recorder: &Recorder) -> String {
    let rules = &recorder.config.rules;
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if rules.process_tables {
            if let Some((html, consumed)) = parse_table(&lines[i..]) {
                out.push(html);
                i += consumed;
                continue;
            }
        }
        if rules.process_blockquotes && BLOCKQUOTE.is_match(line) {
            let quoted: Vec<&str> = lines[i..]
                .iter()
                .map_while(|l| BLOCKQUOTE.captures(l).and_then(|c| c.name("content")).map(|c| c.as_str()))
                .collect();
            i += quoted.len();
            out.push(blockquote(&quoted));
            continue;
        }
        i += 1;
        if rules.process_horizontal_rules && is_horizontal_rule(line) {
            out.push("<hr>".to_string());
            continue;
        }
        if rules.process_headers {
            if let Some(caps) = HEADER.captures(line) {
                let level = caps["level"].len();
                out.push(format!("<h{level}>{}</h{level}>", header_content(&caps["content"])));
                continue;
            }
        }
        out.push(line.to_string());
    }
    out.join("\n")
}

/// Drop a closing `#` sequence, which needs a space before it.
fn header_content(content: &str) -> &str {
    let content = content.trim_end();
    let stripped = content.trim_end_matches('#');
    if stripped.is_empty() || stripped.ends_with([' ', '\t']) {
        stripped.trim_end()
    } else {
        content
    }
}

fn blockquote(lines: &[&str]) -> String {
    let paragraphs = lines
        .split(|l| l.trim().is_empty())
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut joined = String::new();
            for (n, line) in p.iter().enumerate() {
                if n > 0 {
                    joined.push_str(if p[n - 1].ends_with("  ") { "<br>" } else { " " });
                }
                joined.push_str(line.trim());
            }
            format!("<p>{joined}</p>")
        })
        .join("");
    format!("<blockquote>{paragraphs}</blockquote>")
}

/// Split a table row into trimmed cells, honouring `\|`.
fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = match line.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => line,
    };
    let mut cells = vec![String::new()];
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                if let Some(cell) = cells.last_mut() {
                    cell.push('|');
                }
            }
            '|' => cells.push(String::new()),
            c => {
                if let Some(cell) = cells.last_mut() {
                    cell.push(c);
                }
            }
        }
    }
    cells.into_iter().map(|c| c.trim().to_string()).collect()
}

fn alignment(cell: &str) -> Align {
    match (cell.starts_with(':'), cell.ends_with(':')) {
        (true, true) => Align::Center,
        (true, false) => Align::Left,
        (false, true) => Align::Right,
        (false, false) => Align::None,
    }
}

/// A table starting at `lines[0]`, with the number of lines it spans.
fn parse_table(lines: &[&str]) -> Option<(String, usize)> {
    let (header, separator) = (lines.first()?, lines.get(1)?);
    if !header.contains('|') || !separator.contains('|') || !TABLE_SEPARATOR.is_match(separator) {
        return None;
    }
    let header = split_row(header);
    let aligns: Vec<Align> = split_row(separator).iter().map(|c| alignment(c)).collect();
    if header.len() != aligns.len() {
        return None;
    }
    let rows: Vec<Vec<String>> = lines[2..]
        .iter()
        .take_while(|l| l.contains('|') && !l.trim().is_empty())
        .map(|l| split_row(l))
        .collect();
    let consumed = 2 + rows.len();
    Some((html_table(&aligns, &header, &rows), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RendererConfig, engine::KatexPassthrough};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn resolve(text: &str, recorder: &Recorder) -> String {
        let mut out = text.to_string();
        while token::contains_family(&out, Family::Fragment) {
            out = token::replace_family(&out, Family::Fragment, |i| {
                recorder.fragments.get(i).map(|f| f.html.clone())
            });
        }
        out
    }

    fn spans(text: &str) -> String {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let out = format_spans(text, &mut recorder);
        resolve(&out, &recorder)
    }

    #[rstest]
    #[case("**bold** and *it*", "<strong>bold</strong> and <em>it</em>")]
    #[case("***both***", "<strong><em>both</em></strong>")]
    #[case("__b__ _i_ snake_case_name", "<strong>b</strong> <em>i</em> snake_case_name")]
    #[case("*a* *b*", "<em>a</em> <em>b</em>")]
    #[case("**a *b* c**", "<strong>a <em>b</em> c</strong>")]
    #[case("2 * 3 * 4", "2 * 3 * 4")]
    #[case("~~gone~~", "<del>gone</del>")]
    fn test_emphasis(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(spans(input), expected);
    }

    #[test]
    fn test_inline_code_protected() {
        assert_eq!(
            spans("use `a*b*c` and ``x `y` z``"),
            "use <code>a*b*c</code> and <code>x `y` z</code>"
        );
    }

    #[test]
    fn test_inline_code_as_math() {
        let out = spans(r"the `\frac{1}{2}` ratio");
        assert!(out.contains(r#"<span class="katex" data-display="false">\frac{1}{2}</span>"#));
        assert_eq!(spans(r"path `C:\Users\me`"), r"path <code>C:\Users\me</code>");
    }

    #[test]
    fn test_links_and_images() {
        assert_eq!(
            spans("[**site**](https://example.com/a?b=1&amp;c=2)"),
            r#"<a href="https://example.com/a?b=1&amp;c=2"><strong>site</strong></a>"#
        );
        assert_eq!(
            spans("![logo](/img/logo.png &quot;Logo&quot;)"),
            r#"<img src="/img/logo.png" alt="logo" title="Logo">"#
        );
        assert_eq!(spans("[click](javascript:alert(1))"), "[click](javascript:alert(1))");
        assert_eq!(spans("[click](javascript:void)"), "click");
    }

    #[test]
    fn test_fix_broken_links() {
        assert_eq!(fix_broken_links("[a] (http://x.y)"), "[a](http://x.y)");
        assert_eq!(fix_broken_links("see [a](http://x.y\nnext"), "see [a](http://x.y)\nnext");
        assert_eq!(fix_broken_links("[a](b)"), "[a](b)");
    }

    fn blocks(text: &str) -> String {
        let config = RendererConfig::default();
        let recorder = Recorder::new(&config, &KatexPassthrough);
        format_blocks(text, &recorder)
    }

    #[test]
    fn test_headers_and_rules() {
        assert_eq!(blocks("# Title #\n## C#\n#nope"), "<h1>Title</h1>\n<h2>C#</h2>\n#nope");
        assert_eq!(blocks("a\n---\n* * *"), "a\n<hr>\n<hr>");
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            blocks("&gt; one\n&gt; two\n&gt;\n&gt; three\nafter"),
            "<blockquote><p>one two</p><p>three</p></blockquote>\nafter"
        );
    }

    #[test]
    fn test_table() {
        let out = blocks("| a | b |\n|:--|--:|\n| 1 | 2 \\| 3 |\n\nnext");
        assert_eq!(
            out,
            concat!(
                r#"<table><thead><tr><th style="text-align: left">a</th><th style="text-align: right">b</th></tr></thead>"#,
                r#"<tbody><tr><td style="text-align: left">1</td><td style="text-align: right">2 | 3</td></tr></tbody></table>"#,
                "\n\nnext"
            )
        );
        // no separator row, no table
        assert_eq!(blocks("a | b\nc | d"), "a | b\nc | d");
    }
}
