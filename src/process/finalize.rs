// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! The closing stages: nested lists, paragraphs, the last contamination
//! scrub, and resolution of every remaining token.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::{
    html_flake::{html_checkbox, html_code_block},
    process::{inline, normalize},
    recorder::{ListItem, ListKind, Recorder},
    token::{self, Family, Piece},
};

/// Fragments may nest fragments (a link around inline code); deeper
/// nesting than this is dropped.
const MAX_FRAGMENT_DEPTH: usize = 8;

const BLOCK_TAGS: &[&str] = &[
    "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<hr", "<ul", "<ol", "<table", "<blockquote", "<pre",
    "<div",
];

static EMPTY_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<p>\s*</p>\n?").unwrap());

static PARAGRAPH_AROUND_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<p>\s*(<hr>|<(?:h[1-6]|ul|ol|table|blockquote|pre|div)\b[^\n]*",
        r"</(?:h[1-6]|ul|ol|table|blockquote|pre|div)>)\s*</p>"
    ))
    .unwrap()
});

fn is_list_line(line: &str) -> bool {
    matches!(token::sole_token(line), Some(t) if t.family == Family::List)
}

/// Group runs of list tokens into nested lists. Blank lines between two
/// list lines do not end a run.
pub fn expand_lists(text: String, recorder: &mut Recorder) -> String {
    if !token::contains_family(&text, Family::List) {
        return text;
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if !is_list_line(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }
        let mut items: Vec<ListItem> = Vec::new();
        let mut end = i;
        let mut j = i;
        while j < lines.len() {
            let line = lines[j];
            if let Some(t) = token::sole_token(line).filter(|t| t.family == Family::List) {
                if let Some(item) = recorder.lists.get(t.index) {
                    items.push(item.clone());
                }
                end = j;
            } else if !line.trim().is_empty() {
                break;
            }
            j += 1;
        }
        out.push(render_list(&items, recorder));
        i = end + 1;
    }
    out.join("\n")
}

struct OpenList {
    level: usize,
    ordered: bool,
}

fn open_list(item: &ListItem) -> String {
    match (item.kind, item.ordinal) {
        (ListKind::Ordered, Some(n)) if n != 1 => format!(r#"<ol start="{n}">"#),
        (ListKind::Ordered, _) => "<ol>".to_string(),
        (ListKind::Task { .. }, _) => r#"<ul class="contains-task-list">"#.to_string(),
        (ListKind::Unordered, _) => "<ul>".to_string(),
    }
}

fn close_list(list: &OpenList) -> &'static str {
    match list.ordered {
        true => "</ol>",
        false => "</ul>",
    }
}

fn item_html(item: &ListItem, recorder: &mut Recorder) -> String {
    let content = inline::format_spans(&item.content, recorder)
        .replace("  \n", "<br>")
        .replace('\n', " ");
    match item.kind {
        ListKind::Task { checked } => {
            format!(r#"<li class="task-list-item">{}{}"#, html_checkbox(checked), content)
        }
        _ => format!("<li>{}", content),
    }
}

/// Walk the flat items with a stack of open lists keyed by level: a deeper
/// item opens a list inside the current item, a shallower one closes back
/// down, a sibling closes and reopens `<li>`.
pub fn render_list(items: &[ListItem], recorder: &mut Recorder) -> String {
    let mut html = String::new();
    let mut stack: Vec<OpenList> = Vec::new();
    for item in items {
        let ordered = item.kind.is_ordered();
        while stack.last().is_some_and(|top| top.level > item.level) {
            if let Some(top) = stack.pop() {
                html.push_str("</li>");
                html.push_str(close_list(&top));
            }
        }
        match stack.last() {
            Some(top) if top.level == item.level && top.ordered == ordered => html.push_str("</li>"),
            Some(top) if top.level == item.level => {
                html.push_str("</li>");
                html.push_str(close_list(top));
                stack.pop();
                html.push_str(&open_list(item));
                stack.push(OpenList { level: item.level, ordered });
            }
            _ => {
                html.push_str(&open_list(item));
                stack.push(OpenList { level: item.level, ordered });
            }
        }
        html.push_str(&item_html(item, recorder));
    }
    while let Some(top) = stack.pop() {
        html.push_str("</li>");
        html.push_str(close_list(&top));
    }
    html
}

fn is_block_line(line: &str, recorder: &Recorder) -> bool {
    let line = line.trim();
    match token::sole_token(line) {
        Some(t) => recorder.is_block(t),
        None => BLOCK_TAGS.iter().any(|tag| {
            line.strip_prefix(tag)
                .is_some_and(|rest| rest.starts_with(['>', ' ']))
        }),
    }
}

fn paragraph(lines: &[&str]) -> String {
    let mut html = String::from("<p>");
    for (n, line) in lines.iter().enumerate() {
        let last = n + 1 == lines.len();
        if !last && line.ends_with("  ") {
            html.push_str(line.trim());
            html.push_str("<br>\n");
        } else {
            html.push_str(line.trim());
            if !last {
                html.push('\n');
            }
        }
    }
    html.push_str("</p>");
    html
}

/// Blank lines separate paragraphs and a trailing double space breaks a
/// line. Block elements stay outside paragraphs.
pub fn paragraphs(text: String, recorder: &mut Recorder) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if line.trim().is_empty() {
            if !pending.is_empty() {
                out.push(paragraph(&pending));
                pending.clear();
            }
        } else if is_block_line(line, recorder) {
            if !pending.is_empty() {
                out.push(paragraph(&pending));
                pending.clear();
            }
            out.push(line.trim().to_string());
        } else {
            pending.push(line);
        }
    }
    if !pending.is_empty() {
        out.push(paragraph(&pending));
    }
    unwrap_block_paragraphs(&out.join("\n"))
}

/// Remove empty paragraphs and paragraphs wrapped around a single block
/// element until nothing changes.
pub fn unwrap_block_paragraphs(html: &str) -> String {
    let mut current = html.to_string();
    for _ in 0..normalize::MAX_SCRUB_PASSES {
        let next = EMPTY_PARAGRAPH.replace_all(&current, "");
        let next = PARAGRAPH_AROUND_BLOCK.replace_all(&next, "$1").into_owned();
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
    log::debug!("paragraph cleanup hit its pass limit");
    current
}

pub fn scrub(text: String, _recorder: &mut Recorder) -> String {
    normalize::scrub_contamination(&text)
}

/// Single pass putting code blocks and fragments in place. Tokens of any
/// other family, tokens without a stored block and lone sentinels are
/// deleted.
pub fn resolve_tokens(text: String, recorder: &mut Recorder) -> String {
    resolve(&text, recorder, 0).trim().to_string()
}

fn resolve(text: &str, recorder: &Recorder, depth: usize) -> String {
    if !token::contains_any(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for piece in token::pieces(text) {
        match piece {
            Piece::Text(s) => out.push_str(s),
            Piece::Stray(_) => {}
            Piece::Token(t) => match t.family {
                Family::Code => match recorder.code.get(t.index) {
                    Some(block) => out.push_str(&html_code_block(block.language.as_deref(), &block.content)),
                    None => log::debug!("dropping unknown token {:?}", t),
                },
                Family::Fragment if depth < MAX_FRAGMENT_DEPTH => match recorder.fragments.get(t.index) {
                    Some(fragment) => out.push_str(&resolve(&fragment.html, recorder, depth + 1)),
                    None => log::debug!("dropping unknown token {:?}", t),
                },
                _ => log::debug!("dropping unresolved token {:?}", t),
            },
        }
    }
    out
}
