// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Turns list lines into level-tagged list tokens. Grouping into nested
//! lists happens after inline formatting, see [`super::finalize::expand_lists`].

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::{
    process::{implicit_math, inline},
    recorder::{ListItem, ListKind, Recorder},
    token::{self, Family},
};

const TAB_WIDTH: usize = 4;

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?<indent>[ \t]*)(?:(?<bullet>[-*+•◦▪‣])|(?<number>\d{1,9})[.)])[ \t]+",
        r"(?:\[(?<task>[ xX])\](?:[ \t]+|$))?(?<content>.*)$"
    ))
    .unwrap()
});

/// Width of the leading whitespace of `line`.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// `---`, `* * *` and `___` are rules, not list items.
pub fn is_horizontal_rule(line: &str) -> bool {
    let marks: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    marks.len() >= 3
        && matches!(marks[0], '-' | '*' | '_')
        && marks.iter().all(|c| *c == marks[0])
}

fn parse_item(line: &str) -> Option<(ListKind, Option<u64>, usize, String)> {
    if is_horizontal_rule(line) {
        return None;
    }
    let caps = LIST_ITEM.captures(line)?;
    let level = indent_width(&caps["indent"]);
    let content = caps["content"].trim_end().to_string();
    let ordinal = caps.name("number").and_then(|n| n.as_str().parse().ok());
    let kind = match (caps.name("task"), ordinal) {
        (Some(mark), None) => ListKind::Task {
            checked: mark.as_str() != " ",
        },
        (_, Some(_)) => ListKind::Ordered,
        (None, None) => ListKind::Unordered,
    };
    let content = match (caps.name("task"), kind) {
        // an ordered `1. [x]` keeps its brackets as text
        (Some(mark), ListKind::Ordered) => format!("[{}] {}", mark.as_str(), content),
        _ => content,
    };
    Some((kind, ordinal, level, content))
}

/// Replace every list line with a list token. Indented lines directly
/// following an item are folded into it, indented code blocks included.
pub fn structure_lists(text: String, recorder: &mut Recorder) -> String {
    if !recorder.config.rules.process_lists {
        return text;
    }

    let mut out: Vec<String> = Vec::new();
    let mut open: Option<ListItem> = None;
    for line in text.split('\n') {
        if let Some((kind, ordinal, level, content)) = parse_item(line) {
            flush(&mut open, &mut out, recorder);
            open = Some(ListItem { level, kind, ordinal, content });
            continue;
        }
        if let Some(item) = open.as_mut() {
            if !line.trim().is_empty() && indent_width(line) > item.level {
                let separator = match token::sole_token(line) {
                    // an indented code block belongs to the item
                    Some(t) if t.family == Family::Code => Some("\n"),
                    Some(t) if recorder.is_block(t) => None,
                    _ => Some("  \n"),
                };
                if let Some(separator) = separator {
                    item.content.push_str(separator);
                    item.content.push_str(line.trim());
                    continue;
                }
            }
        }
        flush(&mut open, &mut out, recorder);
        out.push(line.to_string());
    }
    flush(&mut open, &mut out, recorder);
    out.join("\n")
}

fn flush(open: &mut Option<ListItem>, out: &mut Vec<String>, recorder: &mut Recorder) {
    if let Some(mut item) = open.take() {
        item.content = format_item_content(&item.content, recorder);
        out.push(recorder.push_list(item).to_string());
    }
}

/// Implicit math, inline code and emphasis for one item, with the inline
/// math tokens already present moved out of the way meanwhile.
fn format_item_content(content: &str, recorder: &mut Recorder) -> String {
    let shielded = token::replace_family(content, Family::Inline, |i| {
        Some(recorder.push_shield(i).to_string())
    });

    let mut content = shielded;
    if recorder.config.rules.implicit_math {
        content = implicit_math::promote_derivatives(&content, recorder);
        content = implicit_math::promote_bare_spans(&content, recorder);
    }
    content = inline::format_code_spans(&content, recorder);
    if recorder.config.rules.process_bold_italic {
        content = inline::format_emphasis(&content);
    }

    let shielded = &recorder.shielded;
    token::replace_family(&content, Family::Shield, |i| {
        shielded
            .get(i)
            .map(|inline| token::Token::new(Family::Inline, *inline).to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::RendererConfig, engine::KatexPassthrough, recorder::MathBlock, token::Token};
    use rstest::rstest;

    #[rstest]
    #[case("- item", false)]
    #[case("---", true)]
    #[case("* * *", true)]
    #[case("___", true)]
    #[case("--", false)]
    #[case("-*-", false)]
    fn test_horizontal_rule(#[case] line: &str, #[case] expected: bool) {
        assert_eq!(is_horizontal_rule(line), expected);
    }

    #[test]
    fn test_indent_width() {
        assert_eq!(indent_width("\t  x"), 6);
        assert_eq!(indent_width("x"), 0);
    }

    #[test]
    fn test_parse_item() {
        assert_eq!(
            parse_item("  3) third"),
            Some((ListKind::Ordered, Some(3), 2, "third".to_string()))
        );
        assert_eq!(
            parse_item("- [x] done"),
            Some((ListKind::Task { checked: true }, None, 0, "done".to_string()))
        );
        assert_eq!(
            parse_item("1. [ ] keep"),
            Some((ListKind::Ordered, Some(1), 0, "[ ] keep".to_string()))
        );
        assert_eq!(parse_item("• dot"), Some((ListKind::Unordered, None, 0, "dot".to_string())));
        assert_eq!(parse_item("-not an item"), None);
        assert_eq!(parse_item("* * *"), None);
    }

    #[test]
    fn test_items_become_tokens() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let out = structure_lists("intro\n- a\n  continued\n- **b**\nafter".to_string(), &mut recorder);

        let first = Token::new(Family::List, 0);
        let second = Token::new(Family::List, 1);
        assert_eq!(out, format!("intro\n{first}\n{second}\nafter"));
        assert_eq!(recorder.lists[0].content, "a  \ncontinued");
        assert_eq!(recorder.lists[1].content, "<strong>b</strong>");
    }

    #[test]
    fn test_indented_code_stays_in_item() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let code = Token::new(Family::Code, 0);
        let out = structure_lists(format!("1. x\n   {code}\n2. y\n{code}"), &mut recorder);

        let first = Token::new(Family::List, 0);
        let second = Token::new(Family::List, 1);
        assert_eq!(out, format!("{first}\n{second}\n{code}"));
        assert_eq!(recorder.lists[0].content, format!("x\n{code}"));
    }

    #[test]
    fn test_inline_math_survives_item_formatting() {
        let config = RendererConfig::default();
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let math = recorder.push_math(MathBlock {
            raw: "$x$".to_string(),
            source: "x".to_string(),
            display: false,
        });
        structure_lists(format!("- see {math} *now*"), &mut recorder);
        assert_eq!(recorder.lists[0].content, format!("see {math} <em>now</em>"));
    }

    #[test]
    fn test_lists_disabled() {
        let mut config = RendererConfig::default();
        config.rules.process_lists = false;
        let mut recorder = Recorder::new(&config, &KatexPassthrough);
        let text = "- a\n- b".to_string();
        assert_eq!(structure_lists(text.clone(), &mut recorder), text);
        assert!(recorder.lists.is_empty());
    }
}
