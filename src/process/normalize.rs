// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! Idempotent rewrites that strip provider artifacts and repair common
//! LaTeX misspellings.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

use crate::recorder::Recorder;

/// Upper bound for every fixed-point loop in this module.
pub const MAX_SCRUB_PASSES: usize = 5;

const MATHML_ELEMENTS: &str = "math|semantics|annotation|annotation-xml|mrow|mi|mo|mn|ms|mtext|mspace|msup|msub|msubsup|mfrac|msqrt|mroot|mover|munder|munderover|mtable|mtr|mtd|mstyle|mpadded|mphantom|menclose|mfenced";

/// Command names recognized by the backslash repairs.
const KNOWN_COMMANDS: &str = "frac|dfrac|tfrac|sqrt|sum|prod|int|iint|oint|lim|log|ln|sin|cos|tan|cot|sec|csc|exp|alpha|beta|gamma|delta|epsilon|varepsilon|theta|lambda|mu|sigma|omega|phi|varphi|pi|rho|tau|Delta|Gamma|Sigma|Omega|Lambda|Theta|Phi|Pi|infty|partial|nabla|cdot|cdots|ldots|times|div|pm|mp|leq|geq|neq|le|ge|ne|approx|equiv|sim|in|notin|subset|subseteq|cup|cap|forall|exists|to|rightarrow|leftarrow|Rightarrow|Leftrightarrow|mathbb|mathbf|mathrm|mathcal|text|textbf|boxed|left|right|begin|end|hat|bar|vec|overline|underline|binom|quad|qquad";

/// Commands repaired when a provider drops their backslash, e.g. `frac{`.
const BARE_BRACED_COMMANDS: &str =
    "frac|dfrac|tfrac|sqrt|boxed|mathbb|mathbf|mathrm|mathcal|text|textbf|overline|underline|hat|vec|binom";

/// Operators repaired when dropped backslash is followed by a subscript or
/// limit marker, e.g. `sum_{i=1}`.
const BARE_LIMIT_COMMANDS: &str = "sum|prod|int|oint|lim";

static SVG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<svg\b.*?</svg>|<svg\b[^>]*/>").unwrap());

static MATHML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)</?(?:{MATHML_ELEMENTS})(?:\s[^<>]*)?/?>")).unwrap()
});

/// A whole run of backslashes in front of a known command or a bracket.
static BACKSLASH_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(\\+)((?:{KNOWN_COMMANDS})\b|[()\[\]{{}}])")).unwrap()
});

static BARE_BRACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(^|[^\\a-zA-Z])((?:{BARE_BRACED_COMMANDS})\{{)")).unwrap()
});

static BARE_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(^|[^\\a-zA-Z])((?:{BARE_LIMIT_COMMANDS})_)")).unwrap()
});

static BREAK_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Provider placeholders wrapped in one or more bracket pairs, such as
/// `((MDPH3))`, `{{MDPH3}}` or `[[MDPH3]]`.
static BRACKETED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<open>\(+|\{+|\[+)\s*MDPH_?\d*\s*(?<close>\)+|\}+|\]+)").unwrap()
});

/// The remaining wrapper spellings, HTML-escaped ones included.
static WRAPPED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"⟨\s*MDPH_?\d*\s*⟩|&lt;&lt;\s*MDPH_?\d*\s*&gt;&gt;|<<\s*MDPH_?\d*\s*>>|",
        r"%%\s*MDPH_?\d*\s*%%|__MDPH_?\d*__"
    ))
    .unwrap()
});

/// A bare `MDPH3` left after its wrappers were peeled off.
static BARE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bMDPH_?\d+\b").unwrap());

/// Run the artifact passes over text whose code blocks are already protected.
pub fn normalize_artifacts(text: String, _recorder: &mut Recorder) -> String {
    let text = strip_svg(&text);
    let text = unwrap_mathml(&text);
    let text = BREAK_TAG.replace_all(&text, "  \n").into_owned();
    let text = normalize_dashes(&text);
    let text = repair_latex(&text);
    scrub_contamination(&text)
}

pub fn strip_svg(s: &str) -> String {
    SVG.replace_all(s, "").into_owned()
}

/// Drop MathML tags, keeping their text content.
pub fn unwrap_mathml(s: &str) -> String {
    MATHML_TAG.replace_all(s, "").into_owned()
}

/// Map the Unicode dashes and minus sign to ASCII hyphen.
pub fn normalize_dashes(s: &str) -> String {
    s.replace(['\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2212}', '\u{FE63}', '\u{FF0D}'], "-")
}

/// Collapse doubled backslashes before known commands and brackets, and
/// restore the backslash of known commands that lost it.
pub fn repair_latex(s: &str) -> String {
    let repair = |caps: &Captures| format!("{}\\{}", &caps[1], &caps[2]);
    let mut current = collapse_doubled_backslashes(s);
    for _ in 0..MAX_SCRUB_PASSES {
        let next = BARE_BRACED.replace_all(&current, repair);
        let next = BARE_LIMIT.replace_all(&next, repair).into_owned();
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Only a run of exactly two backslashes is collapsed. Longer runs carry a
/// row break such as `1 \\\alpha` and stay as written.
fn collapse_doubled_backslashes(s: &str) -> String {
    BACKSLASH_RUN
        .replace_all(s, |caps: &Captures| match caps[1].len() {
            2 => format!("\\{}", &caps[2]),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Remove every known contamination spelling. Peeling an outer wrapper may
/// expose an inner one, so this runs to a fixed point within
/// [`MAX_SCRUB_PASSES`].
pub fn scrub_contamination(s: &str) -> String {
    if !s.contains("MDPH") {
        return s.to_string();
    }
    let mut current = s.to_string();
    for pass in 0..MAX_SCRUB_PASSES {
        let next = BRACKETED_PLACEHOLDER.replace_all(&current, unwrap_balanced);
        let next = WRAPPED_PLACEHOLDER.replace_all(&next, "");
        let next = BARE_PLACEHOLDER.replace_all(&next, "").into_owned();
        if next.len() == current.len() {
            return next;
        }
        current = next;
        if pass + 1 == MAX_SCRUB_PASSES {
            log::debug!("contamination scrub hit its pass limit");
        }
    }
    current
}

/// Drop the placeholder with as many wrapper pairs as balance; unmatched
/// brackets belong to the surrounding text.
fn unwrap_balanced(caps: &Captures) -> String {
    let open = &caps["open"];
    let close = &caps["close"];
    let matching = |o: char, c: char| matches!((o, c), ('(', ')') | ('{', '}') | ('[', ']'));
    let (o, c) = (open.chars().next(), close.chars().next());
    if !o.zip(c).is_some_and(|(o, c)| matching(o, c)) {
        return caps[0].to_string();
    }
    let pairs = open.len().min(close.len());
    format!("{}{}", &open[pairs..], &close[pairs..])
}
