// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

//! The math typesetting engine seam.

use eyre::{bail, eyre};
use pulldown_cmark_escape::escape_html;

use crate::config::TypesetOptions;

/// Substring present in every unit produced by the built-in engine. Text
/// containing it has already been typeset.
pub const OUTPUT_MARKER: &str = "class=\"katex";

/// Converts math source to presentation markup. Implementations may fail on
/// malformed source; callers are expected to contain the failure.
pub trait Typesetter {
    fn typeset(&self, source: &str, display: bool, options: &TypesetOptions)
        -> eyre::Result<String>;

    /// Marker identifying this engine's output.
    fn output_marker(&self) -> &str {
        OUTPUT_MARKER
    }
}

/// Emits KaTeX-ready elements carrying the escaped source; the glyphs are
/// drawn client side by the math auto-render script. Source is checked for
/// well-formed braces, `\left`/`\right` pairs and environments first.
#[derive(Debug, Default, Clone, Copy)]
pub struct KatexPassthrough;

impl Typesetter for KatexPassthrough {
    fn typeset(
        &self,
        source: &str,
        display: bool,
        options: &TypesetOptions,
    ) -> eyre::Result<String> {
        let source = expand_macros(source.trim(), options);
        if options.throw_on_error {
            check_well_formed(&source)?;
        }

        let mut escaped = String::with_capacity(source.len());
        escape_html(&mut escaped, &source).map_err(|_| eyre!("failed to escape math source"))?;

        Ok(if display {
            format!(
                r#"<span class="katex-display"><span class="katex" data-display="true">{escaped}</span></span>"#
            )
        } else {
            format!(r#"<span class="katex" data-display="false">{escaped}</span>"#)
        })
    }
}

fn expand_macros(source: &str, options: &TypesetOptions) -> String {
    let mut source = source.to_string();
    for (name, expansion) in &options.macros {
        let name = name.trim_start_matches('\\');
        if name.is_empty() {
            continue;
        }
        let needle = format!("\\{name}");
        let mut out = String::with_capacity(source.len());
        let mut rest = source.as_str();
        while let Some(pos) = rest.find(&needle) {
            let after = &rest[pos + needle.len()..];
            out.push_str(&rest[..pos]);
            if after.starts_with(|c: char| c.is_ascii_alphabetic()) {
                out.push_str(&needle);
            } else {
                out.push_str(expansion);
            }
            rest = after;
        }
        out.push_str(rest);
        source = out;
    }
    source
}

/// Check that braces nest, `\left`/`\right` pair up, and `\begin`/`\end`
/// environments close in order.
pub fn check_well_formed(source: &str) -> eyre::Result<()> {
    if source.trim().is_empty() {
        bail!("empty math expression");
    }

    let mut depth: i64 = 0;
    let mut lefts: i64 = 0;
    let mut environments: Vec<String> = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let name_len = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_alphabetic())
                    .count();
                if name_len == 0 {
                    // escaped symbol such as `\{` or `\\`
                    i += 2;
                    continue;
                }
                let name = &source[i + 1..i + 1 + name_len];
                i += 1 + name_len;
                match name {
                    "left" => lefts += 1,
                    "right" => {
                        lefts -= 1;
                        if lefts < 0 {
                            bail!("`\\right` without matching `\\left`");
                        }
                    }
                    "begin" | "end" => {
                        let env = braced_argument(&source[i..])
                            .ok_or_else(|| eyre!("`\\{name}` without an environment name"))?;
                        i += env.len() + 2;
                        if name == "begin" {
                            environments.push(env.to_string());
                        } else if environments.pop().as_deref() != Some(env) {
                            bail!("`\\end{{{env}}}` does not close the open environment");
                        }
                    }
                    _ => {}
                }
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    bail!("unexpected `}}`");
                }
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 {
        bail!("expected `}}` to close {depth} open group(s)");
    }
    if lefts != 0 {
        bail!("`\\left` without matching `\\right`");
    }
    if let Some(env) = environments.pop() {
        bail!("environment `{env}` is never closed");
    }
    Ok(())
}

/// The content of a `{...}` group at the start of `s` (after optional spaces
/// are *not* skipped), without nested groups.
fn braced_argument(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('{')?;
    let end = rest.find(['}', '{'])?;
    rest[end..].starts_with('}').then(|| &rest[..end])
}
