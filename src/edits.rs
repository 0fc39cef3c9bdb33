// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

/// Replacement spans collected against one source string and applied in a
/// single pass, so that earlier replacements never shift later offsets.
#[derive(Debug, Default)]
pub struct Edits {
    spans: Vec<(usize, usize, String)>,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, start: usize, end: usize, replacement: impl Into<String>) {
        self.spans.push((start, end, replacement.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Apply all spans to `source`. Spans overlapping an earlier one are dropped.
    pub fn apply(mut self, source: &str) -> String {
        if self.spans.is_empty() {
            return source.to_string();
        }
        self.spans.sort_by_key(|(start, end, _)| (*start, *end));

        let mut accepted: Vec<(usize, usize, String)> = Vec::with_capacity(self.spans.len());
        let mut last_end = 0;
        for (start, end, replacement) in self.spans {
            if start < last_end || end > source.len() || start > end {
                continue;
            }
            if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
                continue;
            }
            last_end = end;
            accepted.push((start, end, replacement));
        }

        let mut out = source.to_string();
        for (start, end, replacement) in accepted.into_iter().rev() {
            out.replace_range(start..end, &replacement);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_in_reverse() {
        let mut edits = Edits::new();
        edits.push(0, 1, "AAA");
        edits.push(4, 5, "E");
        assert_eq!(edits.apply("abcde"), "AAAbcdE");
    }

    #[test]
    fn test_overlap_dropped() {
        let mut edits = Edits::new();
        edits.push(1, 4, "X");
        edits.push(2, 3, "Y");
        assert_eq!(edits.apply("abcde"), "aXe");
    }

    #[test]
    fn test_empty() {
        assert_eq!(Edits::new().apply("same"), "same");
    }
}
