/// Reference link definitions (`[label]: url`)
use std::collections::HashMap;

use unicode_casefold::UnicodeCaseFold;

use crate::parser::{fence_language, is_fence_close};

/// Label -> URL table built from the definition lines of a document.
///
/// Labels are matched case-insensitively with surrounding whitespace
/// ignored; the first definition of a label wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    definitions: HashMap<String, String>,
    /// Non-whitespace chars in the longest normalized label
    longest_label: usize,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Returns false if the label was already taken.
    pub fn insert(&mut self, label: &str, url: &str) -> bool {
        let key = normalize_label(label);
        if self.definitions.contains_key(&key) {
            tracing::debug!(label, "Duplicate reference definition ignored");
            return false;
        }
        tracing::debug!(label, url, "Registered reference definition");
        let visible = key.chars().filter(|c| !c.is_whitespace()).count();
        self.longest_label = self.longest_label.max(visible);
        self.definitions.insert(key, url.to_string());
        true
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        // Case folding never shortens a label, so one with more visible
        // chars than every key cannot match and is not normalized at all.
        let visible = label
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(self.longest_label + 1)
            .count();
        if visible > self.longest_label {
            return None;
        }
        self.definitions
            .get(&normalize_label(label))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Remove every definition line from `input` and collect them into a table.
///
/// A run of consecutive definitions that stands as its own block (followed
/// by a blank line or the end of input) takes the blank line above it
/// along, so it never turns into a line break. A run followed directly by
/// text leaves that blank line in place as the separator it was.
pub fn extract(input: &str) -> (String, ReferenceTable) {
    let mut table = ReferenceTable::new();
    let lines: Vec<&str> = input.lines().collect();
    let mut kept: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if in_fence {
            in_fence = !is_fence_close(line);
        } else if fence_language(line).is_some() {
            in_fence = true;
        } else if parse_definition(line).is_some() {
            while let Some((label, url)) = lines.get(i).and_then(|line| parse_definition(line)) {
                table.insert(label, url);
                i += 1;
            }
            let stands_alone = lines.get(i).is_none_or(|next| next.trim().is_empty());
            if stands_alone && kept.last().is_some_and(|prev| prev.trim().is_empty()) {
                kept.pop();
            }
            continue;
        }
        kept.push(line);
        i += 1;
    }

    (kept.join("\n"), table)
}

/// Match `[label]: url` with at most 3 spaces of indentation.
fn parse_definition(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }

    let rest = trimmed.strip_prefix('[')?;
    let close = rest.find(']')?;
    let label = &rest[..close];
    let url = rest[close + 1..].strip_prefix(':')?.trim();

    if label.trim().is_empty() || url.is_empty() {
        return None;
    }
    Some((label, url))
}

/// Normalize a label for matching (case-fold, collapse whitespace)
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .chars()
        .case_fold()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_removes_definition_lines() {
        let (text, table) = extract("hello [World]!\n[world]: http://world.com");
        assert_eq!(text, "hello [World]!");
        assert_eq!(table.get("WORLD"), Some("http://world.com"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_extract_absorbs_one_preceding_blank_line() {
        let (text, _) = extract("a\n\n[x]: /x\n\nb");
        assert_eq!(text, "a\n\nb");

        let (text, _) = extract("a\n\n[x]: /x");
        assert_eq!(text, "a");

        let (text, _) = extract("a\n\n\n[x]: /x\n[y]: /y\n\nb");
        assert_eq!(text, "a\n\n\nb");
    }

    #[test]
    fn test_extract_keeps_blank_line_when_text_follows() {
        let (text, _) = extract("a\n\n[x]: /x\nb");
        assert_eq!(text, "a\n\nb");

        let (text, table) = extract("a\n\n[x]: /x\n[y]: /y\nb");
        assert_eq!(text, "a\n\nb");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_long_label_misses_without_normalizing() {
        let mut table = ReferenceTable::new();
        table.insert("Tiny  Libraries", "/tiny");
        assert_eq!(table.get(" tiny libraries "), Some("/tiny"));
        assert_eq!(table.get("tiny libraries!"), None);
        assert_eq!(table.get(&"[".repeat(10_000)), None);
        assert_eq!(ReferenceTable::new().get("x"), None);
    }

    #[test]
    fn test_first_definition_wins() {
        let (_, table) = extract("[a]: /first\n[A]: /second");
        assert_eq!(table.get("a"), Some("/first"));
    }

    #[test]
    fn test_malformed_definitions_stay_as_text() {
        let input = "[]: /empty\n[x]:\n[y] /nocolon\n    [z]: /indented";
        let (text, table) = extract(input);
        assert_eq!(text, input);
        assert!(table.is_empty());
    }

    #[test]
    fn test_definitions_inside_fences_are_kept() {
        let input = "```\n[x]: /x\n```";
        let (text, table) = extract(input);
        assert_eq!(text, input);
        assert!(table.is_empty());
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Tiny   Libraries "), "tiny libraries");
        assert_eq!(normalize_label("STRASSE"), normalize_label("strasse"));
    }
}
