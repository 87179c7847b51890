//! Line-oriented top-level declaration scanner.
//!
//! A declaration starts on a line at column 0 that opens with a declaration
//! keyword (after optional modifiers such as `export` or `pub`) followed by
//! an identifier. It runs to the last non-blank line before the next
//! declaration. No grammar is involved; indentation is the only structure.

use common::{LineSeparator, Position, Range};

/// Stripped, in any order and any number, before the keyword.
const MODIFIERS: &[&str] = &[
    "export", "default", "declare", "abstract", "async", "pub", "pub(crate)", "pub(super)",
    "unsafe", "extern",
];

const KEYWORDS: &[&str] = &[
    "function", "function*", "class", "const", "let", "var", "type", "interface", "enum", "fn",
    "struct", "trait", "static", "def",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub keyword: &'static str,
    /// From column 0 of the first line to just past the last character of
    /// the last non-blank line.
    pub range: Range,
}

impl Declaration {
    pub fn first_line(&self) -> usize {
        self.range.start.line
    }

    pub fn last_line(&self) -> usize {
        self.range.end.line
    }
}

/// Splits `text` on its detected separator. A trailing separator yields a
/// final empty line, matching [`common::LineIndex`] line numbering.
pub fn split_lines(text: &str) -> (LineSeparator, Vec<&str>) {
    let separator = LineSeparator::detect(text);
    (separator, text.split(separator.as_str()).collect())
}

/// Parses the declaration header on `line`, returning keyword and name.
pub fn header(line: &str) -> Option<(&'static str, &str)> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }
    let mut words = line.split_whitespace().peekable();
    while words.peek().is_some_and(|w| MODIFIERS.contains(w)) {
        words.next();
    }
    let word = words.next()?;
    let keyword = KEYWORDS.iter().copied().find(|k| *k == word)?;
    let name = identifier(words.next()?)?;
    Some((keyword, name))
}

/// Leading identifier of `word` (`foo` in `foo(a, b)` or `foo<T>`).
fn identifier(word: &str) -> Option<&str> {
    let end = word
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    let ident = &word[..end];
    match ident.chars().next() {
        Some(c) if !c.is_ascii_digit() => Some(ident),
        _ => None,
    }
}

pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Finds every top-level declaration of `text`, in source order.
pub fn scan(text: &str) -> Vec<Declaration> {
    let (_, lines) = split_lines(text);
    let starts: Vec<(usize, &'static str, &str)> = lines
        .iter()
        .enumerate()
        .filter_map(|(n, line)| header(line).map(|(keyword, name)| (n, keyword, name)))
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(k, &(first, keyword, name))| {
            let limit = starts.get(k + 1).map(|s| s.0).unwrap_or(lines.len());
            let last = (first..limit)
                .rev()
                .find(|&n| !lines[n].trim().is_empty())
                .unwrap_or(first);
            Declaration {
                name: name.to_string(),
                keyword,
                range: Range::new(
                    Position::new(first, 0),
                    Position::new(last, lines[last].chars().count()),
                ),
            }
        })
        .collect()
}
