//! Word tokenization shared by index time and query time.
//!
//! Case-folded, punctuation-stripped tokens. Underscores stay inside a
//! token so snake_case identifiers survive intact.

pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
