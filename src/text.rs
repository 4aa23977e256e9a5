//! Small text helpers shared by the keyword-ranked stores.

/// Split a query into lowercase terms. A query without whitespace (e.g. CJK
/// text) is a single term.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Quote each term for FTS5 MATCH and join with OR, so partial matches still rank.
pub fn fts_or_query(query: &str) -> String {
    query_terms(query)
        .into_iter()
        .map(|term| format!("\"{}\"", term.replace('"', "")))
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Truncate to at most `max_chars` characters, appending "..." if truncated.
pub fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}
