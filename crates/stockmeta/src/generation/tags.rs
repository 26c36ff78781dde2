//! Tag list normalisation.
//!
//! Providers return tags as free text; stored tags are a comma-joined list
//! without blanks or case-insensitive duplicates.

/// Splits a comma-separated tag string into trimmed, de-duplicated tags,
/// keeping first-seen order.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Normalises a tag string, optionally truncating to `max_tags` entries.
pub fn normalize_tags(raw: &str, max_tags: Option<usize>) -> String {
    let mut tags = split_tags(raw);
    if let Some(max) = max_tags {
        tags.truncate(max);
    }
    tags.join(",")
}
