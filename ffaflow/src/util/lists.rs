//! Line-oriented list files (node lists, observation lists).

/// Non-empty, non-comment entries with their 1-based line numbers.
///
/// Lines are trimmed; blank lines and lines starting with `#` are dropped.
pub fn list_entries(text: &str) -> Vec<(usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect()
}
