//! Bounded text summaries for the status display and hint prompts.

/// Truncate to at most `max` chars (not bytes), never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `max` chars of `text`, on a code point boundary.
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Collapse whitespace and cap at `limit` chars, ending with `...` when cut.
pub fn summarize_text(text: &str, limit: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= limit {
        return cleaned;
    }
    let keep = limit.saturating_sub(3);
    format!("{}...", truncate_chars(&cleaned, keep).trim_end())
}

/// Keep the first non-empty lines of test output within `max_lines` lines
/// and `max_chars` chars.
///
/// Both cuts leave a marker, counted inside the bounds, so the reader knows
/// output was dropped.
pub fn summarize_failure_output(output: &str, max_lines: usize, max_chars: usize) -> String {
    const CHAR_MARKER: &str = "... (truncated)";

    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return String::new();
    }

    let mut kept: Vec<String> = Vec::new();
    if lines.len() > max_lines {
        let keep = max_lines.saturating_sub(1);
        kept.extend(lines[..keep].iter().map(|l| l.to_string()));
        kept.push(format!("... ({} more lines truncated)", lines.len() - keep));
    } else {
        kept.extend(lines.iter().map(|l| l.to_string()));
    }
    let summary = kept.join("\n");

    if summary.chars().count() <= max_chars {
        return summary;
    }
    // Room for the marker plus its newline
    let room = max_chars.saturating_sub(CHAR_MARKER.len() + 1);
    let cut = truncate_chars(&summary, room).trim_end();
    if cut.is_empty() {
        return CHAR_MARKER.to_string();
    }
    format!("{cut}\n{CHAR_MARKER}")
}
