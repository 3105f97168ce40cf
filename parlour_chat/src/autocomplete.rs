//! Tab completion of mentions and room names.

/// Complete the last word of `line`.
///
/// A last word starting with `@`, or a sole word starting with `=`, completes
/// against `members` (plain names). A last word starting with `#` completes
/// against `rooms`. The first candidate that extends the typed prefix wins,
/// and the remainder of the name plus a space is appended to the line.
pub fn complete(line: &str, pos: usize, members: &[String], rooms: &[String]) -> Option<(String, usize)> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let last = *words.last()?;

    let suffix = if last.starts_with('@') || (words.len() == 1 && last.starts_with('=')) {
        complete_from(&last[1..], members)
    } else if last.starts_with('#') {
        complete_from(last, rooms)
    } else {
        None
    }?;

    Some((format!("{}{}", line, suffix), pos + suffix.len()))
}

fn complete_from(prefix: &str, candidates: &[String]) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find_map(|name| name.strip_prefix(prefix))
        .map(|rest| format!("{} ", rest))
}
