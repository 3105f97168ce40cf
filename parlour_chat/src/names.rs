//! Username normalisation and policy.

use crate::utils::strip_ansi;

/// Normalise a requested username: escape sequences and control characters
/// are dropped, only the first line is kept, and runs of whitespace become
/// a single `-`.
pub fn clean_name(requested: &str) -> String {
    let stripped = strip_ansi(requested);
    let first_line = stripped.lines().next().unwrap_or("");
    first_line
        .split_whitespace()
        .map(|word| word.chars().filter(|c| !c.is_control()).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `name` contains any of `denied`, ignoring case.
pub fn contains_denied_word(name: &str, denied: &[String]) -> bool {
    let name = name.to_lowercase();
    denied
        .iter()
        .filter(|word| !word.is_empty())
        .any(|word| name.contains(&word.to_lowercase()))
}

/// Names a user may not take: room-style names and the system name.
pub fn is_reserved(name: &str, system_name: &str) -> bool {
    name.starts_with('#') || name == system_name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning() {
        assert_eq!(clean_name("  alice  "), "alice");
        assert_eq!(clean_name("big bad\twolf"), "big-bad-wolf");
        assert_eq!(clean_name("first\nsecond"), "first");
        assert_eq!(clean_name("\x1b[31mred\x1b[0m\x07"), "red");
        assert_eq!(clean_name("   "), "");
    }

    #[test]
    fn denied_words_ignore_case() {
        let denied = vec!["Admin".to_owned()];
        assert!(contains_denied_word("theADMIN", &denied));
        assert!(!contains_denied_word("alice", &denied));
        assert!(!contains_denied_word("alice", &["".to_owned()]));
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved("#main", "devbot"));
        assert!(is_reserved("devbot", "devbot"));
        assert!(!is_reserved("alice", "devbot"));
    }
}
