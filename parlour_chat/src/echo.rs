//! Erasing the client's local echo of submitted input.
//!
//! After a line is submitted the terminal still shows what was typed
//! (prompt plus text). Before the rendered message is broadcast, that echo is
//! removed with one "cursor up, erase line" sequence per terminal row it
//! occupied. Row counts are estimates: they assume the terminal wraps at the
//! last known width.

use crate::utils::{strip_ansi, visible_len};

/// Move the cursor up one row and clear it.
pub const ERASE_ROW: &str = "\x1b[A\x1b[2K";

/// Rows taken by a single typed line: the prompt is `name: `, so the visible
/// length is that of the name and the line plus two.
pub fn typed_rows(name: &str, line: &str, width: usize) -> usize {
    let len = visible_len(name) + visible_len(line) + 2;
    let width = width.max(1);
    (len + width - 1) / width
}

/// Rows taken by pasted text. One row is always counted for the line the
/// cursor is left on; tabs are assumed to expand by eight columns.
pub fn pasted_rows(text: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut pos = 0;
    for c in strip_ansi(text).chars() {
        pos += 1;
        if c == '\t' {
            pos += 8;
        }
        if c == '\n' || pos > width {
            pos = 1;
            rows += 1;
        }
    }
    rows
}

pub fn erase_rows(rows: usize) -> String {
    ERASE_ROW.repeat(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_rows_rounds_up() {
        // "alice" + "hi" + 2 = 9 columns
        assert_eq!(typed_rows("alice", "hi", 80), 1);
        assert_eq!(typed_rows("alice", "hi", 9), 1);
        assert_eq!(typed_rows("alice", "hi", 8), 2);
        assert_eq!(typed_rows("alice", &"x".repeat(100), 10), 11);
    }

    #[test]
    fn typed_rows_ignores_colour() {
        let painted = "\x1b[38;2;1;2;3malice\x1b[0m";
        assert_eq!(typed_rows(painted, "hi", 8), 2);
    }

    #[test]
    fn pasted_rows_counts_breaks() {
        assert_eq!(pasted_rows("abc", 80), 1);
        assert_eq!(pasted_rows("abc\ndef\n", 80), 3);
        assert_eq!(pasted_rows(&"x".repeat(25), 10), 3);
        assert_eq!(pasted_rows("\t\t", 10), 2);
    }

    #[test]
    fn erase_sequence() {
        assert_eq!(erase_rows(2), "\x1b[A\x1b[2K\x1b[A\x1b[2K");
        assert_eq!(erase_rows(0), "");
    }
}
