use unicode_width::UnicodeWidthChar;

/// Remove terminal escape sequences from `s`.
///
/// Handles CSI sequences (`ESC [ ... final`), OSC sequences (`ESC ] ... BEL`
/// or `ESC ] ... ESC \`) and two-character escapes. Other control characters,
/// including the bell, are left in place.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Number of terminal columns `s` occupies once escape sequences are removed.
///
/// Control characters count as zero columns; wide glyphs count as two.
pub fn visible_len(s: &str) -> usize {
    strip_ansi(s)
        .chars()
        .map(|c| c.width().unwrap_or(0))
        .sum()
}

/// Pad `msg` on the left so that it ends at the right edge of a `width`-column
/// terminal. Messages that don't fit are returned unchanged.
pub fn right_align(msg: &str, width: usize) -> String {
    let len = visible_len(msg);
    if width > len {
        format!("{}{}", " ".repeat(width - len), msg)
    } else {
        msg.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_sequences() {
        let painted = "\x1b[38;2;0;255;0mdevbot\x1b[0m";
        assert_eq!(strip_ansi(painted), "devbot");
        assert_eq!(visible_len(painted), 6);
    }

    #[test]
    fn keeps_bell_and_text() {
        assert_eq!(strip_ansi("hi\x07 there"), "hi\x07 there");
        assert_eq!(visible_len("hi\x07"), 2);
    }

    #[test]
    fn strips_osc_and_cursor_sequences() {
        assert_eq!(strip_ansi("\x1b]0;title\x07a\x1b[2Kb\x1b[Ac"), "abc");
        assert_eq!(strip_ansi("\x1b]8;;http://x\x1b\\link"), "link");
    }

    #[test]
    fn wide_glyphs_take_two_columns() {
        assert_eq!(visible_len("日本"), 4);
    }

    #[test]
    fn right_alignment() {
        assert_eq!(right_align("abc", 6), "   abc");
        assert_eq!(right_align("abcdef", 4), "abcdef");
    }
}
