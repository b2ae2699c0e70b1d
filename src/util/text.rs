use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

const ESC: char = '\u{1b}';
const BEL: char = '\u{07}';

/// Strips terminal control characters and ANSI escape sequences.
///
/// Feed text is attacker-controlled and ends up in logs and terminal output,
/// so everything that can move a cursor or recolour a terminal is dropped:
/// C0 controls other than tab/newline/CR, DEL, CSI (`ESC [ ... final`),
/// OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`) and bare ESC.
///
/// Returns `Cow::Borrowed` when nothing needs stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESC => skip_escape(&mut chars),
            c if is_stripped(c) => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

/// Normalises a text field read from a feed document: control characters
/// stripped, surrounding whitespace trimmed.
pub fn clean_text(raw: &str) -> String {
    strip_control_chars(raw).trim().to_owned()
}

fn is_stripped(c: char) -> bool {
    c == ESC || c == '\u{7f}' || (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r'))
}

fn skip_escape(chars: &mut Peekable<Chars<'_>>) {
    match chars.peek() {
        Some('[') => {
            chars.next();
            // Parameter and intermediate bytes run until the final byte.
            for c in chars.by_ref() {
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    break;
                }
            }
        }
        Some(']') => {
            chars.next();
            while let Some(c) = chars.next() {
                if c == BEL {
                    break;
                }
                if c == ESC && chars.peek() == Some(&'\\') {
                    chars.next();
                    break;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_borrowed() {
        assert!(matches!(
            strip_control_chars("Plain title"),
            Cow::Borrowed("Plain title")
        ));
    }

    #[test]
    fn test_keeps_tab_newline_cr() {
        assert_eq!(strip_control_chars("a\tb\nc\rd"), "a\tb\nc\rd");
    }

    #[test]
    fn test_removes_c0_and_del() {
        assert_eq!(strip_control_chars("a\u{0}b\u{8}c\u{7f}d"), "abcd");
    }

    #[test]
    fn test_removes_csi_sequences() {
        assert_eq!(strip_control_chars("\u{1b}[31mred\u{1b}[0m"), "red");
        assert_eq!(strip_control_chars("\u{1b}[2J\u{1b}[Hhome"), "home");
    }

    #[test]
    fn test_removes_osc_sequences() {
        assert_eq!(
            strip_control_chars("\u{1b}]0;pwned\u{7}title"),
            "title"
        );
        assert_eq!(
            strip_control_chars("\u{1b}]8;;https://evil\u{1b}\\link"),
            "link"
        );
    }

    #[test]
    fn test_bare_escape_dropped() {
        assert_eq!(strip_control_chars("a\u{1b}b"), "ab");
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(strip_control_chars("Новости 世界 ✓"), "Новости 世界 ✓");
    }

    #[test]
    fn test_clean_text_trims() {
        assert_eq!(clean_text("\n    Title\u{1b}[1m  \n"), "Title");
        assert_eq!(clean_text(""), "");
    }
}
