//! Label normalization shared by the repairer and the graph extractor.

/// Longest label the generic graph view displays.
pub const DISPLAY_LABEL_MAX: usize = 40;

/// Characters that either break the diagram grammar inside a label or are
/// quoting/markup noise.
const DROPPED: [char; 11] = ['(', ')', '<', '>', '"', '`', '[', ']', '{', '}', '|'];

/// Cleans a raw node label for the primary engine.
///
/// Emphasis markers, line breaks, non-printable or non-ASCII characters and grammar
/// delimiters are removed; whitespace is collapsed. The result is a single line and the
/// function is idempotent.
pub fn sanitize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.chars() {
        let ch = match ch {
            '*' | '_' => continue,
            '\r' | '\n' => ' ',
            ch => ch,
        };
        if !is_printable_ascii(ch) || DROPPED.contains(&ch) {
            continue;
        }
        if ch == ' ' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

/// [`sanitize_label`] followed by truncation to [`DISPLAY_LABEL_MAX`] characters.
pub fn display_label(raw: &str) -> String {
    let mut label = sanitize_label(raw);
    if label.len() > DISPLAY_LABEL_MAX {
        // Sanitized labels are ASCII, so byte and char boundaries agree.
        label.truncate(DISPLAY_LABEL_MAX);
        let trimmed = label.trim_end().len();
        label.truncate(trimmed);
    }
    label
}

pub fn is_printable_ascii(ch: char) -> bool {
    matches!(ch, ' '..='~')
}

pub fn has_markdown(raw: &str) -> bool {
    raw.contains(['*', '_', '`'])
}

pub fn has_non_ascii(raw: &str) -> bool {
    raw.chars().any(|ch| !is_printable_ascii(ch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_emphasis_and_keeps_text() {
        assert_eq!(sanitize_label("**Bold** and *italic*"), "Bold and italic");
        assert_eq!(sanitize_label("__under__ score"), "under score");
    }

    #[test]
    fn collapses_line_breaks() {
        assert_eq!(sanitize_label("first\nsecond\r\nthird"), "first second third");
    }

    #[test]
    fn drops_non_ascii_and_delimiters() {
        assert_eq!(sanitize_label("Emoji 🎯"), "Emoji");
        assert_eq!(sanitize_label("caf\u{e9} (menu) <b>"), "caf menu b");
        assert_eq!(sanitize_label("say \"hi\" `now`"), "say hi now");
        assert_eq!(sanitize_label("a[b]{c}|d"), "abcd");
    }

    #[test]
    fn empty_input_gives_empty_label() {
        assert_eq!(sanitize_label(""), "");
        assert_eq!(sanitize_label("🎯🎯"), "");
    }

    #[test]
    fn display_label_truncates() {
        let long = "word ".repeat(20);
        let label = display_label(&long);
        assert!(label.len() <= DISPLAY_LABEL_MAX);
        assert!(!label.ends_with(' '));
        assert_eq!(display_label("short"), "short");
    }

    #[test]
    fn detects_markup_and_non_ascii() {
        assert!(has_markdown("**x**"));
        assert!(has_markdown("snake_case"));
        assert!(!has_markdown("plain"));
        assert!(has_non_ascii("tab\there"));
        assert!(has_non_ascii("\u{e9}"));
        assert!(!has_non_ascii("ascii only"));
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(input in any::<String>()) {
            let once = sanitize_label(&input);
            prop_assert_eq!(sanitize_label(&once), once.clone());
            prop_assert!(once.chars().all(is_printable_ascii));
            prop_assert!(!once.contains('\n'));
        }

        #[test]
        fn display_label_is_idempotent(input in "[ -~\n*_🎯é]{0,80}") {
            let once = display_label(&input);
            prop_assert_eq!(display_label(&once), once.clone());
            prop_assert!(once.len() <= DISPLAY_LABEL_MAX);
        }
    }
}
