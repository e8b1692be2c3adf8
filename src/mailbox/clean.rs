//! Spreadsheet-safe text cleaning.

use std::sync::OnceLock;

use regex::Regex;

/// Longest text a spreadsheet cell will hold.
pub const MAX_CELL_CHARS: usize = 32_767;

fn control_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x{200B}-\x{200F}\x{FEFF}]")
            .expect("static control-char regex")
    })
}

/// Strip control and zero-width characters, cap the length, and neutralise
/// a leading formula character with a `'` prefix.
pub fn clean_text(text: &str) -> String {
    let stripped = control_chars().replace_all(text, "");
    let mut cleaned: String = stripped.chars().take(MAX_CELL_CHARS).collect();
    if cleaned.starts_with(['=', '+', '-', '@']) {
        cleaned.insert(0, '\'');
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_and_zero_width() {
        assert_eq!(clean_text("a\u{0}b\u{7}c\u{1F}d"), "abcd");
        assert_eq!(clean_text("zero\u{200B}width\u{FEFF}"), "zerowidth");
        assert_eq!(clean_text("mark\u{200E}s"), "marks");
    }

    #[test]
    fn keeps_tab_newline_and_carriage_return() {
        assert_eq!(clean_text("a\tb\nc\rd"), "a\tb\nc\rd");
    }

    #[test]
    fn guards_formula_prefixes() {
        assert_eq!(clean_text("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(clean_text("+1 555"), "'+1 555");
        assert_eq!(clean_text("-5"), "'-5");
        assert_eq!(clean_text("@user"), "'@user");
        assert_eq!(clean_text("plain"), "plain");
    }

    #[test]
    fn guard_applies_after_stripping() {
        assert_eq!(clean_text("\u{200B}=cmd"), "'=cmd");
    }

    #[test]
    fn truncates_to_cell_limit() {
        let long = "é".repeat(MAX_CELL_CHARS + 10);
        assert_eq!(clean_text(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(clean_text(""), "");
    }
}
