const LINE_SEPARATOR: &str = " | ";
const BULLET: char = '•';

/// Flatten a card's category text into a single CSV-friendly line.
///
/// Line breaks become `" | "`, bullets are dropped, ends are trimmed.
/// Applying it twice gives the same result as applying it once.
pub fn normalize_details(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\n', LINE_SEPARATOR)
        .replace(BULLET, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_lines_and_drops_bullets() {
        let raw = "  Grammar •\nBeginner\n";
        assert_eq!(normalize_details(raw), "Grammar  | Beginner |");
    }

    #[test]
    fn windows_line_endings() {
        assert_eq!(normalize_details("Vocabulary\r\nAdvanced"), "Vocabulary | Advanced");
    }

    #[test]
    fn idempotent() {
        for raw in [
            "",
            "   ",
            "Grammar",
            "• Speaking\n• 2-Intermediate\n",
            "\nListening •\n\nBusiness English\n",
            "Écoute | niño • año",
        ] {
            let once = normalize_details(raw);
            assert_eq!(normalize_details(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn keeps_non_ascii() {
        assert_eq!(normalize_details("Pronunciación\n•Nivel"), "Pronunciación | Nivel");
    }
}
