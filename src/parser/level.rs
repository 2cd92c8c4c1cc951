use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Optional `2-` / `Level-` / `Nivel-` prefix followed by the label itself.
static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:\d+|Level|Nivel)-)?(Beginner|Intermediate|Advanced)").unwrap()
});

static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    Unspecified,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Beginner,
        Level::Intermediate,
        Level::Advanced,
        Level::Unspecified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
            Level::Unspecified => "Unspecified",
        }
    }

    fn from_label(label: &str) -> Self {
        match label {
            "Beginner" => Level::Beginner,
            "Intermediate" => Level::Intermediate,
            "Advanced" => Level::Advanced,
            _ => Level::Unspecified,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull the level out of a details blob.
///
/// The pattern is searched once. The label of the first match becomes the
/// level and exactly that span is cut out, so a second occurrence further
/// along the text is left alone. Whitespace runs are then collapsed.
pub fn split_level(details: &str) -> (Level, String) {
    let mut rest = details.to_string();
    let level = match LEVEL_RE.captures(details) {
        Some(caps) => {
            let span = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            rest.replace_range(span, "");
            Level::from_label(&caps[1])
        }
        None => Level::Unspecified,
    };
    (level, collapse_whitespace(&rest))
}

/// Replace every run of two or more whitespace characters with one space, trim ends.
pub fn collapse_whitespace(s: &str) -> String {
    MULTI_SPACE_RE.replace_all(s, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_prefix() {
        let (level, details) = split_level("2-Intermediate Grammar");
        assert_eq!(level, Level::Intermediate);
        assert_eq!(details, "Grammar");
    }

    #[test]
    fn word_prefix() {
        assert_eq!(
            split_level("Vocabulary | Level-Advanced"),
            (Level::Advanced, "Vocabulary |".to_string())
        );
        assert_eq!(
            split_level("Nivel-Beginner Speaking"),
            (Level::Beginner, "Speaking".to_string())
        );
    }

    #[test]
    fn bare_label() {
        assert_eq!(
            split_level("Grammar  |  Beginner"),
            (Level::Beginner, "Grammar |".to_string())
        );
    }

    #[test]
    fn no_level() {
        let (level, details) = split_level("Pronunciation");
        assert_eq!(level, Level::Unspecified);
        assert_eq!(details, "Pronunciation");
    }

    #[test]
    fn no_level_still_collapses() {
        let (level, details) = split_level("  Business   English \t\t| Idioms ");
        assert_eq!(level, Level::Unspecified);
        assert_eq!(details, "Business English | Idioms");
    }

    #[test]
    fn only_first_occurrence_is_removed() {
        let (level, details) = split_level("Beginner Listening • Beginner Vocabulary");
        assert_eq!(level, Level::Beginner);
        assert_eq!(details, "Listening • Beginner Vocabulary");
    }

    #[test]
    fn captured_label_matches_removed_span() {
        let (level, details) = split_level("Grammar | 3-Advanced | Intermediate Reading");
        assert_eq!(level, Level::Advanced);
        assert_eq!(details, "Grammar | | Intermediate Reading");
    }

    #[test]
    fn dangling_hyphen_is_not_a_prefix() {
        // "Phrasal-" is neither digits nor a known word, so only the label goes.
        let (level, details) = split_level("Phrasal-Intermediate");
        assert_eq!(level, Level::Intermediate);
        assert_eq!(details, "Phrasal-");
    }

    #[test]
    fn empty_details() {
        assert_eq!(split_level(""), (Level::Unspecified, String::new()));
    }

    #[test]
    fn display_matches_csv_label() {
        assert_eq!(Level::Unspecified.to_string(), "Unspecified");
        assert_eq!(Level::ALL.len(), 4);
    }
}
