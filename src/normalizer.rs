use crate::constants::ADMIN_PREFIXES;
use serde::{Deserialize, Serialize};

/// A cleaned provider query plus the ordered semantic tokens extracted from
/// the raw address text. Tokens keep the original left-to-right ordering, so
/// village-level terms come first and the province last.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedQuery {
    pub query: String,
    pub tokens: Vec<String>,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Cleans raw address text into a query string and token list.
///
/// Administrative-unit prefixes ("desa", "kecamatan", "kab.", ...) are
/// stripped wherever they appear as standalone tokens, whitespace and
/// punctuation are collapsed, and the comma-separated segment structure of
/// the input is preserved in the query string. Malformed input never fails;
/// it just yields fewer usable tokens.
pub fn normalize(raw: &str) -> NormalizedQuery {
    let lowered = raw.to_lowercase();

    let mut segments: Vec<String> = Vec::new();
    let mut tokens: Vec<String> = Vec::new();

    for segment in lowered.split(',') {
        let mut kept: Vec<&str> = Vec::new();
        for word in segment.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() || is_admin_prefix(word) {
                continue;
            }
            kept.push(word);
        }
        if kept.is_empty() {
            continue;
        }
        for word in &kept {
            // Short fragments ("rt", "no") carry no signal for matching
            if word.chars().count() > 2 {
                tokens.push((*word).to_string());
            }
        }
        segments.push(kept.join(" "));
    }

    NormalizedQuery {
        query: segments.join(", "),
        tokens,
    }
}

fn is_admin_prefix(word: &str) -> bool {
    ADMIN_PREFIXES.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_admin_prefixes() {
        let normalized = normalize("desa ampel, boyolali");
        assert_eq!(normalized.query, "ampel, boyolali");
        assert_eq!(normalized.tokens, vec!["ampel", "boyolali"]);
    }

    #[test]
    fn strips_dotted_prefixes_anywhere() {
        let normalized = normalize("Kel. Sidomulyo, Kec. Ungaran Timur, Kab. Semarang");
        assert_eq!(normalized.query, "sidomulyo, ungaran timur, semarang");
        assert_eq!(
            normalized.tokens,
            vec!["sidomulyo", "ungaran", "timur", "semarang"]
        );
    }

    #[test]
    fn collapses_whitespace_and_punctuation() {
        let normalized = normalize("  Ampel ,,  Boyolali,  Jawa   Tengah ");
        assert_eq!(normalized.query, "ampel, boyolali, jawa tengah");
        assert_eq!(normalized.tokens, vec!["ampel", "boyolali", "jawa", "tengah"]);
    }

    #[test]
    fn empty_input_yields_empty_query() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert!(normalize(" , , ").is_empty());
    }

    #[test]
    fn prefix_only_input_yields_empty_query() {
        assert!(normalize("desa kecamatan kabupaten").is_empty());
    }

    #[test]
    fn short_fragments_are_not_tokens() {
        let normalized = normalize("rt 05 rw 02, ampel");
        assert_eq!(normalized.tokens, vec!["ampel"]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "desa ampel, boyolali",
            "Kel. Sidomulyo, Kec. Ungaran Timur, Kab. Semarang",
            "  Dusun Krajan , desa Ampel ,, Boyolali  ",
            "jalan merdeka no. 5, semarang",
            "",
        ];
        for raw in inputs {
            let once = normalize(raw);
            let twice = normalize(&once.query);
            assert_eq!(once, twice, "normalize not idempotent for {raw:?}");
        }
    }
}
