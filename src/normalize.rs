//! Pure text helpers shared by every extractor: title cleanup, double-feature
//! splitting and print-format detection.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static GAUGE_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\([^)]*mm\)").expect("valid regex"));
static IB_TECH_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\(IB Tech[^)]*\)").expect("valid regex"));
static TRAILING_GAUGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+in \d+mm$").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PROMO_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:masterclass|q&a|discussion|screening)\s*[/\-:]|(?:in person|special event|70mm)\b\s*[/\-:]?)\s*")
        .expect("valid regex")
});

/// Keyword → label, checked in order. First hit wins.
const FORMAT_KEYWORDS: [(&str, &str); 5] = [
    ("70mm", "70mm"),
    ("35mm", "35mm"),
    ("16mm", "16mm"),
    ("ib tech", "IB Technicolor 35mm"),
    ("technicolor", "Technicolor"),
];

/// Presentation tags used by chains that report attributes rather than prose.
const PREMIUM_FORMATS: [&str; 5] = ["IMAX", "RPX", "4DX", "ScreenX", "3D"];

pub const DEFAULT_FORMAT: &str = "Digital";

const DOUBLE_FEATURE_SEPARATORS: [&str; 3] = [" / ", " + ", " & "];

/// Cleans a raw upstream title. Returns `None` when nothing is left.
pub fn normalize_title(raw: &str) -> Option<String> {
    let mut current = raw.trim().to_string();
    // Stripping one annotation can expose another ("X in 35mm in 70mm").
    loop {
        let next = normalize_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    (!current.is_empty()).then_some(current)
}

fn normalize_once(title: &str) -> String {
    let title = GAUGE_PARENS.replace_all(title, "");
    let title = IB_TECH_PARENS.replace_all(&title, "");
    let title = TRAILING_GAUGE.replace(title.trim(), "");
    collapse_whitespace(&title)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Detects the print format mentioned anywhere in `text`, defaulting to digital.
pub fn extract_format(text: &str) -> String {
    let lower = text.to_lowercase();
    FORMAT_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

/// Format detection over a list of upstream attribute tags.
///
/// Film gauges win over premium presentations, which win over the digital default.
pub fn format_from_attributes<S: AsRef<str>>(attributes: &[S]) -> String {
    let joined = attributes.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
    let gauge = extract_format(&joined);
    if gauge != DEFAULT_FORMAT {
        return gauge;
    }

    PREMIUM_FORMATS
        .iter()
        .find(|premium| {
            attributes.iter().any(|attr| {
                attr.as_ref()
                    .split(|c: char| !c.is_ascii_alphanumeric())
                    .any(|token| token.eq_ignore_ascii_case(premium))
            })
        })
        .map(|premium| premium.to_string())
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

/// Splits "A / B" style double bills on the first separator that occurs.
pub fn split_double_feature(title: &str) -> Vec<String> {
    DOUBLE_FEATURE_SEPARATORS
        .iter()
        .find(|sep| title.contains(*sep))
        .map(|sep| {
            title.split(sep).map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
        })
        .unwrap_or_else(|| vec![title.trim().to_string()])
}

/// Removes event-type prefixes such as "Masterclass / " or "Q&A - ".
pub fn strip_promotional_prefix(title: &str) -> String {
    PROMO_PREFIX.replace(title.trim(), "").trim().to_string()
}

/// Non-empty text nodes of an HTML fragment, entities decoded.
pub fn html_lines(fragment: &str) -> Vec<String> {
    let doc = Html::parse_fragment(fragment);
    doc.root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

pub fn html_text(fragment: &str) -> String {
    collapse_whitespace(&html_lines(fragment).join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_format_annotations() {
        assert_eq!(
            normalize_title("  The Long Goodbye (35mm)  ").as_deref(),
            Some("The Long Goodbye")
        );
        assert_eq!(
            normalize_title("Vertigo (IB Technicolor print)").as_deref(),
            Some("Vertigo")
        );
        assert_eq!(normalize_title("Lawrence of Arabia in 70mm").as_deref(), Some("Lawrence of Arabia"));
        assert_eq!(normalize_title("Night   Moves").as_deref(), Some("Night Moves"));
    }

    #[test]
    fn empty_titles_are_none() {
        assert_eq!(normalize_title(""), None);
        assert_eq!(normalize_title("   "), None);
        assert_eq!(normalize_title("(35mm)"), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "  The Long Goodbye (35mm)  ",
            "Tenet in 35mm in 70mm",
            "Vertigo (IB Tech) (70mm)",
            "Mulholland Dr.",
            "Cléo from 5 to 7\t(16mm)",
        ] {
            let once = normalize_title(raw);
            let twice = once.as_deref().and_then(normalize_title);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn format_priority() {
        assert_eq!(extract_format("A 70mm presentation of..."), "70mm");
        assert_eq!(extract_format("just a movie"), "Digital");
        assert_eq!(extract_format("35MM and 16mm reels"), "35mm");
        assert_eq!(extract_format("in IB Tech"), "IB Technicolor 35mm");
        assert_eq!(extract_format("glorious Technicolor"), "Technicolor");
        assert_eq!(extract_format(""), "Digital");
    }

    #[test]
    fn attribute_formats() {
        assert_eq!(format_from_attributes(&["IMAX", "Reserved Seating"]), "IMAX");
        assert_eq!(format_from_attributes(&["IMAX 70mm"]), "70mm");
        assert_eq!(format_from_attributes(&["RealD 3D"]), "3D");
        assert_eq!(format_from_attributes(&["Open Caption"]), "Digital");
        assert_eq!(format_from_attributes(&["Showtime.Format.IMAX"]), "IMAX");
        assert_eq!(format_from_attributes(&["Showtime.Format.ScreenX"]), "ScreenX");
        assert_eq!(format_from_attributes(&["Showtime.Format.Digital"]), "Digital");
        assert_eq!(format_from_attributes::<&str>(&[]), "Digital");
    }

    #[test]
    fn double_features() {
        assert_eq!(
            split_double_feature("The Long Goodbye / Night Moves"),
            vec!["The Long Goodbye", "Night Moves"]
        );
        assert_eq!(split_double_feature("Alien + Aliens"), vec!["Alien", "Aliens"]);
        assert_eq!(split_double_feature("Chinatown"), vec!["Chinatown"]);
        // Only the first separator kind that appears is used.
        assert_eq!(split_double_feature("Tom & Jerry / Heat"), vec!["Tom & Jerry", "Heat"]);
    }

    #[test]
    fn promotional_prefixes() {
        assert_eq!(strip_promotional_prefix("Masterclass / Seven Samurai"), "Seven Samurai");
        assert_eq!(strip_promotional_prefix("Q&A - Paris, Texas"), "Paris, Texas");
        assert_eq!(strip_promotional_prefix("IN PERSON Blue Velvet"), "Blue Velvet");
        assert_eq!(strip_promotional_prefix("Screenings of Note"), "Screenings of Note");
    }

    #[test]
    fn html_fragments() {
        assert_eq!(html_text("Q&amp;A - <em>Heat</em>"), "Q&A - Heat");
        assert_eq!(
            html_lines("<p>Masterclass</p><p>With the director in person</p>"),
            vec!["Masterclass", "With the director in person"]
        );
    }
}
