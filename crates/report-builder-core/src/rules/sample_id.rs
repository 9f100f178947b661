//! Sample identifier extraction (`S` + 5 digits + `.` + 2 digits).

use std::sync::LazyLock;

use regex::Regex;

/// Rule text that selects the sample identifier extractor.
pub const SAMPLE_ID_RULE: &str = "SAMPLEID";

// Legacy spellings: `1234567.d` and `Data File 1234567`
static LEGACY_DOT_D: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(\d{2})\.d\b").expect("valid sample id pattern"));
static LEGACY_DATA_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Data File (\d{5})(\d{2})\b").expect("valid sample id pattern"));
static SAMPLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bS\d{5}\.\d{2}\b").expect("valid sample id pattern"));

/// Rewrite legacy identifier spellings into the `SDDDDD.DD` form.
pub fn normalize(text: &str) -> String {
    let text = LEGACY_DOT_D.replace_all(text, "S$1.$2");
    LEGACY_DATA_FILE
        .replace_all(&text, "Data File S$1.$2")
        .into_owned()
}

/// The sample identifier on a page, if the page names exactly one.
///
/// Returns `None` when no identifier is present or when the page mentions
/// two different identifiers.
pub fn extract(text: &str) -> Option<String> {
    let normalized = normalize(text);
    let mut found = SAMPLE_ID.find_iter(&normalized).map(|m| m.as_str());
    let first = found.next()?;
    if found.all(|other| other == first) {
        Some(first.to_string())
    } else {
        None
    }
}
