//! Creative Commons license table
//!
//! Maps the numeric license codes used by search filters to canonical labels,
//! and normalizes free-form license text scraped from photo pages.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CC_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:/licenses/|/creativecommons/)([a-z]+(?:-[a-z]+)*)[-/](\d+\.\d+)").expect("static regex")
});

/// The licenses that allow commercial reuse with attribution (or no conditions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    Attribution,
    AttributionShareAlike,
    PublicDomainDedication,
    PublicDomainMark,
    Attribution4,
    AttributionShareAlike4,
}

/// One row of the license table.
#[derive(Debug, PartialEq, Eq)]
pub struct License {
    pub code: &'static str,
    pub kind: LicenseKind,
    pub label: &'static str,
    /// Other spellings that identify this license in page text or links.
    pub aliases: &'static [&'static str],
}

pub static LICENSES: [License; 6] = [
    License {
        code: "4",
        kind: LicenseKind::Attribution,
        label: "CC BY 2.0",
        aliases: &["Attribution 2.0", "/licenses/by/2.0", "/creativecommons/by-2.0"],
    },
    License {
        code: "5",
        kind: LicenseKind::AttributionShareAlike,
        label: "CC BY-SA 2.0",
        aliases: &["Attribution-ShareAlike 2.0", "/licenses/by-sa/2.0", "/creativecommons/by-sa-2.0"],
    },
    License {
        code: "9",
        kind: LicenseKind::PublicDomainDedication,
        label: "CC0 1.0",
        aliases: &["Public Domain Dedication", "/publicdomain/zero/1.0"],
    },
    License {
        code: "10",
        kind: LicenseKind::PublicDomainMark,
        label: "Public Domain Mark",
        aliases: &["Public Domain Mark 1.0", "/publicdomain/mark/1.0"],
    },
    License {
        code: "11",
        kind: LicenseKind::Attribution4,
        label: "CC BY 4.0",
        aliases: &["Attribution 4.0", "/licenses/by/4.0", "/creativecommons/by-4.0"],
    },
    License {
        code: "12",
        kind: LicenseKind::AttributionShareAlike4,
        label: "CC BY-SA 4.0",
        aliases: &["Attribution-ShareAlike 4.0", "/licenses/by-sa/4.0", "/creativecommons/by-sa-4.0"],
    },
];

/// Comma separated codes for the search `license` filter.
pub fn all_codes() -> Vec<String> {
    LICENSES.iter().map(|license| license.code.to_string()).collect()
}

/// Looks up a license by its numeric site code.
pub fn from_code(code: &str) -> Option<&'static License> {
    let code = code.trim();
    LICENSES.iter().find(|license| license.code == code)
}

/// Finds the canonical license denoted by `text`.
///
/// Every label and alias is compared case-insensitively, both as-is and with
/// whitespace removed. The longest matching spelling wins so that
/// "CC BY-SA 4.0" never resolves to a shorter label it happens to contain.
/// Equal-length matches resolve to the earlier table row.
pub fn normalize(text: &str) -> Option<&'static License> {
    let haystack = text.to_lowercase();
    let compact_haystack = compact(&haystack);

    let mut best: Option<(&'static License, usize)> = None;
    for license in &LICENSES {
        for spelling in std::iter::once(&license.label).chain(license.aliases.iter()) {
            let needle = spelling.to_lowercase();
            let matched = haystack.contains(&needle) || compact_haystack.contains(&compact(&needle));
            if !matched {
                continue;
            }
            let length = needle.len();
            if best.is_none_or(|(_, best_length)| length > best_length) {
                best = Some((license, length));
            }
        }
    }
    best.map(|(license, _)| license)
}

/// Resolves an extracted license value to its canonical label.
///
/// Numeric codes go through the code table first. Text that matches no table
/// entry is kept verbatim (trimmed) so the attribution is never lost.
pub fn canonical_label(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(license) = from_code(raw) {
        return Some(license.label.to_string());
    }
    Some(normalize(raw).map_or_else(|| raw.to_string(), |license| license.label.to_string()))
}

/// Label for a Creative Commons link such as `/licenses/by-nc/2.0/` or
/// `/creativecommons/by-nc-2.0/`, including licenses outside the table.
pub fn label_from_url(url: &str) -> Option<String> {
    if let Some(license) = normalize(url) {
        return Some(license.label.to_string());
    }
    let captures = CC_PATH.captures(url)?;
    Some(format!("CC {} {}", captures[1].to_uppercase(), &captures[2]))
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CC BY-SA 4.0", "CC BY-SA 4.0")]
    #[case("Attribution-ShareAlike 4.0 International (CC BY-SA 4.0)", "CC BY-SA 4.0")]
    #[case("Some rights reserved: cc by 2.0", "CC BY 2.0")]
    #[case("CCBY-SA2.0", "CC BY-SA 2.0")]
    #[case("https://creativecommons.org/licenses/by-sa/2.0/", "CC BY-SA 2.0")]
    #[case("https://creativecommons.org/publicdomain/zero/1.0/", "CC0 1.0")]
    #[case("Public Domain Mark 1.0", "Public Domain Mark")]
    #[case("Attribution 4.0 International", "CC BY 4.0")]
    fn test_normalize(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(normalize(text).map(|license| license.label), Some(expected));
    }

    #[rstest]
    #[case("/creativecommons/by-nc-2.0/", Some("CC BY-NC 2.0"))]
    #[case("https://creativecommons.org/licenses/by-nc-sa/4.0/", Some("CC BY-NC-SA 4.0"))]
    #[case("/creativecommons/by-sa-2.0/", Some("CC BY-SA 2.0"))]
    #[case("/help/general/", None)]
    fn test_label_from_url(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(label_from_url(url).as_deref(), expected);
    }

    #[test]
    fn test_share_alike_never_matches_shorter_label() {
        let license = normalize("Licensed under CC BY-SA 4.0").unwrap();
        assert_eq!(license.kind, LicenseKind::AttributionShareAlike4);
        assert_ne!(license.kind, LicenseKind::Attribution4);
    }

    #[test]
    fn test_unknown_text_is_unmatched() {
        assert!(normalize("All rights reserved").is_none());
        assert!(normalize("CC BY-NC 2.0").is_none());
    }

    #[rstest]
    #[case("4", "CC BY 2.0")]
    #[case("5", "CC BY-SA 2.0")]
    #[case("9", "CC0 1.0")]
    #[case("10", "Public Domain Mark")]
    #[case("11", "CC BY 4.0")]
    #[case(" 12 ", "CC BY-SA 4.0")]
    fn test_from_code(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(from_code(code).map(|license| license.label), Some(expected));
    }

    #[test]
    fn test_canonical_label_keeps_unknown_text() {
        assert_eq!(canonical_label("12"), Some("CC BY-SA 4.0".to_string()));
        assert_eq!(canonical_label("  All rights reserved "), Some("All rights reserved".to_string()));
        assert_eq!(canonical_label("   "), None);
    }

    #[test]
    fn test_all_codes() {
        assert_eq!(all_codes().join(","), "4,5,9,10,11,12");
    }
}
