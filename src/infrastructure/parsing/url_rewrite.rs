//! Pure URL rewrites used while locating assets

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::SizeUpgradeRule;

static SIZE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_[a-z]\.(jpe?g|png|gif)$").expect("static regex"));

static DIMENSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_\d+x\d+(\.(?:jpe?g|png|gif))$").expect("static regex"));

/// Rewrite a variant URL to the largest rendition under `rule`.
///
/// URLs without a recognizable size marker are returned unchanged. Query
/// strings and fragments are preserved.
pub fn upgrade_size(url: &str, rule: SizeUpgradeRule) -> String {
    let (path, suffix) = split_suffix(url);
    let upgraded = match rule {
        SizeUpgradeRule::TrailingLetterToken { target } => {
            SIZE_TOKEN.replace(path, |caps: &regex::Captures<'_>| format!("_{target}.{}", &caps[1]))
        }
        SizeUpgradeRule::StripDimensionSuffix => DIMENSION_SUFFIX.replace(path, "$1"),
    };
    format!("{upgraded}{suffix}")
}

/// Token-authenticated original-size download URL.
pub fn original_download_url(base_url: &str, id: &str, secret: &str) -> String {
    format!("{}/photo_download.gne?id={id}&secret={secret}&size=o", base_url.trim_end_matches('/'))
}

/// Resolve `href` against the document it was found in.
///
/// Protocol-relative links get `https:`. Returns `None` for links that are
/// not http(s) once resolved (`javascript:`, `mailto:` and the like).
pub fn absolutize(href: &str, document_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = if let Some(rest) = href.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else {
        match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(document_url).ok()?.join(href).ok()?,
            Err(_) => return None,
        }
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Lowercase file extension of a URL path, if it has a plausible one.
pub fn extension_of(url: &str) -> Option<String> {
    let (path, _) = split_suffix(url);
    let file = path.rsplit('/').next()?;
    let (_, extension) = file.rsplit_once('.')?;
    let extension = extension.to_ascii_lowercase();
    let plausible = !extension.is_empty() && extension.len() <= 5 && extension.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(extension)
}

fn split_suffix(url: &str) -> (&str, &str) {
    match url.find(['?', '#']) {
        Some(index) => url.split_at(index),
        None => (url, ""),
    }
}
