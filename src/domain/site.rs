//! Site profiles
//!
//! Everything that differs between the supported photo-hosting sites lives
//! here, so the parsing and download code stays site-agnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::photo::PhotoReference;

/// Supported photo-hosting sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    #[default]
    Flickr,
    Geograph,
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flickr" => Ok(Self::Flickr),
            "geograph" => Ok(Self::Geograph),
            other => Err(format!("unknown site '{other}' (expected 'flickr' or 'geograph')")),
        }
    }
}

impl SiteKind {
    /// Lowercase tag used in filenames.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Flickr => "flickr",
            Self::Geograph => "geograph",
        }
    }

    pub fn profile(self) -> SiteProfile {
        match self {
            Self::Flickr => SiteProfile::flickr(),
            Self::Geograph => SiteProfile::geograph(),
        }
    }
}

/// How a thumbnail or variant URL is rewritten to its largest rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUpgradeRule {
    /// `..._n.jpg` style: a single letter right before the extension.
    TrailingLetterToken { target: char },
    /// `..._120x120.jpg` style: a dimension suffix that is simply dropped.
    StripDimensionSuffix,
}

/// Layouts the candidate lister knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingPattern {
    /// Tiles whose inline `style` carries a `url(...)` thumbnail.
    InlineStyleThumbnail,
    /// Anchors whose href points at a photo page.
    AnchorHref,
    /// Absolute photo page URLs anywhere in the raw document text.
    RawTextUrl,
    /// Photo objects inside embedded JSON payloads.
    EmbeddedJson,
}

/// Static description of one photo-hosting site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub kind: SiteKind,
    pub display_name: &'static str,
    pub base_url: &'static str,
    /// Substring of a final response URL that means "you were sent to log in".
    pub login_marker: &'static str,
    pub size_upgrade: SizeUpgradeRule,
    pub listing_patterns: &'static [ListingPattern],
    /// Regex capturing `(owner, id)` or `(id)` from a photo page path.
    pub photo_path_pattern: &'static str,
    /// Whether original-size downloads can be requested with a page secret.
    pub token_download: bool,
    /// Thumbnail alt text reads `GRIDREF : Title by Photographer`.
    pub alt_text_hints: bool,
}

impl SiteProfile {
    pub fn flickr() -> Self {
        Self {
            kind: SiteKind::Flickr,
            display_name: "Flickr",
            base_url: "https://www.flickr.com",
            login_marker: "login",
            size_upgrade: SizeUpgradeRule::TrailingLetterToken { target: 'b' },
            listing_patterns: &[
                ListingPattern::InlineStyleThumbnail,
                ListingPattern::AnchorHref,
                ListingPattern::RawTextUrl,
                ListingPattern::EmbeddedJson,
            ],
            photo_path_pattern: r#"/photos/([^/?#\s"'<>]+)/(\d+)"#,
            token_download: true,
            alt_text_hints: false,
        }
    }

    pub fn geograph() -> Self {
        Self {
            kind: SiteKind::Geograph,
            display_name: "Geograph",
            base_url: "https://www.geograph.org.uk",
            login_marker: "login",
            size_upgrade: SizeUpgradeRule::StripDimensionSuffix,
            listing_patterns: &[ListingPattern::AnchorHref, ListingPattern::RawTextUrl],
            photo_path_pattern: r"/photo/(\d+)",
            token_download: false,
            alt_text_hints: true,
        }
    }

    /// Detail page URL for a photo id.
    pub fn photo_page_url(&self, id: &str, owner: Option<&str>) -> String {
        match (self.kind, owner) {
            (SiteKind::Flickr, Some(owner)) => format!("{}/photos/{owner}/{id}/", self.base_url),
            (SiteKind::Flickr, None) => format!("{}/photo.gne?id={id}", self.base_url),
            (SiteKind::Geograph, _) => format!("{}/photo/{id}", self.base_url),
        }
    }

    /// The secondary "all sizes" page for a reference, if the site has one.
    pub fn sizes_page_url(&self, reference: &PhotoReference) -> Option<String> {
        match self.kind {
            SiteKind::Flickr => {
                let owner = reference.owner_handle.as_deref()?;
                Some(format!("{}/photos/{owner}/{}/sizes/", self.base_url, reference.id))
            }
            SiteKind::Geograph => Some(format!("{}/more.php?id={}", self.base_url, reference.id)),
        }
    }

    /// Whether a final response URL landed on a login page.
    pub fn is_auth_wall(&self, final_url: &str) -> bool {
        final_url.to_ascii_lowercase().contains(self.login_marker)
    }
}
