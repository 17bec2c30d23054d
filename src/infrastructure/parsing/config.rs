//! Selector configuration for HTML extraction
//!
//! Centralized CSS selector lists. Each list is tried in order; the defaults
//! cover the markup generations seen on the supported sites and can be
//! overridden from the `[parsing]` section of the config file.

use serde::{Deserialize, Serialize};

/// Main parsing configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub listing: ListingSelectors,

    pub detail: PhotoDetailSelectors,

    pub assets: AssetSelectors,
}

/// CSS selectors for listing/search pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Tiles whose inline style carries a thumbnail `url(...)`
    pub thumbnail_tile: Vec<String>,

    /// Anchors that may point at photo pages
    pub photo_anchor: Vec<String>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            thumbnail_tile: strings(&["[style*='url(']"]),
            photo_anchor: strings(&["a[href]"]),
        }
    }
}

/// CSS selectors for photo detail pages, one list per field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoDetailSelectors {
    pub title: Vec<String>,

    pub description: Vec<String>,

    pub photographer: Vec<String>,

    /// Links whose text or href names the license
    pub license_link: Vec<String>,

    pub tags: Vec<String>,

    pub date_taken: Vec<String>,

    pub view_count: Vec<String>,

    /// Link naming the place the photo was taken
    pub place_link: Vec<String>,
}

impl Default for PhotoDetailSelectors {
    fn default() -> Self {
        Self {
            title: strings(&["h1.photo-title", ".photo-title h1", "h1[itemprop='name']", "#photo_title"]),
            description: strings(&[".photo-desc", "div.description", "[itemprop='description']"]),
            photographer: strings(&[
                "a.owner-name",
                ".attribution-info .owner-name",
                "span.attribution-info",
                "span.username",
                "[itemprop='author'] [itemprop='name']",
                "a[rel='author']",
            ]),
            license_link: strings(&[
                "a[href*='/creativecommons/']",
                "a[rel='license']",
                "a[href*='creativecommons.org/licenses']",
                "a[href*='creativecommons.org/publicdomain']",
                ".photo-license-info a",
            ]),
            tags: strings(&["a.tag", "ul.tags-list a", ".tags a", "a[rel='tag']"]),
            date_taken: strings(&["span.date-taken", ".date-taken-label", "[itemprop='dateCreated']"]),
            view_count: strings(&[".view-count-label", ".view-count .stat-number", "[itemprop='interactionCount']"]),
            place_link: strings(&[
                "a.location-link",
                ".photo-location a",
                "[itemprop='contentLocation'] [itemprop='name']",
            ]),
        }
    }
}

/// CSS selectors used to locate downloadable assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSelectors {
    /// Explicit download affordances; anchors whose text mentions
    /// "download" or "original" are considered as well
    pub download_link: Vec<String>,

    /// The primary displayed image
    pub display_image: Vec<String>,
}

impl Default for AssetSelectors {
    fn default() -> Self {
        Self {
            download_link: strings(&["a[data-track*='download']", "a.download-link", "a[download]"]),
            display_image: strings(&["img.main-photo", "#allsizes-photo img", "img#mainphoto", "img.photo"]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
