//! Candidate listing from search and listing pages
//!
//! Each layout the site profile declares is tried in turn and all matches
//! are accumulated; a photo id is kept only at its first occurrence. Finding
//! nothing is a normal outcome, not an error.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use super::config::ListingSelectors;
use super::document::PhotoDocument;
use super::url_rewrite::absolutize;
use super::compile_selectors;
use super::strategy::{clean_text, unescape_json};
use crate::domain::{ListingHints, ListingPattern, PhotoReference, SiteKind, SiteProfile};
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

static STYLE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("static regex"));

/// Photo id embedded in a static thumbnail filename: `<id>_<secret>[_<size>].<ext>`
static THUMBNAIL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4,})_[0-9a-f]+(?:_[a-z0-9]+)?\.(?:jpe?g|png|gif)").expect("static regex"));

/// Flat JSON objects; photo objects never nest in the payloads we read.
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("static regex"));

static JSON_PHOTO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""id"\s*:\s*"?(\d{4,})"?"#).expect("static regex"));

static JSON_OWNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:pathAlias|ownerNsid|owner|username)"\s*:\s*"((?:[^"\\]|\\.)+)""#).expect("static regex")
});

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

static IMAGE_ALT: Lazy<Selector> = Lazy::new(|| Selector::parse("img[alt]").expect("static selector"));

/// Extracts ordered, deduplicated photo references from listing documents.
pub struct CandidateLister {
    profile: SiteProfile,
    tile_selectors: Vec<Selector>,
    anchor_selectors: Vec<Selector>,
    photo_path: Regex,
    raw_url: Regex,
    site_host: Option<String>,
}

impl CandidateLister {
    pub fn new(profile: SiteProfile, selectors: &ListingSelectors) -> ParsingResult<Self> {
        let photo_path = Regex::new(profile.photo_path_pattern)
            .map_err(|e| ParsingError::invalid_pattern("photo_path", e))?;
        let raw_pattern = format!(
            r"https?://(?:www\.)?{}{}",
            regex::escape(bare_host(profile.base_url).unwrap_or_default().as_str()),
            profile.photo_path_pattern
        );
        let raw_url = Regex::new(&raw_pattern).map_err(|e| ParsingError::invalid_pattern("raw_url", e))?;

        Ok(Self {
            tile_selectors: compile_selectors("thumbnail_tile", &selectors.thumbnail_tile)?,
            anchor_selectors: compile_selectors("photo_anchor", &selectors.photo_anchor)?,
            site_host: bare_host(profile.base_url),
            profile,
            photo_path,
            raw_url,
        })
    }

    /// Lister with the default selectors for a site.
    pub fn for_site(site: SiteKind) -> ParsingResult<Self> {
        Self::new(site.profile(), &ListingSelectors::default())
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// All photo references in `document`, first occurrence wins.
    pub fn list(&self, document: &PhotoDocument) -> Vec<PhotoReference> {
        let html = Html::parse_document(&document.body);
        let mut found = Accumulator::default();

        for pattern in self.profile.listing_patterns {
            let before = found.references.len();
            match pattern {
                ListingPattern::InlineStyleThumbnail => self.collect_inline_tiles(&html, &mut found),
                ListingPattern::AnchorHref => self.collect_anchors(&html, &document.url, &mut found),
                ListingPattern::RawTextUrl => self.collect_raw_urls(&document.body, &mut found),
                ListingPattern::EmbeddedJson => self.collect_embedded_json(&document.body, &mut found),
            }
            debug!(
                "Listing pattern {:?} added {} candidates",
                pattern,
                found.references.len() - before
            );
        }

        found.references
    }

    fn collect_inline_tiles(&self, html: &Html, found: &mut Accumulator) {
        for selector in &self.tile_selectors {
            for tile in html.select(selector) {
                let Some(style) = tile.value().attr("style") else { continue };
                let Some(thumbnail) = STYLE_URL.captures(style).map(|caps| caps[1].to_string()) else {
                    continue;
                };
                let Some(id) = THUMBNAIL_ID.captures(&thumbnail).map(|caps| caps[1].to_string()) else {
                    continue;
                };
                let owner = self.owner_near(tile);
                found.push(self.reference(id, owner));
            }
        }
    }

    /// Owner handle from an anchor inside or around a thumbnail tile.
    fn owner_near(&self, tile: ElementRef<'_>) -> Option<String> {
        let inside = tile.select(&ANCHOR).filter_map(|a| a.value().attr("href"));
        let around = tile
            .ancestors()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().name() == "a")
            .filter_map(|a| a.value().attr("href"));

        inside
            .chain(around)
            .find_map(|href| self.parse_photo_path(href).and_then(|(_, owner)| owner))
    }

    fn collect_anchors(&self, html: &Html, document_url: &str, found: &mut Accumulator) {
        for selector in &self.anchor_selectors {
            for anchor in html.select(selector) {
                let Some(href) = anchor.value().attr("href") else { continue };
                let Some(absolute) = absolutize(href, document_url) else { continue };
                if !self.is_same_site(&absolute) {
                    continue;
                }
                if let Some((id, owner)) = self.parse_photo_path(&absolute) {
                    let reference = self.reference(id, owner);
                    let hints = self.anchor_hints(anchor);
                    found.push(reference.with_hints(hints));
                }
            }
        }
    }

    fn anchor_hints(&self, anchor: ElementRef<'_>) -> ListingHints {
        if !self.profile.alt_text_hints {
            return ListingHints::default();
        }
        anchor
            .select(&IMAGE_ALT)
            .find_map(|image| image.value().attr("alt").and_then(clean_text))
            .map(|alt| parse_alt_text(&alt))
            .unwrap_or_default()
    }

    fn collect_raw_urls(&self, body: &str, found: &mut Accumulator) {
        for captures in self.raw_url.captures_iter(body) {
            if let Some((id, owner)) = self.split_captures(&captures) {
                found.push(self.reference(id, owner));
            }
        }
    }

    fn collect_embedded_json(&self, body: &str, found: &mut Accumulator) {
        for object in JSON_OBJECT.find_iter(body) {
            let object = object.as_str();
            let Some(id) = JSON_PHOTO_ID.captures(object).map(|caps| caps[1].to_string()) else {
                continue;
            };
            // Only objects that look like photos: they name an owner.
            let Some(owner) = JSON_OWNER
                .captures(object)
                .and_then(|caps| unescape_json(&caps[1]))
            else {
                continue;
            };
            found.push(self.reference(id, Some(owner)));
        }
    }

    /// `(id, owner)` from anything containing a photo page path.
    fn parse_photo_path(&self, text: &str) -> Option<(String, Option<String>)> {
        self.photo_path
            .captures(text)
            .and_then(|captures| self.split_captures(&captures))
    }

    fn split_captures(&self, captures: &regex::Captures<'_>) -> Option<(String, Option<String>)> {
        match captures.len() {
            3 => Some((captures.get(2)?.as_str().to_string(), Some(captures.get(1)?.as_str().to_string()))),
            2 => Some((captures.get(1)?.as_str().to_string(), None)),
            _ => None,
        }
    }

    fn is_same_site(&self, url: &str) -> bool {
        match (&self.site_host, bare_host(url)) {
            (Some(site), Some(host)) => *site == host,
            _ => false,
        }
    }

    fn reference(&self, id: String, owner: Option<String>) -> PhotoReference {
        let canonical_url = self.profile.photo_page_url(&id, owner.as_deref());
        PhotoReference::new(id, owner, canonical_url)
    }
}

/// `GRIDREF : Title by Photographer`; text without the separator is all title.
pub fn parse_alt_text(alt: &str) -> ListingHints {
    let Some((grid_reference, rest)) = alt.split_once(" : ") else {
        return ListingHints {
            title: clean_text(alt),
            ..ListingHints::default()
        };
    };
    let (title, photographer) = match rest.rsplit_once(" by ") {
        Some((title, photographer)) => (title, clean_text(photographer)),
        None => (rest, None),
    };
    ListingHints {
        title: clean_text(title),
        photographer,
        grid_reference: clean_text(grid_reference),
    }
}

/// Host without a leading `www.`.
fn bare_host(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_ascii_lowercase())
}

#[derive(Default)]
struct Accumulator {
    seen: HashSet<String>,
    references: Vec<PhotoReference>,
}

impl Accumulator {
    fn push(&mut self, reference: PhotoReference) {
        if self.seen.insert(reference.id.clone()) {
            self.references.push(reference);
        }
    }
}
