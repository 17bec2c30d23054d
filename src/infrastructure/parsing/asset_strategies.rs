//! Document-level asset URL strategies
//!
//! Finds the candidate asset URLs one document offers: an explicit download
//! link, the displayed image (already upgraded to the largest rendition) and
//! a token-authenticated original URL. Choosing between them, and walking to
//! the sizes page, is the asset locator's job.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::config::AssetSelectors;
use super::document::{ParsedDocument, PhotoDocument};
use super::strategy::{BodyPattern, Cascade, EmbeddedValue, ExtractionStrategy, FnStrategy, MetaContent, TextStrategyExt};
use super::url_rewrite::{absolutize, original_download_url, upgrade_size};
use super::compile_selectors;
use crate::domain::{PhotoReference, SiteKind, SiteProfile};
use crate::infrastructure::parsing_error::ParsingResult;

static HEX_SECRET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-f0-9]+$").expect("static regex"));

static ANY_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Asset URLs found in a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentAssets {
    pub download_link: Option<String>,
    /// Display image after the size upgrade
    pub display_image: Option<String>,
    pub token_original: Option<String>,
}

/// Compiled asset strategies for one site.
pub struct AssetStrategies {
    profile: SiteProfile,
    download_link: Cascade<String>,
    display_image: Cascade<String>,
    secret: Cascade<String>,
}

impl AssetStrategies {
    pub fn new(profile: SiteProfile, selectors: &AssetSelectors) -> ParsingResult<Self> {
        let download_selectors = compile_selectors("download_link", &selectors.download_link)?;
        let display_selectors = compile_selectors("display_image", &selectors.display_image)?;

        Ok(Self {
            download_link: Cascade::new("download_link")
                .then(linked_url("download_markup", download_selectors, "href"))
                .then(FnStrategy::new("download_text", download_by_text)),

            display_image: Cascade::new("display_image")
                .then(linked_url("display_markup", display_selectors, "src"))
                .then(resolved(MetaContent::new(&["og:image", "twitter:image"])?))
                .then(resolved(EmbeddedValue::new(&["displayUrl", "display_url"])?)),

            secret: Cascade::new("secret")
                .then(EmbeddedValue::new(&["secret"])?.map(hex_secret))
                .then(BodyPattern::new("secret_attribute", r#"data-secret=["']([a-f0-9]+)["']"#)?),

            profile,
        })
    }

    pub fn for_site(site: SiteKind) -> ParsingResult<Self> {
        Self::new(site.profile(), &AssetSelectors::default())
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Run every document-level strategy against `document`.
    pub fn inspect(&self, reference: &PhotoReference, document: &PhotoDocument) -> DocumentAssets {
        let parsed = document.parse();

        let token_original = if self.profile.token_download {
            self.secret
                .resolve(&parsed)
                .map(|secret| original_download_url(self.profile.base_url, &reference.id, &secret))
        } else {
            None
        };

        DocumentAssets {
            download_link: self.download_link.resolve(&parsed),
            display_image: self
                .display_image
                .resolve(&parsed)
                .map(|url| upgrade_size(&url, self.profile.size_upgrade)),
            token_original,
        }
    }
}

/// Absolute URL from an attribute of the first matching element.
fn linked_url(
    name: &'static str,
    selectors: Vec<Selector>,
    attribute: &'static str,
) -> impl ExtractionStrategy<String> + 'static {
    FnStrategy::new(name, move |document: &ParsedDocument<'_>| {
        selectors.iter().find_map(|selector| {
            document
                .html
                .select(selector)
                .find_map(|element| element.value().attr(attribute).and_then(|value| absolutize(value, document.url)))
        })
    })
}

/// A text strategy whose result is resolved against the document URL.
fn resolved<S>(inner: S) -> impl ExtractionStrategy<String> + 'static
where
    S: ExtractionStrategy<String> + 'static,
{
    FnStrategy::new("resolved", move |document: &ParsedDocument<'_>| {
        inner
            .try_extract(document)
            .and_then(|value| absolutize(&value, document.url))
    })
}

/// Anchors whose visible text offers a download or the original size.
fn download_by_text(document: &ParsedDocument<'_>) -> Option<String> {
    document.html.select(&ANY_LINK).find_map(|anchor| {
        let text = anchor.text().collect::<String>().to_lowercase();
        if !(text.contains("download") || text.contains("original")) {
            return None;
        }
        let href = absolutize(anchor.value().attr("href")?, document.url)?;
        (href != document.url).then_some(href)
    })
}

fn hex_secret(raw: String) -> Option<String> {
    HEX_SECRET.is_match(&raw).then_some(raw)
}
