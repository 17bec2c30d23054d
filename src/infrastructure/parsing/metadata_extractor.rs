//! Photo detail page metadata extraction
//!
//! Every field has its own [`Cascade`], ordered from the most specific source
//! to the least:
//! 1. semantic markup (dedicated classes and itemprops)
//! 2. page-level `<meta>` annotations and `<title>`
//! 3. key/value pairs inside inline script payloads
//! 4. regex over the raw body
//!
//! Missing fields are simply absent; extraction never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::config::PhotoDetailSelectors;
use super::document::{ParsedDocument, PhotoDocument};
use super::strategy::{
    BodyPattern, Cascade, DocumentTitle, EmbeddedValue, ExtractionStrategy, FnStrategy, MetaContent, SelectorAllTexts,
    SelectorText, TextStrategyExt, clean_text, dedupe,
};
use super::compile_selectors;
use crate::domain::{PhotoLocation, PhotoMetadata, PhotoReference, license};
use crate::infrastructure::parsing_error::ParsingResult;

pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_PHOTOGRAPHER: &str = "Unknown";

static ALL_SIZES_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^all sizes\s*(?:\|\s*|of\s+)").expect("static regex"));

static TAKEN_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^taken\s+(?:on\s+)?").expect("static regex"));

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").expect("static regex"));

static BODY_LATITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?\blat(?:itude)?["']?\s*[:=]\s*["']?(-?\d{1,3}\.\d+)"#).expect("static regex")
});

static BODY_LONGITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?\b(?:lon|lng|longitude)["']?\s*[:=]\s*["']?(-?\d{1,3}\.\d+)"#).expect("static regex")
});

/// Builds [`PhotoMetadata`] from a detail document.
pub struct MetadataExtractor {
    title: Cascade<String>,
    description: Cascade<String>,
    photographer: Cascade<String>,
    license: Cascade<String>,
    tags: Cascade<Vec<String>>,
    date_taken: Cascade<String>,
    view_count: Cascade<u64>,
    place_name: Cascade<String>,
    coordinates: Cascade<(f64, f64)>,
    country: Cascade<String>,
    region: Cascade<String>,
    grid_reference: Cascade<String>,
}

impl MetadataExtractor {
    pub fn new(selectors: &PhotoDetailSelectors) -> ParsingResult<Self> {
        Ok(Self {
            title: Cascade::new("title")
                .then(SelectorText::new("title_markup", &selectors.title)?.map(clean_title))
                .then(MetaContent::new(&["og:title", "twitter:title", "title"])?.map(clean_title))
                .then(DocumentTitle::new()?.map(clean_title))
                .then(EmbeddedValue::new(&["title"])?.map(clean_title))
                .then(BodyPattern::new("title_heading", r"(?is)<h1[^>]*>\s*([^<]+?)\s*</h1>")?.map(clean_title)),

            description: Cascade::new("description")
                .then(SelectorText::new("description_markup", &selectors.description)?)
                .then(MetaContent::new(&["og:description", "description", "twitter:description"])?)
                .then(EmbeddedValue::new(&["description"])?),

            photographer: Cascade::new("photographer")
                .then(SelectorText::new("photographer_markup", &selectors.photographer)?.map(clean_photographer))
                .then(MetaContent::new(&["author", "article:author"])?.map(clean_photographer))
                .then(EmbeddedValue::new(&["ownerName", "realname", "username", "author"])?.map(clean_photographer))
                .then(BodyPattern::new(
                    "photographer_text",
                    r"(?i)photo(?:graph)?\s+(?:taken\s+)?by\s*:?\s*<a[^>]*>\s*([^<]+?)\s*</a>",
                )?),

            license: Cascade::new("license")
                .then(license_link(selectors)?)
                .then(MetaContent::new(&["license", "dc.rights", "dcterms.license"])?)
                .then(EmbeddedValue::new(&["license", "licenseId", "license_id"])?)
                .then(BodyPattern::new(
                    "license_text",
                    r"(?i)\b(CC\s*BY(?:-SA)?\s*[0-9]\.[0-9]|CC0\s*1\.0|Public Domain Mark(?:\s*1\.0)?)",
                )?),

            tags: Cascade::new("tags")
                .then(SelectorAllTexts::new("tags_markup", &selectors.tags)?)
                .then(MetaContent::new(&["keywords"])?.map(split_keywords)),

            date_taken: Cascade::new("date_taken")
                .then(SelectorText::new("date_markup", &selectors.date_taken)?.map(clean_date))
                .then(MetaContent::new(&["dateCreated", "article:published_time"])?)
                .then(EmbeddedValue::new(&["dateCreated", "dateTaken", "date_taken"])?)
                .then(BodyPattern::new("date_text", r"(?i)taken\s+on\s+([A-Z][a-z]+\s+\d{1,2},\s+\d{4})")?),

            view_count: Cascade::new("view_count")
                .then(SelectorText::new("views_markup", &selectors.view_count)?.map(parse_count))
                .then(EmbeddedValue::new(&["viewCount", "views"])?.map(parse_count))
                .then(BodyPattern::new("views_text", r"(?i)([\d,]+)\s*views?\b")?.map(parse_count)),

            place_name: Cascade::new("place_name")
                .then(SelectorText::new("place_markup", &selectors.place_link)?)
                .then(MetaContent::new(&["geo.placename"])?)
                .then(BodyPattern::new(
                    "place_json_ld",
                    r#""name"\s*:\s*"([^"]+)"[^{}]*"@type"\s*:\s*"Place""#,
                )?),

            coordinates: coordinates_cascade()?,

            country: Cascade::new("country")
                .then(MetaContent::new(&["geo.country", "og:country-name"])?)
                .then(EmbeddedValue::new(&["addressCountry", "country"])?),

            region: Cascade::new("region")
                .then(MetaContent::new(&["geo.region", "og:region"])?)
                .then(EmbeddedValue::new(&["addressRegion", "region"])?),

            grid_reference: Cascade::new("grid_reference")
                .then(
                    BodyPattern::new("gridref_link", r#"(?i)href="[^"]*/gridref/([A-Z]{1,3}\s?\d{2,10})""#)?
                        .map(clean_grid_reference),
                )
                .then(
                    BodyPattern::new(
                        "gridref_text",
                        r"(?i)grid\s*ref(?:erence)?\s*:?\s*(?:<[^>]+>\s*)*([A-Z]{1,3}\s?\d{2,10})\b",
                    )?
                    .map(clean_grid_reference),
                ),
        })
    }

    pub fn with_defaults() -> ParsingResult<Self> {
        Self::new(&PhotoDetailSelectors::default())
    }

    /// Extract everything the document offers about `reference`.
    pub fn extract(&self, reference: &PhotoReference, document: &PhotoDocument) -> PhotoMetadata {
        let parsed = document.parse();
        let metadata = PhotoMetadata {
            id: reference.id.clone(),
            title: self
                .title
                .resolve(&parsed)
                .or_else(|| reference.hints.title.clone())
                .unwrap_or_else(|| UNTITLED.to_string()),
            description: self.description.resolve(&parsed),
            photographer_name: self
                .photographer
                .resolve(&parsed)
                .or_else(|| reference.hints.photographer.clone())
                .or_else(|| reference.owner_handle.clone())
                .unwrap_or_else(|| UNKNOWN_PHOTOGRAPHER.to_string()),
            license: self.license.resolve(&parsed).and_then(|raw| license::canonical_label(&raw)),
            tags: self.tags.resolve(&parsed).unwrap_or_default(),
            location: self.location(&parsed, reference),
            date_taken: self.date_taken.resolve(&parsed),
            view_count: self.view_count.resolve(&parsed),
        };

        debug!(
            id = %metadata.id,
            title = %metadata.title,
            photographer = %metadata.photographer_name,
            license = ?metadata.license,
            tags = metadata.tags.len(),
            has_location = metadata.location.is_some(),
            "Extracted metadata"
        );
        metadata
    }

    /// Named place, coordinate pair and address parts are looked up
    /// independently; the location exists if any of them produced something.
    fn location(&self, parsed: &ParsedDocument<'_>, reference: &PhotoReference) -> Option<PhotoLocation> {
        let coordinates = self.coordinates.resolve(parsed);
        let location = PhotoLocation {
            latitude: coordinates.map(|(latitude, _)| latitude),
            longitude: coordinates.map(|(_, longitude)| longitude),
            place_name: self.place_name.resolve(parsed),
            country: self.country.resolve(parsed),
            region: self.region.resolve(parsed),
            grid_reference: self
                .grid_reference
                .resolve(parsed)
                .or_else(|| reference.hints.grid_reference.clone()),
            gps_from_exif: false,
        };
        (!location.is_empty()).then_some(location)
    }
}

/// License from the first license link: its text when that names a known
/// license, then the license its href points at, then the text as written.
fn license_link(selectors: &PhotoDetailSelectors) -> ParsingResult<impl ExtractionStrategy<String> + 'static> {
    let compiled = compile_selectors("license_link", &selectors.license_link)?;
    Ok(FnStrategy::new("license_link", move |document: &ParsedDocument<'_>| {
        let link = compiled
            .iter()
            .find_map(|selector| document.html.select(selector).next())?;
        let text = clean_text(&link.text().collect::<String>());
        let href = link.value().attr("href").and_then(clean_text);

        let recognized = [text.as_deref(), href.as_deref()]
            .into_iter()
            .flatten()
            .find(|candidate| license::normalize(candidate).is_some())
            .map(str::to_string);
        recognized
            .or_else(|| href.as_deref().and_then(license::label_from_url))
            .or(text)
            .or(href)
    }))
}

fn coordinates_cascade() -> ParsingResult<Cascade<(f64, f64)>> {
    let geo_position = MetaContent::new(&["geo.position", "ICBM"])?;
    let place_latitude = MetaContent::new(&["place:location:latitude", "latitude"])?;
    let place_longitude = MetaContent::new(&["place:location:longitude", "longitude"])?;
    let embedded_latitude = EmbeddedValue::new(&["latitude", "lat"])?;
    let embedded_longitude = EmbeddedValue::new(&["longitude", "lng", "lon"])?;

    Ok(Cascade::new("coordinates")
        .then(geo_position.map(|raw| {
            let (latitude, longitude) = raw.split_once([';', ','])?;
            valid_coordinates(latitude, longitude)
        }))
        .then(FnStrategy::new("meta:place:location", move |document: &ParsedDocument<'_>| {
            valid_coordinates(
                &place_latitude.try_extract(document)?,
                &place_longitude.try_extract(document)?,
            )
        }))
        .then(FnStrategy::new("embedded:coordinates", move |document: &ParsedDocument<'_>| {
            valid_coordinates(
                &embedded_latitude.try_extract(document)?,
                &embedded_longitude.try_extract(document)?,
            )
        }))
        .then(FnStrategy::new("coordinates_text", |document: &ParsedDocument<'_>| {
            let latitude = BODY_LATITUDE.captures(document.body)?;
            let longitude = BODY_LONGITUDE.captures(document.body)?;
            valid_coordinates(&latitude[1], &longitude[1])
        })))
}

/// Parsed, in-range coordinates; `0,0` is how sites say "not geotagged".
fn valid_coordinates(latitude: &str, longitude: &str) -> Option<(f64, f64)> {
    let latitude: f64 = latitude.trim().parse().ok()?;
    let longitude: f64 = longitude.trim().parse().ok()?;
    let in_range = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
    let unset = latitude == 0.0 && longitude == 0.0;
    (in_range && !unset).then_some((latitude, longitude))
}

/// Strip site chrome from a title: the "All sizes" prefix of sizes pages
/// and the " | Site" suffix.
pub fn clean_title(raw: String) -> Option<String> {
    let unprefixed = ALL_SIZES_PREFIX.replace(raw.trim(), "");
    let head = unprefixed.split(" | ").next().unwrap_or_default();
    let head = head.split(" :: ").next().unwrap_or_default();
    let title = clean_text(head)?;
    let chrome = ["all sizes", "flickr", "geograph"];
    (!chrome.contains(&title.to_lowercase().as_str())).then_some(title)
}

/// `sk 1234` and `SK1234` are the same square.
fn clean_grid_reference(raw: String) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (!compact.is_empty()).then(|| compact.to_ascii_uppercase())
}

fn clean_photographer(raw: String) -> Option<String> {
    let name = raw.trim().trim_start_matches("by ").trim();
    clean_text(name)
}

fn clean_date(raw: String) -> Option<String> {
    clean_text(&TAKEN_PREFIX.replace(raw.trim(), ""))
}

fn split_keywords(raw: String) -> Option<Vec<String>> {
    let tags = dedupe(raw.split(',').filter_map(clean_text));
    (!tags.is_empty()).then_some(tags)
}

/// First number in the text, thousands separators allowed.
pub fn parse_count(raw: String) -> Option<u64> {
    let number = FIRST_NUMBER.find(&raw)?;
    number.as_str().replace(',', "").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListingHints;

    fn reference(owner: Option<&str>) -> PhotoReference {
        PhotoReference::new(
            "53012345678",
            owner.map(str::to_string),
            "https://www.flickr.com/photos/alice/53012345678/",
        )
    }

    fn extract(body: &str, owner: Option<&str>) -> PhotoMetadata {
        let extractor = MetadataExtractor::with_defaults().unwrap();
        let document = PhotoDocument::new("https://www.flickr.com/photos/alice/53012345678/", body);
        extractor.extract(&reference(owner), &document)
    }

    #[test]
    fn test_semantic_markup_page() {
        let metadata = extract(
            r#"<html><head><title>Ignored | Flickr</title></head><body>
                <h1 class="photo-title">Lake Bled at dawn</h1>
                <div class="photo-desc"><p>Fog over   the water.</p></div>
                <a class="owner-name" href="/photos/alice/">Alice Moreau</a>
                <a href="/creativecommons/by-sa-2.0/" class="photo-license-url">Some rights reserved</a>
                <a class="tag">lake</a><a class="tag">fog</a>
                <span class="date-taken">Taken on June 4, 2019</span>
                <span class="view-count-label">12,345 views</span>
                <a class="location-link" href="/map">Bled, Slovenia</a>
            </body></html>"#,
            Some("alice"),
        );

        assert_eq!(metadata.id, "53012345678");
        assert_eq!(metadata.title, "Lake Bled at dawn");
        assert_eq!(metadata.description.as_deref(), Some("Fog over the water."));
        assert_eq!(metadata.photographer_name, "Alice Moreau");
        assert_eq!(metadata.license.as_deref(), Some("CC BY-SA 2.0"));
        assert_eq!(metadata.tags, vec!["lake".to_string(), "fog".to_string()]);
        assert_eq!(metadata.date_taken.as_deref(), Some("June 4, 2019"));
        assert_eq!(metadata.view_count, Some(12_345));
        let location = metadata.location.unwrap();
        assert_eq!(location.place_name.as_deref(), Some("Bled, Slovenia"));
        assert!(!location.has_coordinates());
    }

    #[test]
    fn test_generic_metadata_title_beats_untitled() {
        let metadata = extract(
            r#"<html><head><meta property="og:title" content="Misty Morning | Flickr"></head><body><div>no markers</div></body></html>"#,
            None,
        );
        assert_eq!(metadata.title, "Misty Morning");
    }

    #[test]
    fn test_document_title_and_sizes_prefix() {
        let metadata = extract(
            "<html><head><title>All sizes | Old Mill of Stone Bridge | Flickr - Photo Sharing!</title></head></html>",
            None,
        );
        assert_eq!(metadata.title, "Old Mill of Stone Bridge");
    }

    #[test]
    fn test_empty_page_uses_fallbacks() {
        let metadata = extract("<html><body></body></html>", Some("alice"));
        assert_eq!(metadata.title, UNTITLED);
        assert_eq!(metadata.photographer_name, "alice");
        assert_eq!(metadata.license, None);
        assert!(metadata.tags.is_empty());
        assert_eq!(metadata.location, None);

        let anonymous = extract("<html><body></body></html>", None);
        assert_eq!(anonymous.photographer_name, UNKNOWN_PHOTOGRAPHER);
    }

    #[test]
    fn test_embedded_payload_fields() {
        let metadata = extract(
            r#"<html><head><script>
                modelExport = {"title":"Harbour","description":"Boats","ownerName":"Bob","license":"12",
                    "viewCount":"4,321","dateCreated":"2020-05-01","latitude":59.91,"longitude":10.75,
                    "addressCountry":"Norway","addressRegion":"Oslo"};
            </script></head><body></body></html>"#,
            None,
        );

        assert_eq!(metadata.title, "Harbour");
        assert_eq!(metadata.description.as_deref(), Some("Boats"));
        assert_eq!(metadata.photographer_name, "Bob");
        assert_eq!(metadata.license.as_deref(), Some("CC BY-SA 4.0"));
        assert_eq!(metadata.view_count, Some(4_321));
        assert_eq!(metadata.date_taken.as_deref(), Some("2020-05-01"));
        let location = metadata.location.unwrap();
        assert_eq!((location.latitude, location.longitude), (Some(59.91), Some(10.75)));
        assert_eq!(location.country.as_deref(), Some("Norway"));
        assert_eq!(location.region.as_deref(), Some("Oslo"));
        assert_eq!(location.place_name, None);
    }

    #[test]
    fn test_free_text_fallbacks() {
        let metadata = extract(
            r#"<html><body><p>Photo by <a href="/people/x">Carol King</a>, licensed CC BY 4.0. 987 views.</p>
               <div data-lat="45.5" data-info='{"lng": -73.56}'></div></body></html>"#,
            None,
        );
        assert_eq!(metadata.photographer_name, "Carol King");
        assert_eq!(metadata.license.as_deref(), Some("CC BY 4.0"));
        assert_eq!(metadata.view_count, Some(987));
        let location = metadata.location.unwrap();
        assert_eq!(location.latitude, Some(45.5));
        assert_eq!(location.longitude, Some(-73.56));
    }

    #[test]
    fn test_longest_license_wins_on_link_text() {
        let metadata = extract(
            r#"<a rel="license" href="https://creativecommons.org/licenses/by-sa/4.0/">CC BY-SA 4.0</a>"#,
            None,
        );
        assert_eq!(metadata.license.as_deref(), Some("CC BY-SA 4.0"));
    }

    #[test]
    fn test_license_href_beats_unrecognized_link_text() {
        let metadata = extract(
            r#"<a href="/creativecommons/by-nc-2.0/" class="photo-license-url">Some rights reserved</a>"#,
            None,
        );
        assert_eq!(metadata.license.as_deref(), Some("CC BY-NC 2.0"));
    }

    #[test]
    fn test_grid_reference_from_page() {
        let metadata = extract(
            r#"<html><body><p>Grid Ref: <a href="https://www.geograph.org.uk/gridref/SK1234">sk 1234</a></p></body></html>"#,
            None,
        );
        let location = metadata.location.unwrap();
        assert_eq!(location.grid_reference.as_deref(), Some("SK1234"));
        assert!(!location.has_coordinates());

        let text_only = extract("<div>Grid Reference: <b>NT 2573</b></div>", None);
        assert_eq!(text_only.location.unwrap().grid_reference.as_deref(), Some("NT2573"));
    }

    #[test]
    fn test_listing_hints_fill_gaps() {
        let extractor = MetadataExtractor::with_defaults().unwrap();
        let reference = PhotoReference::new("8124576", None, "https://www.geograph.org.uk/photo/8124576").with_hints(
            ListingHints {
                title: Some("Old mill".to_string()),
                photographer: Some("Jane Doe".to_string()),
                grid_reference: Some("SK1234".to_string()),
            },
        );
        let document = PhotoDocument::new(&reference.canonical_url, "<html><body></body></html>");

        let metadata = extractor.extract(&reference, &document);

        assert_eq!(metadata.title, "Old mill");
        assert_eq!(metadata.photographer_name, "Jane Doe");
        assert_eq!(metadata.location.unwrap().grid_reference.as_deref(), Some("SK1234"));

        let page = PhotoDocument::new(
            &reference.canonical_url,
            r#"<h1 class="photo-title">Mill race</h1><p>Grid Ref: <a href="/gridref/SK1235">SK1235</a></p>"#,
        );
        let metadata = extractor.extract(&reference, &page);
        assert_eq!(metadata.title, "Mill race");
        assert_eq!(metadata.location.unwrap().grid_reference.as_deref(), Some("SK1235"));
    }

    #[test]
    fn test_zero_coordinates_are_ignored() {
        let metadata = extract(r#"<script>{"latitude":0,"longitude":0}</script>"#, None);
        assert_eq!(metadata.location, None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("1,234 views".to_string()), Some(1234));
        assert_eq!(parse_count("no numbers".to_string()), None);
    }
}
