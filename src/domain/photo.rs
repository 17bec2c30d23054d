use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A photo found on a listing page, before any detail page has been fetched.
///
/// Identity is the site-unique `id`; two references with the same id are the
/// same photo regardless of owner or URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoReference {
    pub id: String,
    pub owner_handle: Option<String>,
    pub canonical_url: String,
    /// What the listing thumbnail said about the photo
    #[serde(default, skip_serializing_if = "ListingHints::is_empty")]
    pub hints: ListingHints,
}

impl PhotoReference {
    pub fn new(id: impl Into<String>, owner_handle: Option<String>, canonical_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_handle: owner_handle.filter(|owner| !owner.trim().is_empty()),
            canonical_url: canonical_url.into(),
            hints: ListingHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: ListingHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Fallback values read off a listing tile, used only where the detail page
/// has nothing better.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photographer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_reference: Option<String>,
}

impl ListingHints {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.photographer.is_none() && self.grid_reference.is_none()
    }
}

/// Where a photo was taken. Each part is filled independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Ordnance Survey style grid square, e.g. `SK1234`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_reference: Option<String>,
    /// Coordinates came from the image's EXIF block, not the page
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub gps_from_exif: bool,
}

impl PhotoLocation {
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.place_name.is_none()
            && self.country.is_none()
            && self.region.is_none()
            && self.grid_reference.is_none()
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Attribution metadata for one photo. Only `id` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub photographer_name: String,
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub location: Option<PhotoLocation>,
    pub date_taken: Option<String>,
    pub view_count: Option<u64>,
}

impl PhotoMetadata {
    /// `Photo by <name> on <Site> (<license>)`; the license part is left out
    /// when it is unknown.
    pub fn attribution_text(&self, site_name: &str) -> String {
        match &self.license {
            Some(license) => format!("Photo by {} on {} ({})", self.photographer_name, site_name, license),
            None => format!("Photo by {} on {}", self.photographer_name, site_name),
        }
    }

    /// HTML attribution linking the photographer's name to the photo page.
    pub fn attribution_markup(&self, site_name: &str, page_url: &str) -> String {
        format!(
            r#"Photo by <a href="{}">{}</a> on {}"#,
            escape_html(page_url),
            escape_html(&self.photographer_name),
            escape_html(site_name)
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// One fully processed photo, as stored in `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub downloaded_at: DateTime<Utc>,
    pub source_url: String,
    pub page_url: String,
    pub attribution_text: String,
    pub attribution_markup: String,
    pub metadata: PhotoMetadata,
}

/// Counters written to `statistics.json` at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub processed: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub already_recorded: u64,
    pub failed: u64,
    pub interrupted: bool,
    pub ledger_size: u64,
    pub with_description: u64,
    pub with_location: u64,
    pub with_coordinates: u64,
    pub with_gps_exif: u64,
    pub with_grid_reference: u64,
    pub with_tags: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStatistics {
    /// Recomputes the coverage counters from the full ledger contents.
    pub fn update_coverage<'a>(&mut self, records: impl IntoIterator<Item = &'a DownloadRecord>) {
        self.ledger_size = 0;
        self.with_description = 0;
        self.with_location = 0;
        self.with_coordinates = 0;
        self.with_gps_exif = 0;
        self.with_grid_reference = 0;
        self.with_tags = 0;
        for record in records {
            let metadata = &record.metadata;
            self.ledger_size += 1;
            if metadata.description.is_some() {
                self.with_description += 1;
            }
            if let Some(location) = &metadata.location {
                self.with_location += 1;
                if location.has_coordinates() {
                    self.with_coordinates += 1;
                }
                if location.gps_from_exif {
                    self.with_gps_exif += 1;
                }
                if location.grid_reference.is_some() {
                    self.with_grid_reference += 1;
                }
            }
            if !metadata.tags.is_empty() {
                self.with_tags += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, metadata: PhotoMetadata) -> DownloadRecord {
        DownloadRecord {
            id: id.to_string(),
            filename: format!("flickr_{id}_owner.jpg"),
            size_bytes: 10,
            downloaded_at: Utc::now(),
            source_url: "https://live.staticflickr.com/1/1_a_b.jpg".to_string(),
            page_url: format!("https://www.flickr.com/photos/owner/{id}"),
            attribution_text: String::new(),
            attribution_markup: String::new(),
            metadata,
        }
    }

    #[test]
    fn test_reference_drops_blank_owner() {
        let reference = PhotoReference::new("1", Some("  ".to_string()), "https://example.com/1");
        assert_eq!(reference.owner_handle, None);
        assert!(reference.hints.is_empty());
    }

    #[test]
    fn test_grid_reference_alone_is_a_location() {
        let location = PhotoLocation {
            grid_reference: Some("NT2573".to_string()),
            ..PhotoLocation::default()
        };
        assert!(!location.is_empty());
        assert!(!location.has_coordinates());
    }

    #[test]
    fn test_attribution() {
        let metadata = PhotoMetadata {
            id: "1".to_string(),
            photographer_name: "Ana & Luis".to_string(),
            license: Some("CC BY 2.0".to_string()),
            ..PhotoMetadata::default()
        };
        assert_eq!(metadata.attribution_text("Flickr"), "Photo by Ana & Luis on Flickr (CC BY 2.0)");
        assert_eq!(
            metadata.attribution_markup("Flickr", "https://www.flickr.com/photos/ana/1/"),
            r#"Photo by <a href="https://www.flickr.com/photos/ana/1/">Ana &amp; Luis</a> on Flickr"#
        );

        let unlicensed = PhotoMetadata {
            license: None,
            ..metadata
        };
        assert_eq!(unlicensed.attribution_text("Flickr"), "Photo by Ana & Luis on Flickr");
    }

    #[test]
    fn test_coverage_counters() {
        let with_everything = PhotoMetadata {
            id: "1".to_string(),
            description: Some("desc".to_string()),
            tags: vec!["sunset".to_string()],
            location: Some(PhotoLocation {
                latitude: Some(1.0),
                longitude: Some(2.0),
                gps_from_exif: true,
                ..PhotoLocation::default()
            }),
            ..PhotoMetadata::default()
        };
        let place_only = PhotoMetadata {
            id: "2".to_string(),
            location: Some(PhotoLocation {
                place_name: Some("Yosemite".to_string()),
                grid_reference: Some("SK1234".to_string()),
                ..PhotoLocation::default()
            }),
            ..PhotoMetadata::default()
        };
        let records = [record("1", with_everything), record("2", place_only)];

        let mut stats = RunStatistics::default();
        stats.update_coverage(&records);

        assert_eq!(stats.ledger_size, 2);
        assert_eq!(stats.with_description, 1);
        assert_eq!(stats.with_location, 2);
        assert_eq!(stats.with_coordinates, 1);
        assert_eq!(stats.with_gps_exif, 1);
        assert_eq!(stats.with_grid_reference, 1);
        assert_eq!(stats.with_tags, 1);
    }
}
