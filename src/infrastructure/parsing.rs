//! HTML extraction for listing, detail and sizes pages
//!
//! Extraction is built from small [`strategy::ExtractionStrategy`] values
//! composed into per-field [`strategy::Cascade`]s. All of it is synchronous:
//! the parsed tree never crosses an `.await`.

pub mod asset_strategies;
pub mod candidate_lister;
pub mod config;
pub mod document;
pub mod metadata_extractor;
pub mod strategy;
pub mod url_rewrite;

// Re-export public types
pub use asset_strategies::{AssetStrategies, DocumentAssets};
pub use candidate_lister::CandidateLister;
pub use config::{AssetSelectors, ListingSelectors, ParsingConfig, PhotoDetailSelectors};
pub use document::{ParsedDocument, PhotoDocument};
pub use metadata_extractor::MetadataExtractor;
pub use strategy::{Cascade, ExtractionStrategy};

use scraper::Selector;
use tracing::warn;

use super::parsing_error::{ParsingError, ParsingResult};

/// Compile selector strings, skipping invalid ones.
///
/// Fails only when not a single selector of a non-empty list compiles.
pub(crate) fn compile_selectors(field: &str, selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}' for {}: {}", selector_str, field, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() && !selector_strings.is_empty() {
        return Err(ParsingError::NoValidSelectors {
            field: field.to_string(),
            errors: errors.join(", "),
        });
    }

    Ok(selectors)
}
