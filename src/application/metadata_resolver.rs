//! Metadata resolution for one candidate
//!
//! Fetches the detail page and hands it to the [`MetadataExtractor`]. A page
//! that cannot be fetched yields [`Resolution::Unresolved`], never an error.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{PhotoMetadata, PhotoReference, SiteProfile};
use crate::infrastructure::parsing::{MetadataExtractor, PhotoDocument};
use crate::infrastructure::{PageFetcher, RateGovernor};

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Metadata plus the detail document, kept for asset location.
    Resolved {
        metadata: PhotoMetadata,
        document: PhotoDocument,
    },
    Unresolved { reason: String },
}

pub struct MetadataResolver {
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    extractor: MetadataExtractor,
    profile: SiteProfile,
}

impl MetadataResolver {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
        extractor: MetadataExtractor,
        profile: SiteProfile,
    ) -> Self {
        Self {
            fetcher,
            governor,
            extractor,
            profile,
        }
    }

    pub async fn resolve(&self, reference: &PhotoReference) -> Resolution {
        self.governor.acquire().await;
        let page = match self.fetcher.fetch_page(&reference.canonical_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(retryable = e.is_retryable(), "⚠️ Could not fetch detail page for {}: {}", reference.id, e);
                return Resolution::Unresolved { reason: e.to_string() };
            }
        };

        if self.profile.is_auth_wall(&page.final_url) {
            warn!("⚠️ Detail page for {} redirected to {}", reference.id, page.final_url);
            return Resolution::Unresolved {
                reason: format!("detail page redirected to login: {}", page.final_url),
            };
        }

        let document = PhotoDocument::from(page);
        let metadata = self.extractor.extract(reference, &document);
        debug!("Resolved metadata for {}: {:?}", reference.id, metadata.title);
        Resolution::Resolved { metadata, document }
    }
}
