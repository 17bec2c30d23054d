//! Asset location for one resolved candidate
//!
//! Strategies, each tried only when the previous found nothing:
//! 1. explicit download link on the detail page
//! 2. displayed image, upgraded to the largest rendition
//! 3. original-size URL built from the id and the page secret
//! 4. the "all sizes" page, repeating 1 and 2 there
//!
//! Whenever the chosen URL is not the display image itself, the upgraded
//! display image rides along as the unauthenticated alternate.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{AssetLocation, AssetStrategyKind, PhotoReference};
use crate::infrastructure::parsing::{AssetStrategies, DocumentAssets, PhotoDocument};
use crate::infrastructure::{PageFetcher, RateGovernor};

pub struct AssetLocator {
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    strategies: AssetStrategies,
}

impl AssetLocator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, governor: Arc<RateGovernor>, strategies: AssetStrategies) -> Self {
        Self {
            fetcher,
            governor,
            strategies,
        }
    }

    /// Best downloadable URL for `reference`, or `None` if no strategy finds one.
    pub async fn locate(&self, reference: &PhotoReference, document: &PhotoDocument) -> Option<AssetLocation> {
        let assets = self.strategies.inspect(reference, document);
        if let Some(location) = choose_on_detail_page(assets) {
            debug!("Asset for {} via {}: {}", reference.id, location.strategy_used, location.url);
            return Some(location);
        }

        let sizes_url = self.strategies.profile().sizes_page_url(reference)?;
        info!("🔍 No asset on detail page of {}, trying {}", reference.id, sizes_url);

        self.governor.acquire().await;
        let page = match self.fetcher.fetch_page(&sizes_url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("Sizes page for {} unavailable: {}", reference.id, e);
                return None;
            }
        };
        if self.strategies.profile().is_auth_wall(&page.final_url) {
            debug!("Sizes page for {} redirected to login", reference.id);
            return None;
        }

        let sizes_document = PhotoDocument::from(page);
        let assets = self.strategies.inspect(reference, &sizes_document);
        let location = choose_on_sizes_page(assets);
        if let Some(location) = &location {
            debug!("Asset for {} via {}: {}", reference.id, location.strategy_used, location.url);
        }
        location
    }
}

fn choose_on_detail_page(assets: DocumentAssets) -> Option<AssetLocation> {
    let DocumentAssets {
        download_link,
        display_image,
        token_original,
    } = assets;

    if let Some(link) = download_link {
        return Some(AssetLocation::new(link, AssetStrategyKind::DownloadLink).with_alternate(display_image));
    }
    if let Some(image) = display_image {
        return Some(AssetLocation::new(image, AssetStrategyKind::DisplayImage));
    }
    token_original.map(|url| AssetLocation::new(url, AssetStrategyKind::TokenOriginal))
}

fn choose_on_sizes_page(assets: DocumentAssets) -> Option<AssetLocation> {
    let DocumentAssets {
        download_link,
        display_image,
        ..
    } = assets;

    match download_link {
        Some(link) => Some(AssetLocation::new(link, AssetStrategyKind::SizesPage).with_alternate(display_image)),
        None => display_image.map(|image| AssetLocation::new(image, AssetStrategyKind::SizesPage)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_page_priority() {
        let all = DocumentAssets {
            download_link: Some("https://a.example/dl".to_string()),
            display_image: Some("https://a.example/1_b.jpg".to_string()),
            token_original: Some("https://a.example/token".to_string()),
        };
        let location = choose_on_detail_page(all).unwrap();
        assert_eq!(location.strategy_used, AssetStrategyKind::DownloadLink);
        assert_eq!(location.alternate.as_deref(), Some("https://a.example/1_b.jpg"));

        let no_link = DocumentAssets {
            download_link: None,
            display_image: Some("https://a.example/1_b.jpg".to_string()),
            token_original: Some("https://a.example/token".to_string()),
        };
        let location = choose_on_detail_page(no_link).unwrap();
        assert_eq!(location.strategy_used, AssetStrategyKind::DisplayImage);
        assert_eq!(location.alternate, None);

        let token_only = DocumentAssets {
            token_original: Some("https://a.example/token".to_string()),
            ..DocumentAssets::default()
        };
        assert_eq!(
            choose_on_detail_page(token_only).map(|l| l.strategy_used),
            Some(AssetStrategyKind::TokenOriginal)
        );
        assert_eq!(choose_on_detail_page(DocumentAssets::default()), None);
    }

    #[test]
    fn test_sizes_page_ignores_token() {
        let token_only = DocumentAssets {
            token_original: Some("https://a.example/token".to_string()),
            ..DocumentAssets::default()
        };
        assert_eq!(choose_on_sizes_page(token_only), None);
    }
}
