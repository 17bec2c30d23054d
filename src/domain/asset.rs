use serde::{Deserialize, Serialize};
use std::fmt;

/// Which asset strategy produced a URL, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStrategyKind {
    /// Explicit download affordance on the detail page
    DownloadLink,
    /// Primary displayed image, upgraded to the largest rendition
    DisplayImage,
    /// Original-size URL built from the id and a page-issued secret
    TokenOriginal,
    /// Download link or display image found on the "all sizes" page
    SizesPage,
}

impl fmt::Display for AssetStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DownloadLink => "download_link",
            Self::DisplayImage => "display_image",
            Self::TokenOriginal => "token_original",
            Self::SizesPage => "sizes_page",
        };
        f.write_str(name)
    }
}

/// Where to download a photo from. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    pub url: String,
    pub strategy_used: AssetStrategyKind,
    /// Unauthenticated fallback (the upgraded display image) tried once if
    /// `url` lands on a login wall
    pub alternate: Option<String>,
}

impl AssetLocation {
    pub fn new(url: impl Into<String>, strategy_used: AssetStrategyKind) -> Self {
        Self {
            url: url.into(),
            strategy_used,
            alternate: None,
        }
    }

    /// Attach an alternate URL unless it is the primary one.
    #[must_use]
    pub fn with_alternate(mut self, alternate: Option<String>) -> Self {
        self.alternate = alternate.filter(|alternate| *alternate != self.url);
        self
    }
}
