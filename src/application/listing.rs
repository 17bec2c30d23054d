//! Candidate sources: a saved listing document or a live paginated search
//!
//! Candidates are handed out in batches through a [`ListingCursor`], one
//! batch per listing page, so the caller decides when it has seen enough.
//! When a source yields no candidate at all, the configured seed list is
//! used instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::domain::{PhotoReference, SiteKind};
use crate::infrastructure::config::{SearchConfig, SeedPhoto};
use crate::infrastructure::parsing::{CandidateLister, PhotoDocument};
use crate::infrastructure::{HarvestError, HarvestResult, PageFetcher, RateGovernor};

/// Where candidates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// A previously captured listing page on disk
    Document(PathBuf),
    /// Live search using the configured parameters
    Search,
}

/// Progress through one candidate source.
#[derive(Debug)]
pub struct ListingCursor {
    source: CandidateSource,
    next_page: u32,
    seen: HashSet<String>,
    exhausted: bool,
}

impl ListingCursor {
    /// Number of distinct candidates handed out so far
    pub fn seen(&self) -> usize {
        self.seen.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Keep only ids not handed out before.
    fn admit(&mut self, found: Vec<PhotoReference>) -> Vec<PhotoReference> {
        found
            .into_iter()
            .filter(|reference| self.seen.insert(reference.id.clone()))
            .collect()
    }
}

pub struct ListingService {
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    lister: CandidateLister,
    search: SearchConfig,
    seeds: Vec<SeedPhoto>,
}

impl ListingService {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
        lister: CandidateLister,
        search: SearchConfig,
        seeds: Vec<SeedPhoto>,
    ) -> Self {
        Self {
            fetcher,
            governor,
            lister,
            search,
            seeds,
        }
    }

    pub fn cursor(&self, source: &CandidateSource) -> ListingCursor {
        ListingCursor {
            source: source.clone(),
            next_page: 1,
            seen: HashSet::new(),
            exhausted: false,
        }
    }

    /// The next batch of new candidates, `None` once the source is used up.
    ///
    /// Fails only when the input itself cannot be read: a missing or
    /// unreadable document, or a first search page that cannot be fetched.
    pub async fn next_batch(&self, cursor: &mut ListingCursor) -> HarvestResult<Option<Vec<PhotoReference>>> {
        if cursor.exhausted {
            return Ok(None);
        }

        let batch = match cursor.source.clone() {
            CandidateSource::Document(path) => {
                cursor.exhausted = true;
                let found = self.from_document(&path).await?;
                cursor.admit(found)
            }
            CandidateSource::Search => self.next_search_page(cursor).await?,
        };

        if batch.is_empty() {
            cursor.exhausted = true;
            if cursor.seen.is_empty() && !self.seeds.is_empty() {
                warn!("⚠️ Listing yielded no candidates, falling back to {} seed photos", self.seeds.len());
                let seeds = self.seed_references();
                return Ok(Some(cursor.admit(seeds)));
            }
            return Ok(None);
        }

        info!("📋 {} new candidates", batch.len());
        Ok(Some(batch))
    }

    /// Every candidate the source yields, in order.
    pub async fn candidates(&self, source: &CandidateSource) -> HarvestResult<Vec<PhotoReference>> {
        let mut cursor = self.cursor(source);
        let mut references = Vec::new();
        while let Some(batch) = self.next_batch(&mut cursor).await? {
            references.extend(batch);
        }
        Ok(references)
    }

    async fn from_document(&self, path: &Path) -> HarvestResult<Vec<PhotoReference>> {
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HarvestError::InputUnreadable {
                reason: format!("{}: {}", path.display(), e),
            })?;
        let base_url = format!("{}/", self.lister.profile().base_url);
        let references = self.lister.list(&PhotoDocument::new(base_url, body));
        info!("Found {} candidates in {}", references.len(), path.display());
        Ok(references)
    }

    /// New candidates from the next search page; empty ends the walk.
    async fn next_search_page(&self, cursor: &mut ListingCursor) -> HarvestResult<Vec<PhotoReference>> {
        let page = cursor.next_page;
        if page > self.search.max_pages {
            return Ok(Vec::new());
        }
        if page > 1 {
            self.governor.acquire_page().await;
        }
        cursor.next_page += 1;

        let url = self.search_url(page);
        self.governor.acquire().await;
        let fetched = match self.fetcher.fetch_page(&url).await {
            Ok(fetched) => fetched,
            Err(e) if page == 1 => {
                return Err(HarvestError::InputUnreadable {
                    reason: format!("{url}: {e}"),
                });
            }
            Err(e) => {
                warn!("⚠️ Stopping at listing page {}: {}", page, e);
                return Ok(Vec::new());
            }
        };

        let found = self.lister.list(&PhotoDocument::from(fetched));
        let fresh = cursor.admit(found);
        info!("📄 Listing page {}: {} new candidates", page, fresh.len());
        Ok(fresh)
    }

    /// URL of one page of the live listing.
    pub fn search_url(&self, page: u32) -> String {
        let profile = self.lister.profile();
        match profile.kind {
            SiteKind::Flickr => {
                let mut url = match Url::parse(&format!("{}/search/", profile.base_url)) {
                    Ok(url) => url,
                    Err(_) => return format!("{}/search/?page={page}", profile.base_url),
                };
                {
                    let mut query = url.query_pairs_mut();
                    query
                        .append_pair("text", &self.search.query)
                        .append_pair("license", &self.search.license_codes.join(","))
                        .append_pair("sort", &self.search.sort)
                        .append_pair("content_types", "0")
                        .append_pair("view_all", "1");
                    if self.search.min_width.is_some() || self.search.min_height.is_some() {
                        query.append_pair("dimension_search_mode", "min");
                    }
                    if let Some(width) = self.search.min_width {
                        query.append_pair("width", &width.to_string());
                    }
                    if let Some(height) = self.search.min_height {
                        query.append_pair("height", &height.to_string());
                    }
                    query.append_pair("page", &page.to_string());
                }
                url.to_string()
            }
            SiteKind::Geograph if page > 1 => format!("{}/finder/recent.php?page={page}", profile.base_url),
            SiteKind::Geograph => format!("{}/finder/recent.php", profile.base_url),
        }
    }

    fn seed_references(&self) -> Vec<PhotoReference> {
        let profile = self.lister.profile();
        self.seeds
            .iter()
            .map(|seed| {
                let url = profile.photo_page_url(&seed.id, seed.owner.as_deref());
                PhotoReference::new(seed.id.clone(), seed.owner.clone(), url)
            })
            .collect()
    }
}
