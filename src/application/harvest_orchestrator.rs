//! Harvest run orchestration
//!
//! Candidates are carried one at a time through metadata resolution, asset
//! location, download and the ledger append before the next one starts.
//! Item failures are collected in the failure list; only persistence errors
//! end the run early.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::asset_locator::AssetLocator;
use super::listing::{CandidateSource, ListingService};
use super::metadata_resolver::{MetadataResolver, Resolution};
use crate::domain::{DownloadRecord, PhotoLocation, PhotoMetadata, PhotoReference, RunStatistics, SiteProfile};
use crate::infrastructure::config::{AppConfig, defaults};
use crate::infrastructure::download_executor::{DownloadExecutor, DownloadOutcome, StoredFile};
use crate::infrastructure::exif_gps::gps_coordinates;
use crate::infrastructure::ledger::{self, FailureList, PersistenceLedger};
use crate::infrastructure::parsing::{AssetStrategies, CandidateLister, MetadataExtractor};
use crate::infrastructure::{HarvestResult, PageFetcher, PersistenceError, RateGovernor};

/// Reason recorded when no strategy finds a downloadable URL.
pub const NO_ASSET_REASON: &str = "no downloadable asset found";

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Already in the ledger; nothing fetched
    AlreadyRecorded,
    Downloaded,
    /// File already on disk; recorded without downloading
    Skipped,
    Failed { reason: String },
}

/// Summary of a finished (or interrupted) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub statistics: RunStatistics,
    pub ledger_path: PathBuf,
    pub failure_path: PathBuf,
    /// Every id in the failure list, including earlier runs'
    pub failed_ids: Vec<String>,
}

/// Owns the ledger and failure list for one run and drives the pipeline.
pub struct HarvestOrchestrator {
    listing: ListingService,
    resolver: MetadataResolver,
    locator: AssetLocator,
    executor: DownloadExecutor,
    ledger: PersistenceLedger,
    failures: FailureList,
    profile: SiteProfile,
    statistics_path: PathBuf,
}

impl HarvestOrchestrator {
    /// Build the pipeline for `config`, creating the output directories and
    /// loading any ledger and failure list left by earlier runs.
    pub async fn from_config(
        config: &AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
    ) -> HarvestResult<Self> {
        let profile = config.site.profile();
        let output = &config.output.directory;
        let photos_directory = config.photos_directory();
        fs::create_dir_all(&photos_directory)
            .await
            .map_err(|e| PersistenceError::io(&photos_directory, e))?;

        let ledger = PersistenceLedger::open(output.join(defaults::LEDGER_FILE)).await?;
        let failures = FailureList::open(output.join(defaults::FAILURE_FILE)).await?;

        let listing = ListingService::new(
            fetcher.clone(),
            governor.clone(),
            CandidateLister::new(profile.clone(), &config.parsing.listing)?,
            config.search.clone(),
            config.seeds.clone(),
        );
        let resolver = MetadataResolver::new(
            fetcher.clone(),
            governor.clone(),
            MetadataExtractor::new(&config.parsing.detail)?,
            profile.clone(),
        );
        let locator = AssetLocator::new(
            fetcher.clone(),
            governor.clone(),
            AssetStrategies::new(profile.clone(), &config.parsing.assets)?,
        );
        let executor = DownloadExecutor::new(fetcher, governor, profile.clone(), photos_directory);

        info!(
            "🚀 Harvesting from {} into {:?} ({} already recorded)",
            profile.display_name,
            output,
            ledger.len()
        );

        Ok(Self {
            listing,
            resolver,
            locator,
            executor,
            ledger,
            failures,
            profile,
            statistics_path: output.join(defaults::STATISTICS_FILE),
        })
    }

    pub fn ledger(&self) -> &PersistenceLedger {
        &self.ledger
    }

    pub fn failures(&self) -> &FailureList {
        &self.failures
    }

    /// Harvest from `source` until `max_items` photos are on disk (downloaded
    /// or found already present) or the source runs out.
    ///
    /// Failed and already recorded candidates do not count toward the limit,
    /// so a rerun with the same limit makes progress. Cancelling `cancel`
    /// stops the run once the in-flight item is finished; the failure list
    /// and statistics are still written.
    pub async fn run(
        &mut self,
        source: &CandidateSource,
        max_items: Option<usize>,
        cancel: CancellationToken,
    ) -> HarvestResult<RunReport> {
        let mut statistics = RunStatistics {
            started_at: Some(Utc::now()),
            ..RunStatistics::default()
        };
        let mut cursor = self.listing.cursor(source);

        'harvest: loop {
            if budget_spent(&statistics, max_items) {
                break;
            }
            if cancel.is_cancelled() {
                statistics.interrupted = true;
                break;
            }
            let Some(batch) = self.listing.next_batch(&mut cursor).await? else {
                break;
            };

            for reference in &batch {
                if budget_spent(&statistics, max_items) {
                    break 'harvest;
                }
                if cancel.is_cancelled() {
                    statistics.interrupted = true;
                    break 'harvest;
                }
                info!("[{}] Processing photo {}", statistics.processed + 1, reference.id);

                let outcome = self.process(reference).await?;
                statistics.processed += 1;
                match outcome {
                    ItemOutcome::AlreadyRecorded => statistics.already_recorded += 1,
                    ItemOutcome::Downloaded => statistics.downloaded += 1,
                    ItemOutcome::Skipped => statistics.skipped += 1,
                    ItemOutcome::Failed { reason } => {
                        warn!("❌ Photo {} failed: {}", reference.id, reason);
                        statistics.failed += 1;
                        self.failures.record(reference.id.clone(), reason);
                    }
                }
            }
        }
        let total = cursor.seen();

        if statistics.interrupted {
            warn!("🛑 Interrupted after {} of {} candidates", statistics.processed, total);
        }

        self.failures.save().await?;
        statistics.update_coverage(self.ledger.records());
        statistics.finished_at = Some(Utc::now());
        ledger::write_statistics(&self.statistics_path, &statistics).await?;

        info!(
            "✅ Done: {} downloaded, {} skipped, {} already recorded, {} failed",
            statistics.downloaded, statistics.skipped, statistics.already_recorded, statistics.failed
        );

        Ok(RunReport {
            statistics,
            ledger_path: self.ledger.path().to_path_buf(),
            failure_path: self.failures.path().to_path_buf(),
            failed_ids: self.failures.entries().iter().map(|entry| entry.id.clone()).collect(),
        })
    }

    /// Carry one candidate through the pipeline.
    pub async fn process(&mut self, reference: &PhotoReference) -> Result<ItemOutcome, PersistenceError> {
        if self.ledger.contains(&reference.id) {
            self.failures.remove(&reference.id);
            return Ok(ItemOutcome::AlreadyRecorded);
        }

        let (metadata, document) = match self.resolver.resolve(reference).await {
            Resolution::Resolved { metadata, document } => (metadata, document),
            Resolution::Unresolved { reason } => return Ok(ItemOutcome::Failed { reason }),
        };

        let Some(location) = self.locator.locate(reference, &document).await else {
            return Ok(ItemOutcome::Failed {
                reason: NO_ASSET_REASON.to_string(),
            });
        };

        let (file, outcome) = match self.executor.execute(reference, &location).await? {
            DownloadOutcome::Persisted(file) => (file, ItemOutcome::Downloaded),
            DownloadOutcome::Skipped(file) => (file, ItemOutcome::Skipped),
            DownloadOutcome::Failed { reason } => return Ok(ItemOutcome::Failed { reason }),
        };

        let metadata = with_exif_position(metadata, &file).await;
        let record = self.record_for(reference, metadata, file);
        self.ledger.append(record).await?;
        self.failures.remove(&reference.id);
        Ok(outcome)
    }

    fn record_for(&self, reference: &PhotoReference, metadata: PhotoMetadata, file: StoredFile) -> DownloadRecord {
        DownloadRecord {
            id: reference.id.clone(),
            filename: file.filename,
            size_bytes: file.size_bytes,
            downloaded_at: file.downloaded_at,
            source_url: file.source_url,
            page_url: reference.canonical_url.clone(),
            attribution_text: metadata.attribution_text(self.profile.display_name),
            attribution_markup: metadata.attribution_markup(self.profile.display_name, &reference.canonical_url),
            metadata,
        }
    }
}

/// Coordinates from the stored image's EXIF block when the page gave none.
async fn with_exif_position(mut metadata: PhotoMetadata, file: &StoredFile) -> PhotoMetadata {
    if metadata.location.as_ref().is_some_and(PhotoLocation::has_coordinates) {
        return metadata;
    }
    let bytes = match fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Could not read {:?} for EXIF: {}", file.path, e);
            return metadata;
        }
    };
    if let Some((latitude, longitude)) = gps_coordinates(&bytes) {
        info!("📍 GPS in EXIF: {:.6}, {:.6}", latitude, longitude);
        let location = metadata.location.get_or_insert_with(PhotoLocation::default);
        location.latitude = Some(latitude);
        location.longitude = Some(longitude);
        location.gps_from_exif = true;
    }
    metadata
}

/// Whether `max_items` photos are already on disk for this run.
fn budget_spent(statistics: &RunStatistics, max_items: Option<usize>) -> bool {
    max_items.is_some_and(|limit| statistics.downloaded + statistics.skipped >= limit as u64)
}
