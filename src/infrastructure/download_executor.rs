//! Image download with resume and login-wall recovery
//!
//! Per item:
//!
//! ```text
//! Idle -> Fetching -> Success ----------------------------> Persisted
//!                  -> AuthWallDetected -> RetryAlternate -> Success -> Persisted
//!                                                        -> Failed
//!                  -> Failed
//! ```
//!
//! A file that already exists under the deterministic name short-circuits to
//! `Skipped` before any network call.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use super::harvest_error::{FetchError, PersistenceError};
use super::http_client::{FetchedBytes, PageFetcher};
use super::parsing::url_rewrite::extension_of;
use super::rate_governor::RateGovernor;
use crate::domain::{AssetLocation, PhotoReference, SiteProfile};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

const DEFAULT_EXTENSION: &str = "jpg";

const UNKNOWN_OWNER: &str = "unknown";

/// States of the per-item download state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Fetching,
    AuthWallDetected,
    RetryAlternate,
    Success,
    Persisted,
    Skipped,
    Failed,
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A photo file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// URL the bytes actually came from
    pub source_url: String,
    pub downloaded_at: DateTime<Utc>,
}

/// Terminal result of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Persisted(StoredFile),
    /// The file already existed; nothing was fetched
    Skipped(StoredFile),
    Failed { reason: String },
}

impl DownloadOutcome {
    pub fn state(&self) -> DownloadState {
        match self {
            Self::Persisted(_) => DownloadState::Persisted,
            Self::Skipped(_) => DownloadState::Skipped,
            Self::Failed { .. } => DownloadState::Failed,
        }
    }

    pub fn stored_file(&self) -> Option<&StoredFile> {
        match self {
            Self::Persisted(file) | Self::Skipped(file) => Some(file),
            Self::Failed { .. } => None,
        }
    }
}

/// `<site>_<id>_<owner>.<ext>` with the owner reduced to `[A-Za-z0-9_-]`.
pub fn build_filename(site_tag: &str, id: &str, owner: Option<&str>, extension: &str) -> String {
    let id = sanitize(id);
    let owner = owner.map_or_else(|| UNKNOWN_OWNER.to_string(), sanitize);
    format!("{site_tag}_{id}_{owner}.{extension}")
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Image extension of a URL, `jpg` for anything else.
pub fn image_extension(url: &str) -> String {
    extension_of(url)
        .filter(|extension| IMAGE_EXTENSIONS.contains(&extension.as_str()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Downloads located assets into the photos directory.
pub struct DownloadExecutor {
    fetcher: Arc<dyn PageFetcher>,
    governor: Arc<RateGovernor>,
    profile: SiteProfile,
    photos_directory: PathBuf,
}

impl DownloadExecutor {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        governor: Arc<RateGovernor>,
        profile: SiteProfile,
        photos_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            governor,
            profile,
            photos_directory: photos_directory.into(),
        }
    }

    pub fn photos_directory(&self) -> &Path {
        &self.photos_directory
    }

    /// Deterministic filename; depends only on the reference and the primary URL.
    pub fn filename_for(&self, reference: &PhotoReference, location: &AssetLocation) -> String {
        build_filename(
            self.profile.kind.tag(),
            &reference.id,
            reference.owner_handle.as_deref(),
            &image_extension(&location.url),
        )
    }

    /// Run the state machine for one item.
    ///
    /// Network trouble ends in [`DownloadOutcome::Failed`]; only failing to
    /// write the file is an error.
    pub async fn execute(
        &self,
        reference: &PhotoReference,
        location: &AssetLocation,
    ) -> Result<DownloadOutcome, PersistenceError> {
        let filename = self.filename_for(reference, location);
        let path = self.photos_directory.join(&filename);
        let mut state = DownloadState::Idle;

        if let Some(size_bytes) = existing_file_size(&path).await {
            transition(&reference.id, &mut state, DownloadState::Skipped);
            info!("⏭️  {} already on disk ({} bytes)", filename, size_bytes);
            return Ok(DownloadOutcome::Skipped(StoredFile {
                filename,
                path,
                size_bytes,
                source_url: location.url.clone(),
                downloaded_at: Utc::now(),
            }));
        }

        transition(&reference.id, &mut state, DownloadState::Fetching);
        let fetched = match self.fetch(&location.url).await {
            Ok(fetched) => fetched,
            Err(error) if error.warrants_alternate() => {
                transition(&reference.id, &mut state, DownloadState::AuthWallDetected);
                let Some(alternate) = location.alternate.as_deref() else {
                    transition(&reference.id, &mut state, DownloadState::Failed);
                    return Ok(failed(format!("{error}; no alternate URL")));
                };

                transition(&reference.id, &mut state, DownloadState::RetryAlternate);
                warn!("{}; retrying with {}", error, alternate);
                match self.fetch(alternate).await {
                    Ok(fetched) => fetched,
                    Err(retry_error) => {
                        transition(&reference.id, &mut state, DownloadState::Failed);
                        return Ok(failed(format!("{error}; alternate failed: {retry_error}")));
                    }
                }
            }
            Err(error) => {
                transition(&reference.id, &mut state, DownloadState::Failed);
                return Ok(failed(error.to_string()));
            }
        };
        transition(&reference.id, &mut state, DownloadState::Success);

        let size_bytes = write_atomically(&path, &fetched.bytes).await?;
        transition(&reference.id, &mut state, DownloadState::Persisted);
        info!("✅ Saved {} ({} bytes)", filename, size_bytes);

        Ok(DownloadOutcome::Persisted(StoredFile {
            filename,
            path,
            size_bytes,
            source_url: fetched.requested_url,
            downloaded_at: Utc::now(),
        }))
    }

    /// One paced fetch, classifying login walls and non-image responses.
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, FetchError> {
        self.governor.acquire().await;
        let fetched = self.fetcher.fetch_bytes(url).await?;

        if self.profile.is_auth_wall(&fetched.final_url) {
            return Err(FetchError::AuthWall {
                url: url.to_string(),
                final_url: fetched.final_url,
            });
        }
        if let Some(content_type) = fetched
            .content_type
            .as_deref()
            .filter(|content_type| content_type.starts_with("text/html"))
        {
            return Err(FetchError::UnexpectedContent {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }
        if fetched.bytes.is_empty() {
            return Err(FetchError::UnexpectedContent {
                url: url.to_string(),
                content_type: "an empty body".to_string(),
            });
        }
        Ok(fetched)
    }
}

fn failed(reason: String) -> DownloadOutcome {
    DownloadOutcome::Failed { reason }
}

fn transition(id: &str, state: &mut DownloadState, next: DownloadState) {
    debug!(id, from = %state, to = %next, "Download state");
    *state = next;
}

async fn existing_file_size(path: &Path) -> Option<u64> {
    let metadata = fs::metadata(path).await.ok()?;
    metadata.is_file().then(|| metadata.len())
}

/// Write through a `.part` sibling so a crash never leaves a truncated file
/// under the final name (which would be taken for a finished download).
async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<u64, PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::io(parent, e))?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes)
        .await
        .map_err(|e| PersistenceError::io(&partial, e))?;
    fs::rename(&partial, path)
        .await
        .map_err(|e| PersistenceError::io(path, e))?;
    Ok(bytes.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("alice"), "flickr_123_alice.jpg")]
    #[case(Some("Jean-Luc Picard!"), "flickr_123_Jean-Luc_Picard_.jpg")]
    #[case(Some("émile@home"), "flickr_123__mile_home.jpg")]
    #[case(None, "flickr_123_unknown.jpg")]
    fn test_build_filename(#[case] owner: Option<&str>, #[case] expected: &str) {
        assert_eq!(build_filename("flickr", "123", owner, "jpg"), expected);
    }

    #[rstest]
    #[case("../../escape", "flickr_______escape_alice.jpg")]
    #[case("12/34", "flickr_12_34_alice.jpg")]
    fn test_build_filename_stays_in_directory(#[case] id: &str, #[case] expected: &str) {
        let filename = build_filename("flickr", id, Some("alice"), "jpg");
        assert_eq!(filename, expected);
        assert_eq!(Path::new(&filename).components().count(), 1);
    }

    #[rstest]
    #[case("https://live.staticflickr.com/1/2_ab_b.png", "png")]
    #[case("https://live.staticflickr.com/1/2_ab_b.JPEG?dl=1", "jpeg")]
    #[case("https://www.flickr.com/photo_download.gne?id=2&secret=ab&size=o", "jpg")]
    #[case("https://example.com/image", "jpg")]
    fn test_image_extension(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(image_extension(url), expected);
    }

    #[test]
    fn test_outcome_states() {
        let failed = failed("nope".to_string());
        assert_eq!(failed.state(), DownloadState::Failed);
        assert!(failed.stored_file().is_none());
    }
}
