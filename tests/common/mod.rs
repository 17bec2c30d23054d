//! Shared fixtures for integration tests: an in-memory fetcher and config helpers
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use photo_harvest_lib::domain::SiteKind;
use photo_harvest_lib::infrastructure::{AppConfig, FetchError, FetchedBytes, FetchedPage, PageFetcher, RateGovernor};

#[derive(Debug, Clone)]
struct MockResponse {
    final_url: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Serves canned responses by URL; anything else is a 404.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, MockResponse>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            MockResponse {
                final_url: None,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: html.as_bytes().to_vec(),
            },
        );
        self
    }

    pub fn image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.responses.insert(
            url.to_string(),
            MockResponse {
                final_url: None,
                content_type: Some("image/jpeg".to_string()),
                body: bytes.to_vec(),
            },
        );
        self
    }

    /// A request that ends on the login page.
    pub fn login_redirect(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            MockResponse {
                final_url: Some("https://identity.flickr.com/login?redir=%2Fphoto_download.gne".to_string()),
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: b"<html><body><form id=\"login\"></form></body></html>".to_vec(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn was_called(&self, url: &str) -> bool {
        self.calls().iter().any(|call| call == url)
    }

    fn respond(&self, url: &str) -> Result<MockResponse, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        self.responses.get(url).cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.respond(url)?;
        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url: response.final_url.unwrap_or_else(|| url.to_string()),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, FetchError> {
        let response = self.respond(url)?;
        Ok(FetchedBytes {
            requested_url: url.to_string(),
            final_url: response.final_url.unwrap_or_else(|| url.to_string()),
            content_type: response.content_type,
            bytes: response.body,
        })
    }
}

/// Flickr config writing into `output`, no pacing delays.
pub fn test_config(output: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.site = SiteKind::Flickr;
    config.output.directory = output.to_path_buf();
    config.pacing.request_interval_ms = 0;
    config.pacing.page_interval_ms = 0;
    config
}

pub fn unthrottled() -> Arc<RateGovernor> {
    Arc::new(RateGovernor::unthrottled())
}

/// Detail page markup with a title, an owner link and a small display image.
pub fn detail_page(title: &str, owner_name: &str, owner: &str, image_url: &str) -> String {
    format!(
        r#"<html><head><title>{title} | Flickr</title></head><body>
<h1 class="photo-title">{title}</h1>
<a class="owner-name" href="/photos/{owner}/">{owner_name}</a>
<img class="main-photo" src="{image_url}">
</body></html>"#
    )
}

pub fn listing_page(photo_paths: &[&str]) -> String {
    let tiles: Vec<String> = photo_paths
        .iter()
        .map(|path| format!(r#"<div class="photo-list-photo-view"><a href="{path}">photo</a></div>"#))
        .collect();
    format!("<html><body>{}</body></html>", tiles.join("\n"))
}

/// A tiny JPEG whose EXIF block holds a GPS position, as
/// `(degrees, minutes, seconds)` plus hemisphere letters.
pub fn jpeg_with_gps(latitude: [u32; 3], latitude_ref: u8, longitude: [u32; 3], longitude_ref: u8) -> Vec<u8> {
    fn entry(tiff: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        tiff.extend_from_slice(&tag.to_be_bytes());
        tiff.extend_from_slice(&kind.to_be_bytes());
        tiff.extend_from_slice(&count.to_be_bytes());
        tiff.extend_from_slice(&value);
    }

    let mut tiff = b"MM\x00\x2a".to_vec();
    tiff.extend_from_slice(&8u32.to_be_bytes());
    tiff.extend_from_slice(&1u16.to_be_bytes());
    entry(&mut tiff, 0x8825, 4, 1, 26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&4u16.to_be_bytes());
    entry(&mut tiff, 0x0001, 2, 2, [latitude_ref, 0, 0, 0]);
    entry(&mut tiff, 0x0002, 5, 3, 80u32.to_be_bytes());
    entry(&mut tiff, 0x0003, 2, 2, [longitude_ref, 0, 0, 0]);
    entry(&mut tiff, 0x0004, 5, 3, 104u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    for value in latitude.iter().chain(longitude.iter()) {
        tiff.extend_from_slice(&value.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
    }

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
