//! Fetched documents and their parsed form
//!
//! [`PhotoDocument`] is the owned, `Send` form that travels between async
//! steps. [`ParsedDocument`] holds the parsed tree and is created inside
//! synchronous extraction code only, never across an `.await`.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::infrastructure::http_client::FetchedPage;

static INLINE_SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script:not([src])").expect("static selector"));

/// A fetched detail, listing or sizes page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoDocument {
    /// Final URL after redirects, used to resolve relative links
    pub url: String,
    pub body: String,
}

impl PhotoDocument {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn parse(&self) -> ParsedDocument<'_> {
        ParsedDocument::new(&self.url, &self.body)
    }
}

impl From<FetchedPage> for PhotoDocument {
    fn from(page: FetchedPage) -> Self {
        Self {
            url: page.final_url,
            body: page.body,
        }
    }
}

/// A parsed document plus the raw text views strategies need.
pub struct ParsedDocument<'a> {
    pub url: &'a str,
    pub body: &'a str,
    pub html: Html,
    /// Concatenated contents of every inline `<script>` element
    pub scripts: String,
}

impl<'a> ParsedDocument<'a> {
    pub fn new(url: &'a str, body: &'a str) -> Self {
        let html = Html::parse_document(body);
        let scripts = html
            .select(&INLINE_SCRIPT_SELECTOR)
            .map(|script| script.text().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n");
        Self { url, body, html, scripts }
    }
}
