//! Extraction strategies and the ordered cascade that combines them
//!
//! Every strategy answers one question for one document: "can you produce a
//! non-empty value?". A [`Cascade`] asks its strategies in priority order and
//! stops at the first yes.

use regex::Regex;
use scraper::Selector;
use std::marker::PhantomData;
use tracing::trace;

use super::compile_selectors;
use super::document::ParsedDocument;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};

/// One independent way of pulling a value out of a document.
pub trait ExtractionStrategy<T>: Send + Sync {
    /// Short name used in trace logs.
    fn name(&self) -> &str;

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<T>;
}

/// Ordered list of strategies for one field.
pub struct Cascade<T> {
    field: &'static str,
    strategies: Vec<Box<dyn ExtractionStrategy<T>>>,
}

impl<T> Cascade<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy with lower priority than the ones already added.
    #[must_use]
    pub fn then(mut self, strategy: impl ExtractionStrategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// First value any strategy produces, plus the name of that strategy.
    pub fn resolve_with_source(&self, document: &ParsedDocument<'_>) -> Option<(T, &str)> {
        for strategy in &self.strategies {
            if let Some(value) = strategy.try_extract(document) {
                trace!(field = self.field, strategy = strategy.name(), "Field resolved");
                return Some((value, strategy.name()));
            }
        }
        trace!(field = self.field, "No strategy produced a value");
        None
    }

    pub fn resolve(&self, document: &ParsedDocument<'_>) -> Option<T> {
        self.resolve_with_source(document).map(|(value, _)| value)
    }
}

/// Collapse runs of whitespace and drop empty results.
pub fn clean_text(raw: &str) -> Option<String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Text content of the first matching element that has any.
pub struct SelectorText {
    name: String,
    selectors: Vec<Selector>,
}

impl SelectorText {
    pub fn new(name: &str, selectors: &[String]) -> ParsingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            selectors: compile_selectors(name, selectors)?,
        })
    }
}

impl ExtractionStrategy<String> for SelectorText {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            document
                .html
                .select(selector)
                .find_map(|element| clean_text(&element.text().collect::<String>()))
        })
    }
}

/// Texts of every element matched by the first selector that matches any.
///
/// Duplicates are dropped, keeping document order.
pub struct SelectorAllTexts {
    name: String,
    selectors: Vec<Selector>,
}

impl SelectorAllTexts {
    pub fn new(name: &str, selectors: &[String]) -> ParsingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            selectors: compile_selectors(name, selectors)?,
        })
    }
}

impl ExtractionStrategy<Vec<String>> for SelectorAllTexts {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<Vec<String>> {
        self.selectors.iter().find_map(|selector| {
            let texts = dedupe(
                document
                    .html
                    .select(selector)
                    .filter_map(|element| clean_text(&element.text().collect::<String>())),
            );
            (!texts.is_empty()).then_some(texts)
        })
    }
}

/// An attribute of the first matching element that carries it.
pub struct SelectorAttribute {
    name: String,
    selectors: Vec<Selector>,
    attribute: String,
}

impl SelectorAttribute {
    pub fn new(name: &str, selectors: &[String], attribute: &str) -> ParsingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            selectors: compile_selectors(name, selectors)?,
            attribute: attribute.to_string(),
        })
    }
}

impl ExtractionStrategy<String> for SelectorAttribute {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            document
                .html
                .select(selector)
                .find_map(|element| element.value().attr(&self.attribute).and_then(clean_text))
        })
    }
}

/// `content` of a `<meta>` element addressed by property, name or itemprop.
pub struct MetaContent {
    name: String,
    selectors: Vec<Selector>,
}

impl MetaContent {
    pub fn new(keys: &[&str]) -> ParsingResult<Self> {
        let selectors = keys
            .iter()
            .map(|key| {
                let css = format!(r#"meta[property="{key}"], meta[name="{key}"], meta[itemprop="{key}"]"#);
                Selector::parse(&css).map_err(|e| ParsingError::invalid_selector(&css, e))
            })
            .collect::<ParsingResult<Vec<_>>>()?;
        Ok(Self {
            name: format!("meta:{}", keys.join("|")),
            selectors,
        })
    }
}

impl ExtractionStrategy<String> for MetaContent {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            document
                .html
                .select(selector)
                .find_map(|element| element.value().attr("content").and_then(clean_text))
        })
    }
}

/// The document `<title>`.
pub struct DocumentTitle {
    selector: Selector,
}

impl DocumentTitle {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            selector: Selector::parse("title").map_err(|e| ParsingError::invalid_selector("title", e))?,
        })
    }
}

impl ExtractionStrategy<String> for DocumentTitle {
    fn name(&self) -> &str {
        "document_title"
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        document
            .html
            .select(&self.selector)
            .find_map(|element| clean_text(&element.text().collect::<String>()))
    }
}

/// A `"key": value` pair inside inline script payloads.
///
/// String values are JSON-unescaped; numeric values are returned as written.
pub struct EmbeddedValue {
    name: String,
    patterns: Vec<Regex>,
}

impl EmbeddedValue {
    pub fn new(keys: &[&str]) -> ParsingResult<Self> {
        let patterns = keys
            .iter()
            .map(|key| {
                let pattern = format!(r#""{}"\s*:\s*(?:"((?:[^"\\]|\\.)*)"|(-?\d+(?:\.\d+)?))"#, regex::escape(key));
                Regex::new(&pattern).map_err(|e| ParsingError::invalid_pattern(key, e))
            })
            .collect::<ParsingResult<Vec<_>>>()?;
        Ok(Self {
            name: format!("embedded:{}", keys.join("|")),
            patterns,
        })
    }
}

impl ExtractionStrategy<String> for EmbeddedValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            pattern.captures_iter(&document.scripts).find_map(|captures| {
                if let Some(text) = captures.get(1) {
                    unescape_json(text.as_str()).as_deref().and_then(clean_text)
                } else {
                    captures.get(2).map(|number| number.as_str().to_string())
                }
            })
        })
    }
}

/// Decode a JSON string literal body (`\/`, `\"`, `é` and friends).
pub fn unescape_json(raw: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).ok()
}

/// A capture group of a regex run over the raw document body.
pub struct BodyPattern {
    name: String,
    pattern: Regex,
    group: usize,
}

impl BodyPattern {
    pub fn new(name: &str, pattern: &str) -> ParsingResult<Self> {
        Ok(Self {
            name: name.to_string(),
            pattern: Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(name, e))?,
            group: 1,
        })
    }
}

impl ExtractionStrategy<String> for BodyPattern {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<String> {
        self.pattern
            .captures_iter(document.body)
            .find_map(|captures| captures.get(self.group).and_then(|m| clean_text(m.as_str())))
    }
}

/// Ad hoc strategy backed by a closure.
pub struct FnStrategy<T, F> {
    name: &'static str,
    extract: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> FnStrategy<T, F>
where
    F: Fn(&ParsedDocument<'_>) -> Option<T> + Send + Sync,
{
    pub fn new(name: &'static str, extract: F) -> Self {
        Self {
            name,
            extract,
            _marker: PhantomData,
        }
    }
}

impl<T, F> ExtractionStrategy<T> for FnStrategy<T, F>
where
    F: Fn(&ParsedDocument<'_>) -> Option<T> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<T> {
        (self.extract)(document)
    }
}

/// A text strategy whose output is post-processed; `None` from the mapping
/// counts as "nothing found" so the cascade moves on.
pub struct Mapped<S, F> {
    inner: S,
    map: F,
}

impl<S, F, U> ExtractionStrategy<U> for Mapped<S, F>
where
    S: ExtractionStrategy<String>,
    F: Fn(String) -> Option<U> + Send + Sync,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn try_extract(&self, document: &ParsedDocument<'_>) -> Option<U> {
        self.inner.try_extract(document).and_then(&self.map)
    }
}

/// Adapters for text strategies.
pub trait TextStrategyExt: ExtractionStrategy<String> + Sized {
    fn map<U, F>(self, map: F) -> Mapped<Self, F>
    where
        F: Fn(String) -> Option<U> + Send + Sync,
    {
        Mapped { inner: self, map }
    }
}

impl<S: ExtractionStrategy<String>> TextStrategyExt for S {}

/// Remove duplicates, keeping the first occurrence of each value.
pub fn dedupe(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values.into_iter().filter(|value| seen.insert(value.clone())).collect()
}
