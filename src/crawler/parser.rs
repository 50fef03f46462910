//! HTML parser for extracting items and the next-page link
//!
//! This module turns a listing page into:
//! - One [`Record`] per element matched by the item selector, keyed by the
//!   canonical URL of its key element
//! - The absolute URL of the next listing page, if any

use crate::config::ExtractConfig;
use crate::crawler::fetcher::FetchedPage;
use crate::state::Record;
use crate::url::resolve_key;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Page-level parse failures
///
/// Item-level problems never produce one of these; such items are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid page URL '{0}'")]
    InvalidPageUrl(String),

    #[error("Next page link '{0}' cannot be resolved")]
    InvalidNextPage(String),

    #[error("{0}")]
    Other(String),
}

/// Extracted content of one listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Items in document order
    pub records: Vec<Record>,

    /// Absolute URL of the next listing page
    pub next_page: Option<String>,

    /// Matched items dropped because they had no resolvable key
    pub skipped: usize,
}

/// Turns a fetched page into records
pub trait Parser: Send {
    fn extract(&self, page: &FetchedPage) -> Result<ParsedPage, ParseError>;
}

/// CSS-selector driven [`Parser`]
#[derive(Debug)]
pub struct HtmlParser {
    item: Selector,
    key: Selector,
    key_attribute: String,
    next_page: Option<Selector>,
    fields: Vec<(String, Selector)>,
}

impl HtmlParser {
    pub fn from_config(config: &ExtractConfig) -> ConfigResult<Self> {
        let next_page = match &config.next_page_selector {
            Some(selector) => Some(compile("next_page_selector", selector)?),
            None => None,
        };

        let fields = config
            .fields
            .iter()
            .map(|(name, selector)| Ok((name.clone(), compile(name, selector)?)))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            item: compile("item_selector", &config.item_selector)?,
            key: compile("key_selector", &config.key_selector)?,
            key_attribute: config.key_attribute.clone(),
            next_page,
            fields,
        })
    }

    fn extract_record(&self, item: ElementRef<'_>, page_url: &Url) -> Option<Record> {
        let key = item
            .select(&self.key)
            .filter_map(|element| element.value().attr(&self.key_attribute))
            .find_map(|href| resolve_key(href, page_url))?;

        let mut record = Record::new(key);
        for (name, selector) in &self.fields {
            if let Some(element) = item.select(selector).next() {
                let text = collapse_whitespace(&element.text().collect::<String>());
                if !text.is_empty() {
                    record.fields.insert(name.clone(), text);
                }
            }
        }
        Some(record)
    }

    fn extract_next_page(
        &self,
        document: &Html,
        page_url: &Url,
    ) -> Result<Option<String>, ParseError> {
        let Some(selector) = &self.next_page else {
            return Ok(None);
        };

        let Some(href) = document
            .select(selector)
            .find_map(|element| element.value().attr("href"))
        else {
            return Ok(None);
        };

        let href = href.trim();
        let next = page_url
            .join(href)
            .map_err(|_| ParseError::InvalidNextPage(href.to_string()))?;

        if next.scheme() != "http" && next.scheme() != "https" {
            return Err(ParseError::InvalidNextPage(href.to_string()));
        }

        Ok(Some(next.to_string()))
    }
}

impl Parser for HtmlParser {
    fn extract(&self, page: &FetchedPage) -> Result<ParsedPage, ParseError> {
        let page_url =
            Url::parse(&page.url).map_err(|_| ParseError::InvalidPageUrl(page.url.clone()))?;
        let document = Html::parse_document(&page.body);

        let mut parsed = ParsedPage::default();
        for item in document.select(&self.item) {
            match self.extract_record(item, &page_url) {
                Some(record) => parsed.records.push(record),
                None => parsed.skipped += 1,
            }
        }

        parsed.next_page = self.extract_next_page(&document, &page_url)?;
        Ok(parsed)
    }
}

fn compile(name: &str, selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
