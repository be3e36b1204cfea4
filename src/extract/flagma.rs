//! Extractor for flagma-style company listings
//!
//! # Markup
//!
//! ```html
//! <div class="page-list-item container job">
//!   <div class="header"><a href="https://flagma.kz/737522/">Shini</a>, ТОО</div>
//!   <span itemprop="location"><span itemprop="name">Алматы</span></span>
//! </div>
//! ...
//! <li class="page notactive"><span>54</span></li>
//! ```
//!
//! - id: last path segment of the header link, digits only
//! - name / legal type: header text split at the first comma
//! - city: `span[itemprop=name]` inside `span[itemprop=location]`
//! - last page: the `li.page.notactive` entry of the pager

use crate::extract::{clean_text, ExtractError, Extraction, RecordExtractor};
use crate::storage::Record;
use scraper::{ElementRef, Html, Selector};

const ITEM: &str = "div.page-list-item.container.job";
const ITEM_FALLBACK: &str = "div.page-list-item";
const HEADER: &str = "div.header";
const HEADER_LINK: &str = "div.header a[href]";
const CITY: &str = "span[itemprop='location'] span[itemprop='name']";
const LAST_PAGE: &str = "li.page.notactive span";

pub struct FlagmaExtractor {
    item: Selector,
    item_fallback: Selector,
    header: Selector,
    header_link: Selector,
    city: Selector,
    last_page: Selector,
}

impl FlagmaExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            item: selector(ITEM)?,
            item_fallback: selector(ITEM_FALLBACK)?,
            header: selector(HEADER)?,
            header_link: selector(HEADER_LINK)?,
            city: selector(CITY)?,
            last_page: selector(LAST_PAGE)?,
        })
    }

    fn parse_item(&self, item: ElementRef<'_>, category_url: &str) -> Option<Record> {
        let source_id = item
            .select(&self.header_link)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(id_from_href)?;

        let header = item
            .select(&self.header)
            .next()
            .map(|h| clean_text(&h.text().collect::<String>()))
            .unwrap_or_default();
        let (name, legal_type) = match header.split_once(',') {
            Some((name, legal_type)) => (name.trim().to_string(), legal_type.trim().to_string()),
            None => (header, String::new()),
        };

        let city = item
            .select(&self.city)
            .next()
            .map(|c| clean_text(&c.text().collect::<String>()))
            .unwrap_or_default();

        Some(Record {
            source_id,
            name,
            legal_type,
            city,
            category_url: category_url.to_string(),
        })
    }

    fn last_page(&self, document: &Html) -> Option<u32> {
        document
            .select(&self.last_page)
            .filter_map(|span| clean_text(&span.text().collect::<String>()).parse::<u32>().ok())
            .max()
    }
}

impl RecordExtractor for FlagmaExtractor {
    fn extract(&self, body: &str, category_url: &str, page: u32) -> Result<Extraction, ExtractError> {
        if !looks_like_html(body) {
            return Err(ExtractError::NotHtml);
        }

        let document = Html::parse_document(body);

        let mut items: Vec<ElementRef<'_>> = document.select(&self.item).collect();
        if items.is_empty() {
            items = document.select(&self.item_fallback).collect();
            if !items.is_empty() {
                tracing::warn!("Primary item selector matched nothing on page {}, used fallback", page);
            }
        }

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match self.parse_item(item, category_url) {
                Some(record) => records.push(record),
                None => tracing::warn!("Skipped listing entry without a numeric id on page {}", page),
            }
        }

        let last_page = self.last_page(&document);
        let has_more = last_page.map(|last| page < last).unwrap_or(false);

        tracing::debug!(
            "Parsed {} records from page {} (last page: {:?})",
            records.len(),
            page,
            last_page
        );

        Ok(Extraction {
            records,
            has_more,
            last_page,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// `https://flagma.kz/737522/` -> `737522`
fn id_from_href(href: &str) -> Option<String> {
    let last = href.trim().trim_end_matches('/').rsplit('/').next()?;
    if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
        Some(last.to_string())
    } else {
        None
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    let prefix: String = head.chars().take(512).collect::<String>().to_ascii_lowercase();
    prefix.starts_with('<') && (prefix.contains("<html") || prefix.contains("<!doctype") || prefix.contains("<div"))
}
