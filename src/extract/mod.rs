//! Record extraction from listing pages
//!
//! An extractor turns one fetched page body into company records plus the
//! "has more pages" signal that drives pagination. Extractors are pure: no I/O,
//! no state between calls.

mod flagma;

pub use flagma::FlagmaExtractor;

use crate::storage::Record;
use thiserror::Error;

/// Errors raised while interpreting a page body
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("body is not an HTML document")]
    NotHtml,

    #[error("invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },
}

/// Everything an extractor learned from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub records: Vec<Record>,

    /// Whether the category continues after this page
    pub has_more: bool,

    /// Highest page number advertised by the page's pagination, if any
    pub last_page: Option<u32>,
}

/// Parses a listing page into records
pub trait RecordExtractor: Send + Sync {
    fn extract(&self, body: &str, category_url: &str, page: u32) -> Result<Extraction, ExtractError>;
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
