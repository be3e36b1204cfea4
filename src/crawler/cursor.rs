//! Pagination state for one category

/// Builds the URL of page `page` of a category
///
/// `page_path` is appended to the category URL with `{page}` substituted:
/// `https://flagma.kz/companies/x/` + `page-{page}/?sort=date` gives
/// `https://flagma.kz/companies/x/page-3/?sort=date`.
pub fn page_url(category_url: &str, page_path: &str, page: u32) -> String {
    format!(
        "{}/{}",
        category_url.trim_end_matches('/'),
        page_path
            .trim_start_matches('/')
            .replace("{page}", &page.to_string())
    )
}

/// Where the loop is inside a category; never persisted
#[derive(Debug, Clone)]
pub struct CategoryCursor {
    pub category_url: String,
    pub current_page: u32,
    /// Last page advertised by the most recent successful page
    pub last_page: Option<u32>,
    pub consecutive_failures: u32,
}

impl CategoryCursor {
    pub fn new(category_url: impl Into<String>) -> Self {
        Self {
            category_url: category_url.into(),
            current_page: 1,
            last_page: None,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self, last_page: Option<u32>) {
        self.consecutive_failures = 0;
        if last_page.is_some() {
            self.last_page = last_page;
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// True once the current page is at or beyond the advertised last page
    pub fn at_last_page(&self) -> bool {
        self.last_page
            .map(|last| self.current_page >= last)
            .unwrap_or(false)
    }

    pub fn advance(&mut self) {
        self.current_page += 1;
    }
}
