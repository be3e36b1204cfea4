//! Shared fixtures: a scripted transport, listing markup and proxy sources

use async_trait::async_trait;
use company_harvester::crawler::page_url;
use company_harvester::fetch::{RawResponse, Transport, TransportError};
use company_harvester::proxy::{ProxyError, ProxyHandle, ProxyProtocol, ProxySource, PublicList};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const CATEGORY: &str = "https://flagma.kz/companies/kompyutery-ofis-kompanii/";
pub const PAGE_PATH: &str = "page-{page}/?sort=date";

/// Serves canned responses per URL and logs every request
///
/// A URL maps to a queue; the last response of a queue repeats forever.
/// Unknown URLs time out.
pub struct Portal {
    pages: Mutex<HashMap<String, Vec<Result<RawResponse, u16>>>>,
    requests: Mutex<Vec<(String, ProxyHandle)>>,
}

impl Portal {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Page `page` of [`CATEGORY`] answers 200 with `body`
    pub fn page(self, page: u32, body: String) -> Self {
        self.script(page, vec![Ok(RawResponse { status: 200, body })])
    }

    /// Page `page` of [`CATEGORY`] answers with `status` and an error body
    pub fn status(self, page: u32, status: u16) -> Self {
        self.script(page, vec![Err(status)])
    }

    pub fn script(self, page: u32, responses: Vec<Result<RawResponse, u16>>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(page_url(CATEGORY, PAGE_PATH, page), responses);
        self
    }

    pub fn requests(&self) -> Vec<(String, ProxyHandle)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, page: u32) -> usize {
        let url = page_url(CATEGORY, PAGE_PATH, page);
        self.requests().iter().filter(|(u, _)| *u == url).count()
    }
}

#[async_trait]
impl Transport for Portal {
    async fn get(&self, url: &str, proxy: &ProxyHandle) -> Result<RawResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), proxy.clone()));

        let mut pages = self.pages.lock().unwrap();
        let Some(queue) = pages.get_mut(url) else {
            return Err(TransportError::Timeout);
        };
        let next = if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        };
        match next {
            Ok(response) => Ok(response),
            Err(status) => Ok(RawResponse {
                status,
                body: format!("<html><body>error {}</body></html>", status),
            }),
        }
    }
}

pub fn listing(ids: &[u32], last_page: u32) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="page-list-item container job">
                     <div class="header"><a href="https://flagma.kz/{id}/">Company {id}, ТОО</a></div>
                     <span itemprop="location"><span itemprop="name">Алматы</span></span>
                   </div>"#
            )
        })
        .collect();
    format!(
        r#"<!DOCTYPE html><html><body>{}<ul><li class="page notactive"><span>{}</span></li></ul></body></html>"#,
        items, last_page
    )
}

pub fn public_list(n: usize) -> Box<dyn ProxySource> {
    let handles = (1..=n)
        .map(|i| ProxyHandle::new(format!("10.1.0.{}", i), 8080, ProxyProtocol::Http))
        .collect();
    Box::new(PublicList::new(handles, 100))
}

/// Hands out `budget` distinct handles, then reports exhaustion
pub struct Dwindling {
    pub budget: usize,
    pub issued: usize,
}

impl ProxySource for Dwindling {
    fn next(&mut self) -> Result<ProxyHandle, ProxyError> {
        if self.issued >= self.budget {
            return Err(ProxyError::Exhausted {
                backend: "dwindling".to_string(),
            });
        }
        self.issued += 1;
        Ok(ProxyHandle::new(
            format!("10.2.0.{}", self.issued),
            8080,
            ProxyProtocol::Http,
        ))
    }

    fn available(&self) -> usize {
        self.budget.saturating_sub(self.issued)
    }

    fn name(&self) -> &str {
        "dwindling"
    }
}

pub fn shared(portal: Portal) -> Arc<Portal> {
    Arc::new(portal)
}
