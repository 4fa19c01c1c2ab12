use crate::parser::{LinkBase, embedded_metadata_payloads, has_next_page, parse_episode_page_with};
use crate::types::EpisodeRecord;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, StatusCode};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.8,en-US;q=0.5,en;q=0.3";

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Page not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub listing_url: String,
    pub site_origin: String,
    pub media_base_url: String,
    /// Upper bound on pages fetched for a single month.
    pub max_pages: u32,
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            listing_url: crate::LISTING_URL.to_string(),
            site_origin: crate::SITE_ORIGIN.to_string(),
            media_base_url: crate::MEDIA_BASE_URL.to_string(),
            max_pages: 200,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A source of listing pages, one per (month, year, page).
pub trait PageSource {
    fn fetch_page(
        &self,
        month: u32,
        year: i32,
        page: u32,
    ) -> impl Future<Output = Result<String, ScraperError>>;

    fn link_base(&self) -> LinkBase<'_> {
        LinkBase::default()
    }
}

/// Summary of a single listing request, used to inspect the shape of the site.
#[derive(Debug, Clone)]
pub struct PageReport {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: usize,
    pub items: usize,
    pub has_next_page: bool,
    pub first_payload: Option<String>,
}

impl Display for PageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "URL:          {}", self.url)?;
        writeln!(f, "Status:       {}", self.status)?;
        writeln!(
            f,
            "Content-Type: {}",
            self.content_type.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "Body size:    {} bytes", self.bytes)?;
        writeln!(f, "Items:        {}", self.items)?;
        writeln!(
            f,
            "Next page:    {}",
            if self.has_next_page { "yes" } else { "no" }
        )?;
        if let Some(payload) = &self.first_payload {
            writeln!(f, "data-setup:   {}", payload)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    config: ScraperConfig,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_config(ScraperConfig::default())
    }

    pub fn with_config(config: ScraperConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
        );
        if let Ok(referer) = HeaderValue::from_str(&config.media_base_url) {
            headers.insert(REFERER, referer);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn page_url(&self, month: u32, year: i32, page: u32) -> String {
        format!(
            "{}?month={}&year={}&search=&page={}",
            self.config.listing_url, month, year, page
        )
    }

    /// Every episode broadcast in the given month, across all listing pages.
    pub async fn fetch_month(&self, month: u32, year: i32) -> Vec<EpisodeRecord> {
        walk_month(self, month, year, self.config.max_pages).await
    }

    /// Issues one listing request and describes what came back, without
    /// failing on non-success statuses.
    pub async fn analyze(
        &self,
        month: u32,
        year: i32,
        page: u32,
    ) -> Result<PageReport, ScraperError> {
        let url = self.page_url(month, year, page);
        log::info!("Analyzing {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        for (name, value) in response.headers() {
            log::debug!("{}: {:?}", name, value);
        }

        let html = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?;

        let items = parse_episode_page_with(&html, self.link_base()).len();
        Ok(PageReport {
            url,
            status,
            content_type,
            bytes: html.len(),
            items,
            has_next_page: has_next_page(&html),
            first_payload: embedded_metadata_payloads(&html).into_iter().next(),
        })
    }

    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScraperError::NotFound(url.to_string()));
        }

        Ok(response
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

impl PageSource for WebScraper {
    async fn fetch_page(&self, month: u32, year: i32, page: u32) -> Result<String, ScraperError> {
        let url = self.page_url(month, year, page);
        log::info!("Fetching {:02}/{} page {}...", month, year, page);
        self.get_html(&url).await
    }

    fn link_base(&self) -> LinkBase<'_> {
        LinkBase {
            site_origin: &self.config.site_origin,
            media_base_url: &self.config.media_base_url,
        }
    }
}

/// Walks the listing pages of one month in order and concatenates their
/// episodes.
///
/// The walk ends at the first page without episodes (not included), at the
/// first page without a next-page link (included), on the first fetch error
/// (earlier pages kept), or after `max_pages` pages.
pub async fn walk_month<S: PageSource>(
    source: &S,
    month: u32,
    year: i32,
    max_pages: u32,
) -> Vec<EpisodeRecord> {
    let mut episodes = Vec::new();

    for page in 1..=max_pages {
        let html = match source.fetch_page(month, year, page).await {
            Ok(html) => html,
            Err(e) => {
                log::warn!(
                    "Stopping {:02}/{} at page {} after a failed request: {}",
                    month,
                    year,
                    page,
                    e
                );
                return episodes;
            }
        };

        let parsed = parse_episode_page_with(&html, source.link_base());
        if parsed.is_empty() {
            log::debug!("{:02}/{} page {} has no episodes", month, year, page);
            return episodes;
        }

        log::debug!(
            "{:02}/{} page {}: {} episode(s)",
            month,
            year,
            page,
            parsed.len()
        );
        episodes.extend(parsed);

        if !has_next_page(&html) {
            return episodes;
        }
    }

    log::warn!(
        "Reached the limit of {} pages for {:02}/{}, stopping",
        max_pages,
        month,
        year
    );
    episodes
}
