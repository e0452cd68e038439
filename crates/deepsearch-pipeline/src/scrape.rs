//! Scrape Stage
//!
//! Bounded-concurrency dispatch of the top-K ranked results to the crawler.
//! Failures and under-length content are filtered; the returned order
//! follows input order, not completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;

use deepsearch_core::model::{ScrapedContent, SearchResult};

use crate::crawler_client::{CrawlRequest, CrawlerClient};

#[derive(Clone, Debug)]
pub struct ScrapeConfig {
    pub max_scrape_urls: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    pub extraction_strategy: String,
    pub min_content_length: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_scrape_urls: 5,
            concurrency: 5,
            timeout: Duration::from_secs(15),
            extraction_strategy: "markdown".into(),
            min_content_length: 100,
        }
    }
}

impl ScrapeConfig {
    #[must_use]
    pub fn from_config(config: &deepsearch_core::Config) -> Self {
        Self {
            max_scrape_urls: config.max_scrape_urls,
            concurrency: config.scraping_concurrency,
            timeout: config.scraping_timeout,
            extraction_strategy: config.scraping_extraction_strategy.clone(),
            min_content_length: config.scraping_min_content_length,
        }
    }
}

/// Scrapes the first `config.max_scrape_urls` results, respecting
/// `config.concurrency` via a semaphore. Each failed or under-length fetch
/// is dropped from the output.
pub async fn scrape_results(
    crawler: Arc<dyn CrawlerClient>,
    results: &[SearchResult],
    config: &ScrapeConfig,
) -> Vec<ScrapedContent> {
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let targets: Vec<&SearchResult> = results.iter().take(config.max_scrape_urls).collect();

    let tasks = targets.into_iter().map(|result| {
        let crawler = crawler.clone();
        let semaphore = semaphore.clone();
        let url = result.url.clone();
        let extraction_strategy = config.extraction_strategy.clone();
        let timeout = config.timeout;

        async move {
            let _permit = semaphore.acquire().await.expect("semaphore never closed");
            let request = CrawlRequest { url: url.clone(), extraction_strategy, css_selector: None };
            match crawler.crawl(request, timeout).await {
                Ok(response) if response.success => Some(ScrapedContent {
                    url: response.url,
                    title: String::new(),
                    content: response.content,
                    markdown: None,
                    extracted_data: response.extracted_data,
                    word_count: 0,
                    success: true,
                    error_message: None,
                }),
                Ok(response) => {
                    tracing::debug!(url = %url, error = ?response.error_message, "scrape reported failure");
                    None
                }
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "scrape call failed");
                    None
                }
            }
        }
    });

    join_all(tasks)
        .await
        .into_iter()
        .flatten()
        .filter(|scraped| scraped.content.len() >= config.min_content_length)
        .map(|mut scraped| {
            scraped.word_count = scraped.content.split_whitespace().count();
            scraped
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepsearch_core::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCrawler {
        content: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CrawlerClient for FixedCrawler {
        async fn crawl(&self, request: CrawlRequest, _timeout: Duration) -> Result<crate::crawler_client::CrawlResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(crate::crawler_client::CrawlResponse {
                url: request.url,
                content: self.content.to_string(),
                extracted_data: None,
                success: true,
                error_message: None,
            })
        }
    }

    #[tokio::test]
    async fn filters_content_below_minimum_length() {
        let crawler: Arc<dyn CrawlerClient> = Arc::new(FixedCrawler { content: "short", calls: AtomicUsize::new(0) });
        let results = vec![SearchResult::new("Title", "https://a", "desc", "whoogle")];
        let config = ScrapeConfig { min_content_length: 100, ..Default::default() };

        let scraped = scrape_results(crawler, &results, &config).await;
        assert!(scraped.is_empty());
    }

    #[tokio::test]
    async fn respects_max_scrape_urls_cap() {
        let crawler: Arc<dyn CrawlerClient> =
            Arc::new(FixedCrawler { content: &"word ".repeat(50), calls: AtomicUsize::new(0) });
        let results: Vec<SearchResult> =
            (0..10).map(|i| SearchResult::new("Title", format!("https://a/{i}"), "desc", "whoogle")).collect();
        let config = ScrapeConfig { max_scrape_urls: 3, min_content_length: 10, ..Default::default() };

        let scraped = scrape_results(crawler, &results, &config).await;
        assert_eq!(scraped.len(), 3);
    }
}
