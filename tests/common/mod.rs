//! Shared fixtures for the integration suites

// Each integration binary compiles its own copy; not all of them use
// every fixture.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use propagator::config::{Stock, StockList};
use propagator::error::Result;
use propagator::models::Article;
use propagator::queue::MemoryQueue;
use propagator::scraper::{ScrapeService, Scraper, SiteScraper};
use propagator::storage::MemoryArticleRepository;
use propagator::task::TaskService;
use propagator::worker::WorkerFactory;

/// Poll timeout used by every test worker; short so shutdown is fast
pub const TEST_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Site scraper stub: one article per symbol, named after it
pub struct StubSite;

#[async_trait]
impl SiteScraper for StubSite {
    async fn scrape(&self, _scope: &CancellationToken, symbol: &str) -> Result<Vec<Article>> {
        Ok(vec![Article::new(
            format!("t-{symbol}"),
            format!("https://x/{symbol}"),
            "",
            "Stub News",
            symbol,
        )])
    }
}

/// The fully wired service graph over an in-memory queue
pub struct Harness {
    pub queue: Arc<MemoryQueue>,
    pub tasks: Arc<TaskService>,
    pub repository: Arc<MemoryArticleRepository>,
    pub factory: Arc<WorkerFactory>,
}

/// Build a harness whose scrape capability is the publishing scrape
/// service with [`StubSite`] registered under "yahoo"
pub fn harness(symbols: &[&str]) -> Harness {
    build_harness(symbols, None)
}

/// Build a harness with a caller-supplied scrape capability
pub fn harness_with_scraper(symbols: &[&str], scraper: Arc<dyn Scraper>) -> Harness {
    build_harness(symbols, Some(scraper))
}

fn build_harness(symbols: &[&str], scraper: Option<Arc<dyn Scraper>>) -> Harness {
    let queue = Arc::new(MemoryQueue::new());
    let tasks = Arc::new(TaskService::new(
        Arc::clone(&queue) as _,
        stock_list(symbols),
    ));

    let scraper: Arc<dyn Scraper> = match scraper {
        Some(custom) => custom,
        None => {
            let service = ScrapeService::new(Arc::clone(&tasks));
            service.register_site("yahoo", Arc::new(StubSite));
            Arc::new(service)
        }
    };

    let repository = Arc::new(MemoryArticleRepository::new());
    let factory = Arc::new(
        WorkerFactory::new(
            scraper,
            Arc::clone(&tasks),
            Arc::clone(&repository) as _,
        )
        .with_poll_timeout(TEST_POLL_TIMEOUT),
    );

    Harness {
        queue,
        tasks,
        repository,
        factory,
    }
}

pub fn stock_list(symbols: &[&str]) -> StockList {
    StockList {
        stocks: symbols
            .iter()
            .map(|s| Stock {
                symbol: s.to_string(),
                name: None,
                enabled: true,
            })
            .collect(),
    }
}

/// Poll a predicate every 50 ms until it holds or the deadline passes
pub async fn wait_for(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    predicate()
}

/// Async variant of [`wait_for`] for predicates that must await
pub async fn wait_until<F, Fut>(deadline: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    loop {
        if predicate().await {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
