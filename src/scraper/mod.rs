//! Scraper capability
//!
//! The execution core never touches HTML or HTTP. It sees one narrow
//! contract: given (source, symbol, scope), produce normalized articles
//! and, as a side effect, publish one consume task per article - the
//! hand-off to the consume queue. Site extraction plugs in behind the
//! [`SiteScraper`] trait, one implementation per source.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::Article;
use crate::task::TaskService;

/// Scrape capability errors
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// No site scraper is registered for the requested source
    #[error("no scraper registered for source '{0}'")]
    UnknownSource(String),

    /// The site scraper itself failed
    #[error("scrape of '{symbol}' from '{site}' failed: {reason}")]
    Failed {
        site: String,
        symbol: String,
        reason: String,
    },
}

impl ScrapeError {
    /// Create a scrape failure error
    pub fn failed(
        source: impl Into<String>,
        symbol: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed {
            site: source.into(),
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Site failures are usually transient; a missing registration is not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The capability consumed by scraper workers
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Scrape one symbol from one source and publish the results
    ///
    /// Implementations publish a consume task per produced article;
    /// callers must not re-publish.
    async fn scrape_and_publish(
        &self,
        scope: &CancellationToken,
        source: &str,
        symbol: &str,
    ) -> Result<Vec<Article>>;
}

/// Per-source extraction seam
///
/// Everything behind this trait (selector application, user-agent
/// rotation, HTTP) is external to the core.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    /// Extract articles for one symbol
    async fn scrape(&self, scope: &CancellationToken, symbol: &str) -> Result<Vec<Article>>;
}

/// Registry-backed [`Scraper`] that publishes consume tasks
///
/// Holds one [`SiteScraper`] per source name and the task service used
/// for the hand-off to the consume queue.
pub struct ScrapeService {
    tasks: Arc<TaskService>,
    sites: RwLock<HashMap<String, Arc<dyn SiteScraper>>>,
}

impl ScrapeService {
    /// Create a service with an empty site registry
    pub fn new(tasks: Arc<TaskService>) -> Self {
        Self {
            tasks,
            sites: RwLock::new(HashMap::new()),
        }
    }

    /// Register the extraction implementation for a source
    pub fn register_site(&self, source: impl Into<String>, scraper: Arc<dyn SiteScraper>) {
        let source = source.into();
        tracing::debug!(source = %source, "registered site scraper");
        self.sites.write().unwrap().insert(source, scraper);
    }

    /// Names of all registered sources
    pub fn sources(&self) -> Vec<String> {
        self.sites.read().unwrap().keys().cloned().collect()
    }

    fn site(&self, source: &str) -> Result<Arc<dyn SiteScraper>> {
        self.sites
            .read()
            .unwrap()
            .get(source)
            .cloned()
            .ok_or_else(|| ScrapeError::UnknownSource(source.to_string()).into())
    }
}

#[async_trait]
impl Scraper for ScrapeService {
    async fn scrape_and_publish(
        &self,
        scope: &CancellationToken,
        source: &str,
        symbol: &str,
    ) -> Result<Vec<Article>> {
        let site = self.site(source)?;
        let articles = site.scrape(scope, symbol).await?;

        for article in &articles {
            if let Err(e) = article.validate() {
                tracing::warn!(symbol, source, error = %e, "dropping invalid article");
                continue;
            }

            let task = TaskService::consume_task(symbol, source, article)?;
            self.tasks.enqueue(&task).await?;
        }

        tracing::debug!(symbol, source, articles = articles.len(), "published consume tasks");
        Ok(articles)
    }
}
