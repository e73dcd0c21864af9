//! Repository abstraction for the article write path
//!
//! The relational store is an external collaborator; the core only needs
//! "persist this article idempotently". The in-memory implementation
//! backs tests and embedded runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::Article;

/// Persist articles idempotently
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Save one article; saving the same url twice must not duplicate it
    async fn save(&self, scope: &CancellationToken, article: &Article) -> Result<()>;
}

/// In-memory [`ArticleRepository`] keyed by article url
#[derive(Default)]
pub struct MemoryArticleRepository {
    articles: RwLock<HashMap<String, Article>>,
}

impl MemoryArticleRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored articles
    pub fn count(&self) -> usize {
        self.articles.read().unwrap().len()
    }

    /// All stored articles (for assertions)
    pub fn all(&self) -> Vec<Article> {
        self.articles.read().unwrap().values().cloned().collect()
    }

    /// Whether an article with this url has been stored
    pub fn contains_url(&self, url: &str) -> bool {
        self.articles.read().unwrap().contains_key(url)
    }

    /// Drop everything (for tests)
    pub fn clear(&self) {
        self.articles.write().unwrap().clear();
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticleRepository {
    async fn save(&self, _scope: &CancellationToken, article: &Article) -> Result<()> {
        self.articles
            .write()
            .unwrap()
            .insert(article.url.clone(), article.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str) -> Article {
        Article::new("title", url, "text", "Example", "AAPL")
    }

    #[tokio::test]
    async fn test_save_and_lookup() {
        let repo = MemoryArticleRepository::new();
        let scope = CancellationToken::new();

        repo.save(&scope, &sample("https://x/1")).await.unwrap();

        assert_eq!(repo.count(), 1);
        assert!(repo.contains_url("https://x/1"));
        assert!(!repo.contains_url("https://x/2"));
    }

    #[tokio::test]
    async fn test_save_is_idempotent_by_url() {
        let repo = MemoryArticleRepository::new();
        let scope = CancellationToken::new();
        let article = sample("https://x/1");

        repo.save(&scope, &article).await.unwrap();
        repo.save(&scope, &article).await.unwrap();

        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let repo = MemoryArticleRepository::new();
        let scope = CancellationToken::new();

        repo.save(&scope, &sample("https://x/1")).await.unwrap();
        repo.clear();
        assert_eq!(repo.count(), 0);
    }
}
