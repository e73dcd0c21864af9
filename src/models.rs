// Core data structures for the propagator ingestion engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Article validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArticleError {
    #[error("article title must not be empty")]
    EmptyTitle,

    #[error("article url must not be empty")]
    EmptyUrl,

    #[error("article url '{0}' is not absolute")]
    RelativeUrl(String),
}

/// Normalized output of a scrape
///
/// One article per headline extracted for a symbol. Articles travel
/// embedded inside consume tasks and end their life in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Headline text
    pub title: String,

    /// Absolute link to the article
    pub url: String,

    /// Extracted body text (may be empty for headline-only sources)
    pub text: String,

    /// Human-readable name of the originating site
    pub site_name: String,

    /// Stock symbol this article was scraped for
    pub symbol: String,

    /// When the scrape happened
    pub scraped_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article stamped with the current time
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
        site_name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            text: text.into(),
            site_name: site_name.into(),
            symbol: symbol.into(),
            scraped_at: Utc::now(),
        }
    }

    /// Validate the article invariants: non-empty title, absolute url
    pub fn validate(&self) -> Result<(), ArticleError> {
        if self.title.trim().is_empty() {
            return Err(ArticleError::EmptyTitle);
        }
        if self.url.is_empty() {
            return Err(ArticleError::EmptyUrl);
        }
        if Url::parse(&self.url).is_err() {
            return Err(ArticleError::RelativeUrl(self.url.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Article {
        Article::new(
            "Acme beats estimates",
            "https://news.example.com/acme-q3",
            "Acme Corp reported...",
            "Example News",
            "ACME",
        )
    }

    #[test]
    fn test_valid_article() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut article = sample();
        article.title = "  ".to_string();
        assert_eq!(article.validate(), Err(ArticleError::EmptyTitle));
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut article = sample();
        article.url = String::new();
        assert_eq!(article.validate(), Err(ArticleError::EmptyUrl));
    }

    #[test]
    fn test_relative_url_rejected() {
        let mut article = sample();
        article.url = "/acme-q3".to_string();
        assert!(matches!(
            article.validate(),
            Err(ArticleError::RelativeUrl(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let article = sample();
        let json = serde_json::to_string(&article).unwrap();
        let parsed: Article = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, article);
    }
}
