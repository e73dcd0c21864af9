//! Typed task records and the queue naming convention
//!
//! A [`Task`] is the immutable unit of work that travels over the broker.
//! Tasks are serialized as UTF-8 JSON onto the queue named after their
//! type (`task:scrape`, `task:consume`). Unknown parameter keys survive a
//! round-trip so that newer producers can talk to older consumers.

pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Article;

pub use service::TaskService;

/// Task construction and decoding errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Queue payload did not decode as a task
    #[error("malformed task payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Task could not be serialized for the queue
    #[error("failed to encode task: {0}")]
    Encode(#[source] serde_json::Error),

    /// A required parameter is absent or empty
    #[error("task is missing required parameter '{0}'")]
    MissingParam(&'static str),

    /// The embedded article envelope did not decode
    #[error("malformed article payload: {0}")]
    MalformedArticle(#[source] serde_json::Error),
}

/// Closed set of task discriminators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Scrape a source for one symbol and publish the articles
    Scrape,
    /// Persist one published article
    Consume,
}

impl TaskType {
    /// String form used in queue names and the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::Consume => "consume",
        }
    }

    /// Queue name for this task type (`task:<type>`)
    pub fn queue_name(&self) -> String {
        format!("task:{}", self.as_str())
    }

    /// Dead-letter queue name for this task type
    pub fn dead_letter_queue(&self) -> String {
        format!("task:{}:dead", self.as_str())
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task parameters
///
/// Well-known keys are typed fields; anything else lands in `extra` and
/// is written back verbatim on re-serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Article envelope for consume tasks; either a structured object or
    /// an embedded JSON string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<serde_json::Value>,

    /// Unrecognized parameter keys, preserved across round-trips
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Immutable unit of work on a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub params: TaskParams,

    /// Lower is earlier; reserved for future ordering, queues stay FIFO
    #[serde(default)]
    pub priority: i32,

    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create an empty task of the given type
    pub fn new(task_type: TaskType) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            task_type,
            params: TaskParams::default(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    /// Create a scrape task for one symbol from one source
    pub fn scrape(symbol: impl Into<String>, source: impl Into<String>) -> Self {
        let mut task = Self::new(TaskType::Scrape);
        task.params.symbol = Some(symbol.into());
        task.params.source = Some(source.into());
        task
    }

    /// Create a consume task carrying an article envelope
    pub fn consume(
        symbol: impl Into<String>,
        source: impl Into<String>,
        article: &Article,
    ) -> Result<Self, TaskError> {
        let mut task = Self::new(TaskType::Consume);
        task.params.symbol = Some(symbol.into());
        task.params.source = Some(source.into());
        task.params.article = Some(serde_json::to_value(article).map_err(TaskError::Encode)?);
        Ok(task)
    }

    /// Queue this task belongs on
    pub fn queue_name(&self) -> String {
        self.task_type.queue_name()
    }

    /// Serialize to the wire format
    pub fn encode(&self) -> Result<Vec<u8>, TaskError> {
        serde_json::to_vec(self).map_err(TaskError::Encode)
    }

    /// Deserialize from the wire format
    pub fn decode(payload: &[u8]) -> Result<Self, TaskError> {
        serde_json::from_slice(payload).map_err(TaskError::Malformed)
    }

    /// The symbol parameter, required non-empty for scrape tasks
    pub fn symbol(&self) -> Result<&str, TaskError> {
        match self.params.symbol.as_deref() {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(TaskError::MissingParam("symbol")),
        }
    }

    /// The source parameter, required non-empty for scrape tasks
    pub fn source(&self) -> Result<&str, TaskError> {
        match self.params.source.as_deref() {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(TaskError::MissingParam("source")),
        }
    }

    /// Decode the article envelope of a consume task
    ///
    /// Accepts both a structured object and an embedded JSON string: the
    /// structured form is tried first, a string value is re-parsed.
    pub fn article(&self) -> Result<Article, TaskError> {
        let value = self
            .params
            .article
            .as_ref()
            .ok_or(TaskError::MissingParam("article"))?;

        match value {
            serde_json::Value::String(embedded) => {
                serde_json::from_str(embedded).map_err(TaskError::MalformedArticle)
            }
            structured => {
                serde_json::from_value(structured.clone()).map_err(TaskError::MalformedArticle)
            }
        }
    }
}
