// Core structs shared by every engine: Recommendation, Priority, error types
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    LtvCacOptimization,
    RetentionImprovement,
    FrictionReduction,
    OverallOptimization,
    PricingStrategy,
    CompetitivePositioning,
    Crawlability,
    PageSpeed,
    MobileOptimization,
    MetaTags,
    SchemaMarkup,
    InternalLinking,
    TechnicalIssues,
    Security,
}

/// An action item attached to exactly one analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub action: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl Recommendation {
    pub fn new(priority: Priority, kind: RecommendationKind, action: impl Into<String>) -> Self {
        Self {
            priority,
            kind,
            action: action.into(),
            suggestions: Vec::new(),
            metric: None,
        }
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }
}

/// Failure of a single data point lookup. Engines log it and degrade.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("data point unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Maps a client failure; timeouts report the limit that was exceeded.
    pub fn from_reqwest(err: reqwest::Error, limit_ms: u64) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(limit_ms)
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

/// Rejection of a request before any computation starts.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
