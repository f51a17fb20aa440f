use crate::analyzer::competitive::{
    CompanyInfo, MarketingStrategy, PricingStrategy, ProductFeatures, SeoSignals, SocialPresence,
    TrafficAnalysis,
};
use crate::analyzer::seo::PageSpeedMetrics;
use crate::model::SourceError;
use crate::source::FetchedPage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlySpend {
    pub marketing_spend: f64,
    pub users_acquired: u32,
}

/// Raw counts for one funnel step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepCounts {
    pub visitors: u64,
    /// Visitors that reached the next step, or completions on the final step.
    pub conversions: Option<u64>,
    pub avg_time_on_step_secs: u32,
    pub bounce_rate: f64,
}

#[async_trait::async_trait]
pub trait CohortSource: Send + Sync {
    async fn initial_cohort_size(&self, client_id: &str, cohort_month: &str) -> Result<u32, SourceError>;

    /// Share of the previous month's users still active at `month_index`.
    async fn retention_factor(
        &self,
        client_id: &str,
        cohort_month: &str,
        month_index: u32,
    ) -> Result<f64, SourceError>;

    async fn revenue_per_user(
        &self,
        client_id: &str,
        cohort_month: &str,
        month_index: u32,
    ) -> Result<f64, SourceError>;

    async fn spend_and_acquisitions(&self, client_id: &str, month: &str) -> Result<MonthlySpend, SourceError>;
}

#[async_trait::async_trait]
pub trait FunnelSource: Send + Sync {
    async fn step_counts(
        &self,
        client_id: &str,
        timeframe: &str,
        step_index: usize,
        step_name: &str,
        has_next: bool,
    ) -> Result<StepCounts, SourceError>;
}

#[async_trait::async_trait]
pub trait CompetitorSource: Send + Sync {
    /// Similarity of `competitor` to the client, in `[0, 1]`.
    async fn similarity(&self, client_domain: &str, competitor: &str) -> Result<f64, SourceError>;
    async fn company_info(&self, domain: &str) -> Result<CompanyInfo, SourceError>;
    async fn traffic(&self, domain: &str) -> Result<TrafficAnalysis, SourceError>;
    async fn seo_signals(&self, domain: &str) -> Result<SeoSignals, SourceError>;
    async fn pricing(&self, domain: &str) -> Result<PricingStrategy, SourceError>;
    async fn product_features(&self, domain: &str) -> Result<ProductFeatures, SourceError>;
    async fn marketing(&self, domain: &str) -> Result<MarketingStrategy, SourceError>;
    async fn social(&self, domain: &str) -> Result<SocialPresence, SourceError>;
    async fn tech_stack(&self, domain: &str) -> Result<Vec<String>, SourceError>;
}

#[async_trait::async_trait]
pub trait SiteSource: Send + Sync {
    async fn fetch_url(&self, url: &str, timeout: Duration) -> Result<FetchedPage, SourceError>;
    async fn page_speed(&self, url: &str) -> Result<PageSpeedMetrics, SourceError>;
}
