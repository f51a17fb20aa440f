use crate::analyzer::seo::PageSpeedMetrics;
use crate::model::SourceError;
use crate::source::traits::SiteSource;
use crate::source::{FetchedPage, HttpFetcher, SimulatedSource};
use std::time::Duration;

/// Live page fetches; page-speed figures come from the simulated source
/// until a measurement API is wired in.
pub struct WebSiteSource {
    fetcher: HttpFetcher,
    speed: SimulatedSource,
}

impl WebSiteSource {
    pub fn new(fetcher: HttpFetcher, speed: SimulatedSource) -> Self {
        Self { fetcher, speed }
    }
}

#[async_trait::async_trait]
impl SiteSource for WebSiteSource {
    async fn fetch_url(&self, url: &str, timeout: Duration) -> Result<FetchedPage, SourceError> {
        self.fetcher.fetch(url, timeout).await
    }

    async fn page_speed(&self, url: &str) -> Result<PageSpeedMetrics, SourceError> {
        Ok(self.speed.page_speed_metrics(url))
    }
}
