use crate::model::SourceError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// A successfully fetched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    pub requested_url: String,
    pub final_url: String,
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, default_timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(default_timeout)
            .build()
            .map_err(|e| SourceError::Http(e.to_string()))?;

        Ok(Self { client })
    }

    /// Single attempt, bounded by `limit`. Non-2xx responses are errors.
    pub async fn fetch(&self, url: &str, limit: Duration) -> Result<FetchedPage, SourceError> {
        let started = Instant::now();
        let limit_ms = limit.as_millis() as u64;

        let response = match timeout(limit, self.client.get(url).timeout(limit).send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!("Fetch of {} failed: {}", url, e);
                return Err(SourceError::from_reqwest(e, limit_ms));
            }
            Err(_) => {
                warn!("Fetch of {} timed out", url);
                return Err(SourceError::Timeout(limit_ms));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let remaining = limit.saturating_sub(started.elapsed());
        let body = match timeout(remaining, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(SourceError::from_reqwest(e, limit_ms)),
            Err(_) => return Err(SourceError::Timeout(limit_ms)),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!("Fetched {} ({} bytes, {} ms)", url, body.len(), elapsed_ms);

        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            status: status.as_u16(),
            headers,
            body,
            elapsed_ms,
        })
    }
}
