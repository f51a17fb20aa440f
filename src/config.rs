use crate::analyzer::cohort::CohortRequest;
use crate::analyzer::competitive::CompetitiveRequest;
use crate::analyzer::funnel::FunnelRequest;
use crate::analyzer::seo::SeoRequest;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CohortThresholds {
    pub ltv_cac_min_ratio: f64,
    pub month1_retention_min: f64,
    pub ltv_projection_factor: f64,
    /// Lowest month-over-month retention factor a cohort can fall to.
    pub retention_floor: f64,
    pub currency: String,
}

impl Default for CohortThresholds {
    fn default() -> Self {
        Self {
            ltv_cac_min_ratio: 3.0,
            month1_retention_min: 50.0,
            ltv_projection_factor: 1.3,
            retention_floor: 0.10,
            currency: "EUR".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FunnelThresholds {
    pub friction_threshold: f64,
    pub medium_severity: f64,
    pub high_severity: f64,
    pub overall_conversion_min: f64,
}

impl Default for FunnelThresholds {
    fn default() -> Self {
        Self {
            friction_threshold: 60.0,
            medium_severity: 70.0,
            high_severity: 80.0,
            overall_conversion_min: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompetitiveThresholds {
    pub max_competitors: usize,
    pub immediate_threats: usize,
    pub enterprise_min_employees: u32,
    pub leader_min_monthly_visits: u64,
    pub challenger_min_monthly_visits: u64,
    pub default_industry: String,
}

impl Default for CompetitiveThresholds {
    fn default() -> Self {
        Self {
            max_competitors: 3,
            immediate_threats: 2,
            enterprise_min_employees: 500,
            leader_min_monthly_visits: 2_000_000,
            challenger_min_monthly_visits: 500_000,
            default_industry: "Tech".into(),
        }
    }
}

/// Lower/upper band for a "smaller is better" measurement.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Band {
    pub good_below: f64,
    pub warning_below: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeoThresholds {
    pub medium_priority_below: u8,
    pub high_priority_below: u8,
    pub top_issues_per_category: usize,
    pub load_time_ms: Band,
    pub fcp_ms: Band,
    pub lcp_ms: Band,
    pub cls: Band,
    pub title_length: (usize, usize),
    pub description_length: (usize, usize),
    pub min_internal_links: usize,
    pub page_weight_kb: Band,
}

impl Default for SeoThresholds {
    fn default() -> Self {
        Self {
            medium_priority_below: 70,
            high_priority_below: 50,
            top_issues_per_category: 2,
            load_time_ms: Band { good_below: 3000.0, warning_below: 5000.0 },
            fcp_ms: Band { good_below: 1800.0, warning_below: 3000.0 },
            lcp_ms: Band { good_below: 2500.0, warning_below: 4000.0 },
            cls: Band { good_below: 0.1, warning_below: 0.25 },
            title_length: (30, 60),
            description_length: (120, 160),
            min_internal_links: 10,
            page_weight_kb: Band { good_below: 500.0, warning_below: 2000.0 },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cohort: CohortThresholds,
    pub funnel: FunnelThresholds,
    pub competitive: CompetitiveThresholds,
    pub seo: SeoThresholds,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisRequests {
    pub cohorts: Vec<CohortRequest>,
    pub funnels: Vec<FunnelRequest>,
    pub competitive: Vec<CompetitiveRequest>,
    pub seo: Vec<SeoRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seed of the simulated data source.
    pub seed: u64,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    pub thresholds: Thresholds,
    pub requests: AnalysisRequests,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            fetch_timeout_secs: 10,
            user_agent: "Growth-Audit-Bot/1.0".into(),
            thresholds: Thresholds::default(),
            requests: AnalysisRequests::default(),
        }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    Ok(config)
}
