pub mod checks;

use crate::analyzer::recommendation::sort_by_priority;
use crate::analyzer::scoring::{CheckResult, overall_score};
use crate::config::SeoThresholds;
use crate::model::{AnalysisError, Priority, Recommendation, RecommendationKind};
use crate::parser::PageSnapshot;
use crate::source::{FetchedPage, SiteSource};
use chrono::{DateTime, Utc};
use checks::SiteEvidence;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

const TIMELINE: &str = "2-8 weeks for full implementation";
const IMPACT: &str = "Improve SEO ranking and user experience";

const BASELINE_IMMEDIATE: [&str; 3] = [
    "Fix critical crawlability issues",
    "Optimize title tags and meta descriptions",
    "Resolve mobile-friendliness issues",
];
const BASELINE_SHORT_TERM: [&str; 3] = [
    "Improve page speed metrics",
    "Implement structured data",
    "Optimize internal linking structure",
];
const BASELINE_LONG_TERM: [&str; 3] = [
    "Comprehensive technical SEO audit",
    "Advanced schema markup implementation",
    "Performance monitoring setup",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSpeedMetrics {
    pub load_time_ms: u32,
    pub fcp_ms: u32,
    pub lcp_ms: u32,
    pub cls: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeoRequest {
    pub url: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeoCategory {
    Crawlability,
    PageSpeed,
    MobileOptimization,
    MetaTags,
    SchemaMarkup,
    InternalLinking,
    TechnicalIssues,
    Security,
}

impl SeoCategory {
    pub const ALL: [SeoCategory; 8] = [
        SeoCategory::Crawlability,
        SeoCategory::PageSpeed,
        SeoCategory::MobileOptimization,
        SeoCategory::MetaTags,
        SeoCategory::SchemaMarkup,
        SeoCategory::InternalLinking,
        SeoCategory::TechnicalIssues,
        SeoCategory::Security,
    ];

    pub fn kind(self) -> RecommendationKind {
        match self {
            SeoCategory::Crawlability => RecommendationKind::Crawlability,
            SeoCategory::PageSpeed => RecommendationKind::PageSpeed,
            SeoCategory::MobileOptimization => RecommendationKind::MobileOptimization,
            SeoCategory::MetaTags => RecommendationKind::MetaTags,
            SeoCategory::SchemaMarkup => RecommendationKind::SchemaMarkup,
            SeoCategory::InternalLinking => RecommendationKind::InternalLinking,
            SeoCategory::TechnicalIssues => RecommendationKind::TechnicalIssues,
            SeoCategory::Security => RecommendationKind::Security,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeoCategory::Crawlability => "crawlability",
            SeoCategory::PageSpeed => "page speed",
            SeoCategory::MobileOptimization => "mobile optimization",
            SeoCategory::MetaTags => "meta tags",
            SeoCategory::SchemaMarkup => "schema markup",
            SeoCategory::InternalLinking => "internal linking",
            SeoCategory::TechnicalIssues => "technical issues",
            SeoCategory::Security => "security",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoCategoryResult {
    pub score: u8,
    pub checks: BTreeMap<String, CheckResult>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRecommendation {
    pub category: SeoCategory,
    pub priority: Priority,
    pub score: u8,
    pub top_issues: Vec<Recommendation>,
    pub estimated_impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub immediate_actions: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
    pub estimated_timeline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoAudit {
    pub url: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub technical_score: u8,
    pub categories: BTreeMap<SeoCategory, SeoCategoryResult>,
    pub priority_recommendations: Vec<PriorityRecommendation>,
    pub action_plan: ActionPlan,
    pub analyzed_at: DateTime<Utc>,
}

pub struct SeoAuditEngine<S> {
    source: S,
    thresholds: SeoThresholds,
    fetch_timeout: Duration,
}

impl<S: SiteSource> SeoAuditEngine<S> {
    pub fn new(source: S, thresholds: SeoThresholds, fetch_timeout: Duration) -> Self {
        Self { source, thresholds, fetch_timeout }
    }

    pub async fn audit(&self, request: &SeoRequest) -> Result<SeoAudit, AnalysisError> {
        let mut audit = self.audit_site(&request.url).await?;
        audit.client_id = request.client_id.clone();
        Ok(audit)
    }

    pub async fn audit_site(&self, url: &str) -> Result<SeoAudit, AnalysisError> {
        let url = parse_site_url(url)?;
        let domain = url.host_str().unwrap_or_default().to_lowercase();
        info!("Auditing {}", url);

        let robots_url = url.join("/robots.txt").map(String::from).unwrap_or_default();
        let sitemap_url = url.join("/sitemap.xml").map(String::from).unwrap_or_default();
        let (page, robots, sitemap, speed) = tokio::join!(
            self.source.fetch_url(url.as_str(), self.fetch_timeout),
            self.source.fetch_url(&robots_url, self.fetch_timeout),
            self.source.fetch_url(&sitemap_url, self.fetch_timeout),
            self.source.page_speed(url.as_str()),
        );

        let page_error = page.as_ref().err().map(|e| e.to_string());
        if let Some(e) = &page_error {
            warn!("Fetching {} failed: {}", url, e);
        }
        let page = page.ok();
        let robots = optional(robots, &robots_url);
        let sitemap = optional(sitemap, &sitemap_url);
        let speed = match speed {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Page speed for {} unavailable: {}", url, e);
                None
            }
        };

        let base = page.as_ref().and_then(|p| Url::parse(&p.final_url).ok()).unwrap_or_else(|| url.clone());
        let body = page.as_ref().map(|p| p.body.as_str()).unwrap_or_default();
        let snapshot = PageSnapshot::parse(body, Some(&base));

        let evidence = SiteEvidence {
            url: &url,
            page: page.as_ref(),
            page_error: page_error.as_deref(),
            snapshot: &snapshot,
            robots: robots.as_ref(),
            sitemap: sitemap.as_ref(),
            speed: speed.as_ref(),
        };
        let categories: BTreeMap<SeoCategory, SeoCategoryResult> = SeoCategory::ALL
            .into_iter()
            .map(|category| (category, checks::audit(category, &evidence, &self.thresholds)))
            .collect();

        let technical_score = overall_score(categories.values().map(|c| c.score));
        let priority_recommendations = priority_recommendations(&categories, &self.thresholds);
        let action_plan = action_plan(&priority_recommendations);

        info!(
            "SEO audit for {} done: score {}, {} priority areas",
            domain,
            technical_score,
            priority_recommendations.len()
        );

        Ok(SeoAudit {
            url: url.to_string(),
            domain,
            client_id: None,
            technical_score,
            categories,
            priority_recommendations,
            action_plan,
            analyzed_at: Utc::now(),
        })
    }
}

fn parse_site_url(raw: &str) -> Result<Url, AnalysisError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AnalysisError::InvalidInput("url is empty".into()));
    }
    let url = Url::parse(raw).map_err(|e| AnalysisError::InvalidInput(format!("url {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AnalysisError::InvalidInput(format!("url {raw:?} is not an http(s) site")));
    }
    Ok(url)
}

fn optional(result: Result<FetchedPage, crate::model::SourceError>, url: &str) -> Option<FetchedPage> {
    match result {
        Ok(page) => Some(page),
        Err(e) => {
            warn!("{} unavailable: {}", url, e);
            None
        }
    }
}

/// One entry per category scoring below the medium threshold, HIGH first.
pub fn priority_recommendations(
    categories: &BTreeMap<SeoCategory, SeoCategoryResult>,
    thresholds: &SeoThresholds,
) -> Vec<PriorityRecommendation> {
    let mut recommendations: Vec<PriorityRecommendation> = categories
        .iter()
        .filter(|(_, result)| result.score < thresholds.medium_priority_below)
        .map(|(category, result)| PriorityRecommendation {
            category: *category,
            priority: if result.score < thresholds.high_priority_below {
                Priority::High
            } else {
                Priority::Medium
            },
            score: result.score,
            top_issues: result
                .recommendations
                .iter()
                .take(thresholds.top_issues_per_category)
                .cloned()
                .collect(),
            estimated_impact: IMPACT.to_string(),
        })
        .collect();
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

/// Immediate actions come from HIGH areas and short-term ones from MEDIUM
/// areas. An empty horizon falls back to the baseline steps.
pub fn action_plan(priorities: &[PriorityRecommendation]) -> ActionPlan {
    let horizon = |priority: Priority, baseline: [&str; 3]| {
        let mut actions: Vec<String> = Vec::new();
        for rec in priorities.iter().filter(|r| r.priority == priority) {
            let mut issues = rec.top_issues.clone();
            sort_by_priority(&mut issues);
            let mut from_issues: Vec<String> = issues.into_iter().map(|i| i.action).collect();
            if from_issues.is_empty() {
                from_issues.push(format!("Improve {}", rec.category.label()));
            }
            for action in from_issues {
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }
        if actions.is_empty() {
            actions = baseline.iter().map(|s| s.to_string()).collect();
        }
        actions
    };

    ActionPlan {
        immediate_actions: horizon(Priority::High, BASELINE_IMMEDIATE),
        short_term: horizon(Priority::Medium, BASELINE_SHORT_TERM),
        long_term: BASELINE_LONG_TERM.iter().map(|s| s.to_string()).collect(),
        estimated_timeline: TIMELINE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::scoring::CheckStatus;
    use crate::model::SourceError;
    use std::collections::HashMap;

    struct StaticSite {
        pages: HashMap<String, FetchedPage>,
        speed: Option<PageSpeedMetrics>,
    }

    impl StaticSite {
        fn unreachable() -> Self {
            Self { pages: HashMap::new(), speed: None }
        }

        fn with_page(mut self, url: &str, headers: &[(&str, &str)], body: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                FetchedPage {
                    requested_url: url.to_string(),
                    final_url: url.to_string(),
                    status: 200,
                    headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                    body: body.to_string(),
                    elapsed_ms: 40,
                },
            );
            self
        }

        fn with_status(mut self, url: &str, status: u16) -> Self {
            if let Some(page) = self.pages.get_mut(url) {
                page.status = status;
            }
            self
        }
    }

    #[async_trait::async_trait]
    impl SiteSource for StaticSite {
        async fn fetch_url(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, SourceError> {
            self.pages.get(url).cloned().ok_or(SourceError::Status(404))
        }

        async fn page_speed(&self, _url: &str) -> Result<PageSpeedMetrics, SourceError> {
            self.speed.clone().ok_or_else(|| SourceError::Unavailable("no lab data".into()))
        }
    }

    fn healthy_html() -> String {
        let links: String = (1..=12).map(|i| format!("<a href=\"/page-{i}\">Page {i}</a>")).collect();
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Acme Widgets - Durable widgets for every workshop</title>
  <meta name="description" content="Acme builds durable widgets for workshops of every size. Browse the catalogue, compare models and order online with free delivery.">
  <meta property="og:title" content="Acme Widgets">
  <meta property="og:description" content="Durable widgets">
  <meta property="og:image" content="https://acme.test/og.png">
  <link rel="canonical" href="https://acme.test/">
  <script type="application/ld+json">
  {{"@context": "https://schema.org", "@graph": [
    {{"@type": "Organization", "name": "Acme"}},
    {{"@type": "BreadcrumbList"}},
    {{"@type": "Product", "aggregateRating": {{"@type": "AggregateRating", "ratingValue": 4.8}}}}
  ]}}
  </script>
</head>
<body>
  <h1>Acme Widgets</h1>
  <h2>Catalogue</h2>
  <img src="/a.png" alt="Widget A" srcset="/a-2x.png 2x">
  <nav>{links}</nav>
</body>
</html>"#
        )
    }

    fn healthy_site() -> StaticSite {
        StaticSite {
            pages: HashMap::new(),
            speed: Some(PageSpeedMetrics { load_time_ms: 1200, fcp_ms: 900, lcp_ms: 1500, cls: 0.02 }),
        }
        .with_page(
            "https://acme.test/",
            &[
                ("strict-transport-security", "max-age=63072000"),
                ("x-content-type-options", "nosniff"),
            ],
            &healthy_html(),
        )
        .with_page("https://acme.test/robots.txt", &[], "User-agent: *\nAllow: /\nSitemap: https://acme.test/sitemap.xml\n")
        .with_page("https://acme.test/sitemap.xml", &[], "<urlset></urlset>")
    }

    fn engine<S: SiteSource>(source: S) -> SeoAuditEngine<S> {
        SeoAuditEngine::new(source, SeoThresholds::default(), Duration::from_secs(5))
    }

    fn category(score: u8, actions: &[(&str, Priority)]) -> SeoCategoryResult {
        SeoCategoryResult {
            score,
            checks: BTreeMap::new(),
            recommendations: actions
                .iter()
                .map(|(a, p)| Recommendation::new(*p, RecommendationKind::MetaTags, *a))
                .collect(),
        }
    }

    #[tokio::test]
    async fn healthy_site_scores_full_marks() {
        let audit = engine(healthy_site()).audit_site("https://acme.test/").await.unwrap();

        assert_eq!(audit.domain, "acme.test");
        assert_eq!(audit.categories.len(), 8);
        for (category, result) in &audit.categories {
            let failing: Vec<_> = result.checks.iter().filter(|(_, c)| !c.is_good()).map(|(n, _)| n).collect();
            assert!(failing.is_empty(), "{category:?} failing checks: {failing:?}");
            assert_eq!(result.score, 100);
            assert!(result.recommendations.is_empty());
        }
        assert_eq!(audit.technical_score, 100);
        assert!(audit.priority_recommendations.is_empty());
        assert_eq!(audit.action_plan.immediate_actions, BASELINE_IMMEDIATE);
        assert_eq!(audit.action_plan.short_term, BASELINE_SHORT_TERM);
        assert_eq!(audit.action_plan.estimated_timeline, TIMELINE);
    }

    #[tokio::test]
    async fn unreachable_site_still_reports_every_category() {
        let audit = engine(StaticSite::unreachable()).audit_site("https://down.test").await.unwrap();

        assert_eq!(audit.categories.len(), 8);
        let scores: Vec<f64> = audit.categories.values().map(|c| c.score as f64).collect();
        let mean = (scores.iter().sum::<f64>() / scores.len() as f64).round() as u8;
        assert_eq!(audit.technical_score, mean);
        assert!(audit.technical_score < 50);

        let crawl = &audit.categories[&SeoCategory::Crawlability];
        assert_eq!(crawl.checks["robots_txt"].status(), CheckStatus::Warning);
        assert_eq!(crawl.checks["sitemap_xml"].status(), CheckStatus::Critical);
        assert_eq!(crawl.checks["crawl_errors"].status(), CheckStatus::Critical);
        assert_eq!(crawl.recommendations[0].priority, Priority::High);

        let priorities: Vec<Priority> = audit.priority_recommendations.iter().map(|p| p.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert!(audit.priority_recommendations.iter().all(|p| p.top_issues.len() <= 2));
        assert!(!audit.action_plan.immediate_actions.is_empty());
    }

    #[tokio::test]
    async fn missing_meta_tags_degrade_without_failing() {
        let site = StaticSite { pages: HashMap::new(), speed: None }
            .with_page("https://bare.test/", &[], "<html><body><p>hello</p></body></html>");
        let audit = engine(site).audit_site("https://bare.test/").await.unwrap();

        let meta = &audit.categories[&SeoCategory::MetaTags];
        assert_eq!(meta.checks["title_tag"].status(), CheckStatus::Warning);
        assert_eq!(meta.checks["meta_description"].status(), CheckStatus::Warning);
        assert_eq!(meta.checks["heading_structure"].status(), CheckStatus::Warning);
        assert_eq!(
            meta.recommendations.iter().find(|r| r.action.starts_with("Optimize title")).and_then(|r| r.metric.clone()),
            Some("Current length: 0".to_string())
        );
    }

    #[tokio::test]
    async fn http_status_follows_the_response_code() {
        let site = healthy_site().with_status("https://acme.test/", 503);
        let audit = engine(site).audit_site("https://acme.test/").await.unwrap();
        let technical = &audit.categories[&SeoCategory::TechnicalIssues];
        assert_eq!(technical.checks["http_status"].status(), CheckStatus::Critical);
        let crawl = &audit.categories[&SeoCategory::Crawlability];
        assert_eq!(crawl.checks["crawl_errors"].status(), CheckStatus::Critical);

        let site = healthy_site().with_status("https://acme.test/", 304);
        let audit = engine(site).audit_site("https://acme.test/").await.unwrap();
        let technical = &audit.categories[&SeoCategory::TechnicalIssues];
        assert_eq!(technical.checks["http_status"].status(), CheckStatus::Warning);
        assert!(audit.categories[&SeoCategory::Crawlability].checks["crawl_errors"].is_good());
    }

    #[tokio::test]
    async fn sparse_linking_reports_both_link_counts() {
        let html = r#"<html><body><a href="/pricing">Pricing</a><a href="//partner.test/">Partner</a></body></html>"#;
        let site = StaticSite { pages: HashMap::new(), speed: None }.with_page("https://thin.test/", &[], html);
        let audit = engine(site).audit_site("https://thin.test/").await.unwrap();

        let linking = &audit.categories[&SeoCategory::InternalLinking];
        assert_eq!(linking.checks["internal_links"].status(), CheckStatus::Critical);
        let rec = linking
            .recommendations
            .iter()
            .find(|r| r.action == "Strengthen internal linking")
            .unwrap();
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(rec.metric.as_deref(), Some("1 internal, 1 external links"));
    }

    #[tokio::test]
    async fn client_id_is_carried_through() {
        let request = SeoRequest { url: "https://acme.test/".into(), client_id: Some("acme".into()) };
        let audit = engine(healthy_site()).audit(&request).await.unwrap();
        assert_eq!(audit.client_id.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn rejects_invalid_urls() {
        for bad in ["", "   ", "not a url", "ftp://files.test/", "mailto:team@acme.test"] {
            let err = engine(StaticSite::unreachable()).audit_site(bad).await.unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidInput(_)), "{bad:?}");
        }
    }

    #[test]
    fn priority_thresholds_are_strict() {
        let mut categories = BTreeMap::new();
        categories.insert(SeoCategory::Crawlability, category(70, &[("a", Priority::Medium)]));
        categories.insert(SeoCategory::PageSpeed, category(69, &[("b", Priority::Medium)]));
        categories.insert(SeoCategory::Security, category(50, &[("s", Priority::Medium)]));
        categories.insert(
            SeoCategory::MetaTags,
            category(49, &[("c", Priority::High), ("d", Priority::Medium), ("e", Priority::Medium)]),
        );

        let recs = priority_recommendations(&categories, &SeoThresholds::default());
        let summary: Vec<(SeoCategory, Priority, usize)> =
            recs.iter().map(|r| (r.category, r.priority, r.top_issues.len())).collect();
        assert_eq!(
            summary,
            vec![
                (SeoCategory::MetaTags, Priority::High, 2),
                (SeoCategory::PageSpeed, Priority::Medium, 1),
                (SeoCategory::Security, Priority::Medium, 1),
            ]
        );
    }

    #[test]
    fn action_plan_follows_priorities() {
        let mut categories = BTreeMap::new();
        categories.insert(SeoCategory::MetaTags, category(25, &[("Fix titles", Priority::High)]));
        let plan = action_plan(&priority_recommendations(&categories, &SeoThresholds::default()));

        assert_eq!(plan.immediate_actions, vec!["Fix titles".to_string()]);
        assert_eq!(plan.short_term, BASELINE_SHORT_TERM);
        assert_eq!(plan.long_term, BASELINE_LONG_TERM);
    }
}
