use crate::analyzer::recommendation::synthesize;
use crate::analyzer::scoring::normalize;
use crate::config::CompetitiveThresholds;
use crate::model::{AnalysisError, Priority, Recommendation, RecommendationKind};
use crate::source::CompetitorSource;
use crate::utils::{mean, round_to};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use tracing::{info, warn};

/// Capability inventory every feature set is compared against.
pub const CAPABILITIES: [&str; 10] = [
    "Analytics & Reporting",
    "Integration Capabilities",
    "User Management",
    "API Access",
    "Mobile App",
    "Customer Support",
    "Security Features",
    "Customization",
    "Automation",
    "Collaboration Tools",
];

const INDUSTRY_COMPETITORS: [(&str, [&str; 4]); 5] = [
    ("SaaS", ["salesforce.com", "hubspot.com", "intercom.com", "zendesk.com"]),
    ("E-commerce", ["shopify.com", "woocommerce.com", "magento.com", "bigcommerce.com"]),
    ("Fintech", ["stripe.com", "square.com", "paypal.com", "wise.com"]),
    ("Marketing", ["mailchimp.com", "constant-contact.com", "convertkit.com", "activecampaign.com"]),
    ("Tech", ["github.com", "gitlab.com", "bitbucket.org", "sourcetree.com"]),
];

#[derive(Debug, Clone, Deserialize)]
pub struct CompetitiveRequest {
    pub client_domain: String,
    pub industry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub estimated_employees: u32,
    pub estimated_revenue_m_eur: u32,
    pub founding_year: i32,
    pub funding_stage: String,
    pub headquarters: String,
}

/// Share of visits per channel, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficSources {
    pub direct: u32,
    pub search: u32,
    pub social: u32,
    pub referral: u32,
    pub paid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficAnalysis {
    pub monthly_visits: u64,
    pub traffic_sources: TrafficSources,
    pub top_countries: Vec<String>,
    pub bounce_rate: f64,
    pub avg_session_duration_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoSignals {
    pub domain_authority: u8,
    pub organic_keywords: u32,
    pub backlinks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingModel {
    Freemium,
    FreeTrial,
    PremiumOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingStrategy {
    pub model: PricingModel,
    pub tiers_count: u8,
    pub starting_price: Option<f64>,
    pub enterprise_pricing: String,
    pub billing_options: Vec<String>,
    pub free_tier_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFeatures {
    pub total_features: u32,
    pub feature_categories: Vec<String>,
    pub unique_selling_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingStrategy {
    pub content_marketing: bool,
    pub paid_advertising: bool,
    pub seo_focus: bool,
    pub social_media_active: bool,
    pub influencer_partnerships: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPresence {
    pub twitter_followers: u32,
    pub linkedin_followers: u32,
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub domain: String,
    pub detected_method: String,
    pub similarity_score: f64,
}

/// Everything known about one competitor. A facet is `None` when the
/// source could not provide it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    pub domain: String,
    pub similarity_score: f64,
    pub company_info: Option<CompanyInfo>,
    pub traffic_analysis: Option<TrafficAnalysis>,
    pub seo_analysis: Option<SeoSignals>,
    pub pricing_strategy: Option<PricingStrategy>,
    pub product_features: Option<ProductFeatures>,
    pub marketing_strategy: Option<MarketingStrategy>,
    pub social_presence: Option<SocialPresence>,
    pub tech_stack: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketPosition {
    Leader,
    Challenger,
    #[serde(rename = "Niche Player")]
    Niche,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMarket {
    Enterprise,
    #[serde(rename = "SMB")]
    Smb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Positioning {
    pub market_position: MarketPosition,
    pub target_market: TargetMarket,
    pub value_proposition: String,
    pub competitive_strength: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingAnalysis {
    pub market_average_price: Option<f64>,
    pub price_range: Option<PriceRange>,
    pub pricing_strategies: Vec<PricingModel>,
    pub freemium_adoption: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGapAnalysis {
    /// Offered by every profiled competitor.
    pub common_features: Vec<String>,
    /// Offered by none of them.
    pub missing_opportunities: Vec<String>,
    /// Offered by exactly one of them.
    pub differentiators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityKind {
    MarketGap,
    FeatureGap,
    PricingGap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(rename = "type")]
    pub kind: OpportunityKind,
    pub opportunity: String,
    pub potential_impact: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub immediate_threats: Vec<String>,
    pub threat_level: Priority,
    pub key_risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveAnalysis {
    pub client_domain: String,
    pub industry: String,
    pub competitors_analyzed: usize,
    pub competitors: Vec<Competitor>,
    pub competitive_landscape: BTreeMap<String, CompetitorProfile>,
    pub positioning_analysis: BTreeMap<String, Positioning>,
    pub pricing_analysis: PricingAnalysis,
    pub feature_gap_analysis: FeatureGapAnalysis,
    pub market_opportunities: Vec<Opportunity>,
    pub threat_assessment: ThreatAssessment,
    pub recommendations: Vec<Recommendation>,
    pub analyzed_at: DateTime<Utc>,
}

pub struct CompetitiveEngine<S> {
    source: S,
    thresholds: CompetitiveThresholds,
}

impl<S: CompetitorSource> CompetitiveEngine<S> {
    pub fn new(source: S, thresholds: CompetitiveThresholds) -> Self {
        Self { source, thresholds }
    }

    pub async fn analyze_competitors(
        &self,
        client_domain: &str,
        industry: &str,
    ) -> Result<CompetitiveAnalysis, AnalysisError> {
        let client_domain = client_domain.trim();
        if client_domain.is_empty() {
            return Err(AnalysisError::InvalidInput("client_domain is required".into()));
        }
        info!("Analyzing competitors of {} in {}", client_domain, industry);

        let competitors = self.identify_competitors(client_domain, industry).await;
        let profiles: Vec<CompetitorProfile> =
            join_all(competitors.iter().map(|c| self.profile(c))).await;

        let positioning_analysis: BTreeMap<String, Positioning> = profiles
            .iter()
            .map(|p| (p.domain.clone(), position(p, &self.thresholds)))
            .collect();
        let pricing_analysis = analyze_pricing(&profiles);
        let feature_gap_analysis = analyze_feature_gaps(&profiles);
        let market_opportunities =
            identify_opportunities(&positioning_analysis, &pricing_analysis, &feature_gap_analysis);
        let threat_assessment = assess_threats(
            &profiles,
            &positioning_analysis,
            &pricing_analysis,
            &feature_gap_analysis,
            &self.thresholds,
        );
        let recommendations = competitive_recommendations(&pricing_analysis, &positioning_analysis);

        info!(
            "Competitive analysis for {} done: {} competitors, {} recommendations",
            client_domain,
            profiles.len(),
            recommendations.len()
        );

        Ok(CompetitiveAnalysis {
            client_domain: client_domain.to_string(),
            industry: industry.to_string(),
            competitors_analyzed: profiles.len(),
            competitors,
            competitive_landscape: profiles.into_iter().map(|p| (p.domain.clone(), p)).collect(),
            positioning_analysis,
            pricing_analysis,
            feature_gap_analysis,
            market_opportunities,
            threat_assessment,
            recommendations,
            analyzed_at: Utc::now(),
        })
    }

    /// Candidates for the industry, ranked by similarity, top N kept.
    async fn identify_competitors(&self, client_domain: &str, industry: &str) -> Vec<Competitor> {
        let candidates: Vec<&str> = candidate_domains(industry, &self.thresholds.default_industry)
            .into_iter()
            .filter(|d| !d.eq_ignore_ascii_case(client_domain))
            .collect();

        let scores = join_all(candidates.iter().map(|domain| async move {
            match self.source.similarity(client_domain, domain).await {
                Ok(score) => score.clamp(0.0, 1.0),
                Err(e) => {
                    warn!("Similarity for {} unavailable: {}", domain, e);
                    0.0
                }
            }
        }))
        .await;

        let mut competitors: Vec<Competitor> = candidates
            .into_iter()
            .zip(scores)
            .map(|(domain, score)| Competitor {
                domain: domain.to_string(),
                detected_method: "industry_database".into(),
                similarity_score: round_to(score, 3),
            })
            .collect();
        competitors.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        competitors.truncate(self.thresholds.max_competitors);
        competitors
    }

    async fn profile(&self, competitor: &Competitor) -> CompetitorProfile {
        let domain = competitor.domain.as_str();
        let (company, traffic, seo, pricing, features, marketing, social, tech) = tokio::join!(
            self.source.company_info(domain),
            self.source.traffic(domain),
            self.source.seo_signals(domain),
            self.source.pricing(domain),
            self.source.product_features(domain),
            self.source.marketing(domain),
            self.source.social(domain),
            self.source.tech_stack(domain),
        );

        CompetitorProfile {
            domain: domain.to_string(),
            similarity_score: competitor.similarity_score,
            company_info: facet(domain, "company info", company),
            traffic_analysis: facet(domain, "traffic", traffic),
            seo_analysis: facet(domain, "seo", seo),
            pricing_strategy: facet(domain, "pricing", pricing),
            product_features: facet(domain, "features", features),
            marketing_strategy: facet(domain, "marketing", marketing),
            social_presence: facet(domain, "social", social),
            tech_stack: facet(domain, "tech stack", tech),
        }
    }
}

fn facet<T, E: Display>(domain: &str, name: &str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} of {} unavailable: {}", name, domain, e);
            None
        }
    }
}

/// Domains for `industry`, falling back to `default_industry` (then Tech)
/// when the tag is unknown.
pub fn candidate_domains(industry: &str, default_industry: &str) -> Vec<&'static str> {
    let lookup = |tag: &str| {
        INDUSTRY_COMPETITORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tag.trim()))
            .map(|(_, domains)| domains.to_vec())
    };
    lookup(industry)
        .or_else(|| lookup(default_industry))
        .or_else(|| lookup("Tech"))
        .unwrap_or_default()
}

pub fn position(profile: &CompetitorProfile, thresholds: &CompetitiveThresholds) -> Positioning {
    let visits = profile.traffic_analysis.as_ref().map(|t| t.monthly_visits);
    let market_position = match visits {
        Some(v) if v >= thresholds.leader_min_monthly_visits => MarketPosition::Leader,
        Some(v) if v >= thresholds.challenger_min_monthly_visits => MarketPosition::Challenger,
        _ => MarketPosition::Niche,
    };
    let target_market = match &profile.company_info {
        Some(info) if info.estimated_employees > thresholds.enterprise_min_employees => TargetMarket::Enterprise,
        _ => TargetMarket::Smb,
    };
    let value_proposition = profile
        .product_features
        .as_ref()
        .and_then(|f| f.unique_selling_points.first().cloned())
        .unwrap_or_else(|| "Quality solution".into());

    Positioning {
        market_position,
        target_market,
        value_proposition,
        competitive_strength: competitive_strength(profile, thresholds),
    }
}

/// 0–100 blend of reach, product breadth and audience.
fn competitive_strength(profile: &CompetitorProfile, thresholds: &CompetitiveThresholds) -> u8 {
    let traffic = profile
        .traffic_analysis
        .as_ref()
        .map(|t| normalize(t.monthly_visits as f64, thresholds.leader_min_monthly_visits as f64))
        .unwrap_or(0.0);
    let features = profile
        .product_features
        .as_ref()
        .map(|f| normalize(f.feature_categories.len() as f64, CAPABILITIES.len() as f64))
        .unwrap_or(0.0);
    let authority = profile
        .seo_analysis
        .as_ref()
        .map(|s| s.domain_authority as f64)
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);

    (traffic * 0.4 + features * 0.3 + authority * 0.3).round() as u8
}

pub fn analyze_pricing(profiles: &[CompetitorProfile]) -> PricingAnalysis {
    let pricing: Vec<&PricingStrategy> = profiles.iter().filter_map(|p| p.pricing_strategy.as_ref()).collect();
    let prices: Vec<f64> = pricing
        .iter()
        .filter_map(|p| p.starting_price)
        .filter(|&price| price > 0.0)
        .collect();

    let price_range = if prices.is_empty() {
        None
    } else {
        Some(PriceRange {
            min: prices.iter().copied().fold(f64::INFINITY, f64::min),
            max: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    };

    PricingAnalysis {
        market_average_price: mean(&prices).map(|v| round_to(v, 2)),
        price_range,
        pricing_strategies: pricing.iter().map(|p| p.model).collect(),
        freemium_adoption: pricing.iter().filter(|p| p.free_tier_available).count(),
    }
}

pub fn analyze_feature_gaps(profiles: &[CompetitorProfile]) -> FeatureGapAnalysis {
    let inventories: Vec<&ProductFeatures> = profiles.iter().filter_map(|p| p.product_features.as_ref()).collect();
    let offered_by = |capability: &str| {
        inventories
            .iter()
            .filter(|f| f.feature_categories.iter().any(|c| c == capability))
            .count()
    };

    let mut gaps = FeatureGapAnalysis {
        common_features: Vec::new(),
        missing_opportunities: Vec::new(),
        differentiators: Vec::new(),
    };
    for capability in CAPABILITIES {
        let count = offered_by(capability);
        if count == 0 {
            gaps.missing_opportunities.push(capability.to_string());
        } else if count == inventories.len() {
            gaps.common_features.push(capability.to_string());
        } else if count == 1 {
            gaps.differentiators.push(capability.to_string());
        }
    }
    gaps
}

pub fn identify_opportunities(
    positioning: &BTreeMap<String, Positioning>,
    pricing: &PricingAnalysis,
    gaps: &FeatureGapAnalysis,
) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    if !positioning.is_empty() && positioning.values().all(|p| p.target_market == TargetMarket::Enterprise) {
        opportunities.push(Opportunity {
            kind: OpportunityKind::MarketGap,
            opportunity: "Underserved SMB segment".into(),
            potential_impact: Priority::High,
        });
    }
    for capability in &gaps.missing_opportunities {
        opportunities.push(Opportunity {
            kind: OpportunityKind::FeatureGap,
            opportunity: format!("{capability} missing in market"),
            potential_impact: Priority::Medium,
        });
    }
    if !pricing.pricing_strategies.is_empty() && pricing.freemium_adoption == 0 {
        opportunities.push(Opportunity {
            kind: OpportunityKind::PricingGap,
            opportunity: "No competitor offers a free tier".into(),
            potential_impact: Priority::Medium,
        });
    }
    opportunities
}

/// The most similar competitors are the immediate threats; the level follows
/// the strongest position among them.
pub fn assess_threats(
    profiles: &[CompetitorProfile],
    positioning: &BTreeMap<String, Positioning>,
    pricing: &PricingAnalysis,
    gaps: &FeatureGapAnalysis,
    thresholds: &CompetitiveThresholds,
) -> ThreatAssessment {
    let immediate_threats: Vec<String> = profiles
        .iter()
        .take(thresholds.immediate_threats)
        .map(|p| p.domain.clone())
        .collect();

    let threat_level = immediate_threats
        .iter()
        .filter_map(|d| positioning.get(d))
        .map(|p| match p.market_position {
            MarketPosition::Leader => Priority::High,
            MarketPosition::Challenger => Priority::Medium,
            MarketPosition::Niche => Priority::Low,
        })
        .max()
        .unwrap_or(Priority::Low);

    let leaders = positioning
        .values()
        .filter(|p| p.market_position == MarketPosition::Leader)
        .count();
    let mut key_risks = Vec::new();
    if pricing.freemium_adoption > 0 {
        key_risks.push("Price competition".to_string());
    }
    if !gaps.common_features.is_empty() {
        key_risks.push("Feature parity".to_string());
    }
    if leaders >= 2 {
        key_risks.push("Market saturation".to_string());
    }

    ThreatAssessment {
        immediate_threats,
        threat_level,
        key_risks,
    }
}

pub fn competitive_recommendations(
    pricing: &PricingAnalysis,
    positioning: &BTreeMap<String, Positioning>,
) -> Vec<Recommendation> {
    let pricing_rec = pricing.market_average_price.filter(|&p| p > 0.0).map(|avg| {
        Recommendation::new(
            Priority::Medium,
            RecommendationKind::PricingStrategy,
            format!("Market average pricing is {avg:.2}€ - optimize your pricing strategy"),
        )
        .with_metric(format!("Freemium adoption: {}", pricing.freemium_adoption))
        .with_suggestions([
            "Consider competitive pricing positioning",
            "Evaluate value-based pricing model",
            "Test freemium strategy if not implemented",
        ])
    });

    let leaders = positioning
        .values()
        .filter(|p| p.market_position == MarketPosition::Leader)
        .count();
    let positioning_rec = (leaders > 0).then(|| {
        Recommendation::new(
            Priority::High,
            RecommendationKind::CompetitivePositioning,
            "Strong competitors identified - differentiation strategy needed",
        )
        .with_metric(format!("Market leaders: {leaders}"))
        .with_suggestions([
            "Focus on unique value proposition",
            "Identify underserved market segments",
            "Develop superior customer experience",
        ])
    });

    synthesize([pricing_rec, positioning_rec])
}
