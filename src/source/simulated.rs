// Deterministic stand-in for analytics platforms and competitor intelligence feeds.
use crate::analyzer::competitive::{
    CAPABILITIES, CompanyInfo, MarketingStrategy, PricingModel, PricingStrategy, ProductFeatures,
    SeoSignals, SocialPresence, TrafficAnalysis, TrafficSources,
};
use crate::analyzer::seo::PageSpeedMetrics;
use crate::model::SourceError;
use crate::source::traits::{CohortSource, CompetitorSource, FunnelSource, MonthlySpend, StepCounts};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FUNDING_STAGES: [&str; 4] = ["Seed", "Series A", "Series B", "Public"];
const HEADQUARTERS: [&str; 4] = ["San Francisco", "New York", "London", "Berlin"];
const TOP_COUNTRIES: [&str; 4] = ["United States", "United Kingdom", "Germany", "France"];
const SELLING_POINTS: [&str; 4] = [
    "Advanced AI capabilities",
    "Superior user experience",
    "Extensive integrations",
    "Enterprise-grade security",
];
const TECHNOLOGIES: [&str; 7] = ["React", "Vue.js", "Angular", "Node.js", "Python", "AWS", "Google Cloud"];

/// Every data point is drawn from an RNG seeded by `(seed, key)`, so the
/// value for a key never depends on call order.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    seed: u64,
}

impl SimulatedSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng(&self, key: &str) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ fnv1a(key))
    }

    fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
        items[rng.random_range(0..items.len())]
    }

    pub fn page_speed_metrics(&self, url: &str) -> PageSpeedMetrics {
        let mut rng = self.rng(&format!("speed:{url}"));
        PageSpeedMetrics {
            load_time_ms: rng.random_range(1000..7000),
            fcp_ms: rng.random_range(500..3500),
            lcp_ms: rng.random_range(1000..5000),
            cls: (rng.random::<f64>() * 0.5 * 1000.0).round() / 1000.0,
        }
    }
}

fn fnv1a(key: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[async_trait::async_trait]
impl CohortSource for SimulatedSource {
    async fn initial_cohort_size(&self, client_id: &str, cohort_month: &str) -> Result<u32, SourceError> {
        let mut rng = self.rng(&format!("cohort:{client_id}:{cohort_month}"));
        Ok(rng.random_range(100..1100))
    }

    async fn retention_factor(
        &self,
        client_id: &str,
        cohort_month: &str,
        month_index: u32,
    ) -> Result<f64, SourceError> {
        let mut rng = self.rng(&format!("retention:{client_id}:{cohort_month}:{month_index}"));
        Ok(0.7 + rng.random::<f64>() * 0.2)
    }

    async fn revenue_per_user(
        &self,
        client_id: &str,
        cohort_month: &str,
        month_index: u32,
    ) -> Result<f64, SourceError> {
        let mut rng = self.rng(&format!("revenue:{client_id}:{cohort_month}:{month_index}"));
        Ok(25.0 + rng.random::<f64>() * 50.0)
    }

    async fn spend_and_acquisitions(&self, client_id: &str, month: &str) -> Result<MonthlySpend, SourceError> {
        let mut rng = self.rng(&format!("spend:{client_id}:{month}"));
        Ok(MonthlySpend {
            marketing_spend: rng.random_range(2000..7000) as f64,
            users_acquired: rng.random_range(50..250),
        })
    }
}

#[async_trait::async_trait]
impl FunnelSource for SimulatedSource {
    async fn step_counts(
        &self,
        client_id: &str,
        timeframe: &str,
        step_index: usize,
        step_name: &str,
        has_next: bool,
    ) -> Result<StepCounts, SourceError> {
        let mut rng = self.rng(&format!("step:{client_id}:{timeframe}:{step_index}:{step_name}"));
        let visitors: u64 = rng.random_range(1000..11000);
        let share = rng.random::<f64>() * 0.4 + 0.1;
        let conversions = has_next.then(|| (visitors as f64 * share).floor() as u64);
        Ok(StepCounts {
            visitors,
            conversions,
            avg_time_on_step_secs: rng.random_range(30..330),
            bounce_rate: ((rng.random::<f64>() * 40.0 + 10.0) * 100.0).round() / 100.0,
        })
    }
}

#[async_trait::async_trait]
impl CompetitorSource for SimulatedSource {
    async fn similarity(&self, client_domain: &str, competitor: &str) -> Result<f64, SourceError> {
        let mut rng = self.rng(&format!("similarity:{client_domain}:{competitor}"));
        Ok(rng.random::<f64>() * 0.4 + 0.6)
    }

    async fn company_info(&self, domain: &str) -> Result<CompanyInfo, SourceError> {
        let mut rng = self.rng(&format!("company:{domain}"));
        Ok(CompanyInfo {
            estimated_employees: rng.random_range(50..1050),
            estimated_revenue_m_eur: rng.random_range(5..55),
            founding_year: rng.random_range(2015..2023),
            funding_stage: Self::pick(&mut rng, &FUNDING_STAGES).to_string(),
            headquarters: Self::pick(&mut rng, &HEADQUARTERS).to_string(),
        })
    }

    async fn traffic(&self, domain: &str) -> Result<TrafficAnalysis, SourceError> {
        let mut rng = self.rng(&format!("traffic:{domain}"));
        Ok(TrafficAnalysis {
            monthly_visits: rng.random_range(100_000..5_100_000),
            traffic_sources: TrafficSources {
                direct: rng.random_range(20..60),
                search: rng.random_range(20..60),
                social: rng.random_range(5..25),
                referral: rng.random_range(5..20),
                paid: rng.random_range(2..12),
            },
            top_countries: TOP_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            bounce_rate: ((rng.random::<f64>() * 30.0 + 35.0) * 10.0).round() / 10.0,
            avg_session_duration_secs: rng.random_range(120..420),
        })
    }

    async fn seo_signals(&self, domain: &str) -> Result<SeoSignals, SourceError> {
        let mut rng = self.rng(&format!("seo:{domain}"));
        Ok(SeoSignals {
            domain_authority: rng.random_range(30..95),
            organic_keywords: rng.random_range(1_000..200_000),
            backlinks: rng.random_range(10_000..5_000_000),
        })
    }

    async fn pricing(&self, domain: &str) -> Result<PricingStrategy, SourceError> {
        let mut rng = self.rng(&format!("pricing:{domain}"));
        let model = match rng.random_range(0..3) {
            0 => PricingModel::Freemium,
            1 => PricingModel::FreeTrial,
            _ => PricingModel::PremiumOnly,
        };
        Ok(PricingStrategy {
            model,
            tiers_count: rng.random_range(2..5),
            starting_price: Some(rng.random_range(10..60) as f64),
            enterprise_pricing: "Custom".into(),
            billing_options: vec!["Monthly".into(), "Annual".into()],
            free_tier_available: rng.random_bool(0.5),
        })
    }

    async fn product_features(&self, domain: &str) -> Result<ProductFeatures, SourceError> {
        let mut rng = self.rng(&format!("features:{domain}"));
        let categories = rng.random_range(5..10);
        let selling_points = rng.random_range(1..4);
        Ok(ProductFeatures {
            total_features: rng.random_range(15..35),
            feature_categories: CAPABILITIES[..categories].iter().map(|c| c.to_string()).collect(),
            unique_selling_points: SELLING_POINTS[..selling_points].iter().map(|s| s.to_string()).collect(),
        })
    }

    async fn marketing(&self, domain: &str) -> Result<MarketingStrategy, SourceError> {
        let mut rng = self.rng(&format!("marketing:{domain}"));
        Ok(MarketingStrategy {
            content_marketing: rng.random_bool(0.7),
            paid_advertising: rng.random_bool(0.6),
            seo_focus: rng.random_bool(0.8),
            social_media_active: rng.random_bool(0.4),
            influencer_partnerships: rng.random_bool(0.3),
        })
    }

    async fn social(&self, domain: &str) -> Result<SocialPresence, SourceError> {
        let mut rng = self.rng(&format!("social:{domain}"));
        Ok(SocialPresence {
            twitter_followers: rng.random_range(1_000..51_000),
            linkedin_followers: rng.random_range(500..20_500),
            engagement_rate: ((rng.random::<f64>() * 5.0 + 1.0) * 100.0).round() / 100.0,
        })
    }

    async fn tech_stack(&self, domain: &str) -> Result<Vec<String>, SourceError> {
        let mut rng = self.rng(&format!("tech:{domain}"));
        let count = rng.random_range(2..6);
        Ok(TECHNOLOGIES[..count].iter().map(|t| t.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_same_value_regardless_of_order() {
        let source = SimulatedSource::new(11);
        let a = source.initial_cohort_size("acme", "2026-01").await.unwrap();
        let _ = source.initial_cohort_size("acme", "2025-12").await.unwrap();
        let b = source.initial_cohort_size("acme", "2026-01").await.unwrap();
        assert_eq!(a, b);
        assert!((100..1100).contains(&a));
    }

    #[tokio::test]
    async fn ranges_follow_reference_generator() {
        let source = SimulatedSource::new(3);
        for month in 1..12 {
            let factor = source.retention_factor("acme", "2026-01", month).await.unwrap();
            assert!((0.7..=0.9).contains(&factor));
            let rpu = source.revenue_per_user("acme", "2026-01", month).await.unwrap();
            assert!((25.0..=75.0).contains(&rpu));
        }

        let last = source.step_counts("acme", "30_days", 2, "Purchase", false).await.unwrap();
        assert_eq!(last.conversions, None);
        let first = source.step_counts("acme", "30_days", 0, "Landing", true).await.unwrap();
        let conversions = first.conversions.unwrap();
        assert!(conversions <= first.visitors);
    }

    #[test]
    fn page_speed_is_stable_per_url() {
        let source = SimulatedSource::new(5);
        assert_eq!(
            source.page_speed_metrics("https://acme.io"),
            source.page_speed_metrics("https://acme.io")
        );
    }
}
