use crate::analyzer::recommendation::synthesize;
use crate::config::CohortThresholds;
use crate::model::{AnalysisError, Priority, Recommendation, RecommendationKind};
use crate::source::{CohortSource, MonthlySpend};
use crate::utils::{mean, month_key, percent, ratio, relative_delta, round_to};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, warn};

/// Months at which the retention curve is summarised.
pub const RETENTION_MILESTONES: [u32; 4] = [1, 3, 6, 12];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "6_months")]
    SixMonths,
    #[default]
    #[serde(rename = "12_months")]
    TwelveMonths,
}

impl Timeframe {
    pub fn months(self) -> u32 {
        match self {
            Timeframe::SixMonths => 6,
            Timeframe::TwelveMonths => 12,
        }
    }
}

impl FromStr for Timeframe {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "6_months" => Ok(Timeframe::SixMonths),
            "12_months" => Ok(Timeframe::TwelveMonths),
            other => Err(AnalysisError::InvalidInput(format!("unsupported timeframe '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CohortRequest {
    pub client_id: String,
    #[serde(default)]
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPoint {
    pub users: u32,
    /// Share of the cohort's initial users, in percent.
    pub retention_rate: f64,
}

/// Users acquired in one calendar month, followed through their lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub cohort_month: String,
    pub initial_users: u32,
    pub retention_by_month: BTreeMap<u32, RetentionPoint>,
    pub revenue_by_month: BTreeMap<u32, f64>,
    pub cumulative_revenue: f64,
}

impl Cohort {
    pub fn ltv(&self) -> f64 {
        ratio(self.cumulative_revenue, self.initial_users as f64).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvRecord {
    pub period_key: String,
    pub value: f64,
    pub currency: String,
    pub total_revenue: f64,
    pub total_users: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacRecord {
    pub period_key: String,
    /// `None` when nobody was acquired that month.
    pub value: Option<f64>,
    pub currency: String,
    pub marketing_spend: f64,
    pub users_acquired: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvAnalysis {
    pub average_ltv: f64,
    pub predicted_ltv_12_months: f64,
    pub ltv_by_cohort: Vec<LtvRecord>,
    pub ltv_trend: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacAnalysis {
    pub average_cac: Option<f64>,
    /// Total spend over total users acquired.
    pub blended_cac: Option<f64>,
    pub total_marketing_spend: f64,
    pub total_users_acquired: u64,
    pub cac_by_month: Vec<CacRecord>,
    pub cac_trend: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionAnalysis {
    pub avg_retention_month_1: Option<f64>,
    pub avg_retention_month_3: Option<f64>,
    pub avg_retention_month_6: Option<f64>,
    pub avg_retention_month_12: Option<f64>,
    pub retention_curve: BTreeMap<u32, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetrics {
    pub total_revenue: f64,
    pub total_users: u64,
    pub average_revenue_per_user: f64,
    pub revenue_growth_rate: f64,
    pub user_growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortAnalysis {
    pub client_id: String,
    pub timeframe: Timeframe,
    pub cohorts: Vec<Cohort>,
    pub ltv_analysis: LtvAnalysis,
    pub cac_analysis: CacAnalysis,
    pub retention_analysis: RetentionAnalysis,
    pub business_metrics: BusinessMetrics,
    pub ltv_cac_ratio: Option<f64>,
    pub recommendations: Vec<Recommendation>,
    pub analyzed_at: DateTime<Utc>,
}

pub struct CohortEngine<S> {
    source: S,
    thresholds: CohortThresholds,
}

impl<S: CohortSource> CohortEngine<S> {
    pub fn new(source: S, thresholds: CohortThresholds) -> Self {
        Self { source, thresholds }
    }

    pub async fn analyze_cohorts(
        &self,
        client_id: &str,
        timeframe: Timeframe,
    ) -> Result<CohortAnalysis, AnalysisError> {
        self.analyze_cohorts_as_of(client_id, timeframe, Utc::now().date_naive())
            .await
    }

    /// Analyzes the `timeframe` months ending with the month of `anchor`.
    pub async fn analyze_cohorts_as_of(
        &self,
        client_id: &str,
        timeframe: Timeframe,
        anchor: NaiveDate,
    ) -> Result<CohortAnalysis, AnalysisError> {
        if client_id.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("client_id is required".into()));
        }
        info!("Analyzing cohorts for {} over {} months", client_id, timeframe.months());

        let months: Vec<String> = (0..timeframe.months()).map(|i| month_key(anchor, i)).collect();

        let cohort_tasks = months
            .iter()
            .enumerate()
            .map(|(age, month)| self.build_cohort(client_id, month, age as u32));
        let spend_tasks = months.iter().map(|month| self.monthly_spend(client_id, month));
        let (cohorts, spend) = tokio::join!(join_all(cohort_tasks), join_all(spend_tasks));

        let cohorts: Vec<Cohort> = cohorts.into_iter().flatten().collect();
        let ltv_analysis = self.ltv_analysis(&cohorts);
        let cac_analysis = self.cac_analysis(&months, &spend);
        let retention_analysis = retention_analysis(&cohorts);
        let business_metrics = business_metrics(&cohorts);

        let ltv_cac_ratio = cac_analysis
            .average_cac
            .and_then(|cac| ratio(ltv_analysis.average_ltv, cac))
            .map(|r| round_to(r, 2));
        let recommendations = cohort_recommendations(
            ltv_analysis.average_ltv,
            cac_analysis.average_cac,
            &retention_analysis,
            &self.thresholds,
        );

        info!(
            "Cohort analysis for {} done: {} cohorts, {} recommendations",
            client_id,
            cohorts.len(),
            recommendations.len()
        );

        Ok(CohortAnalysis {
            client_id: client_id.to_string(),
            timeframe,
            cohorts,
            ltv_analysis,
            cac_analysis,
            retention_analysis,
            business_metrics,
            ltv_cac_ratio,
            recommendations,
            analyzed_at: Utc::now(),
        })
    }

    /// Walks months `0..=age` of one cohort. Returns `None` when the cohort
    /// size is unavailable.
    async fn build_cohort(&self, client_id: &str, cohort_month: &str, age: u32) -> Option<Cohort> {
        let initial_users = match self.source.initial_cohort_size(client_id, cohort_month).await {
            Ok(0) => {
                warn!("Cohort {} has no users, skipping", cohort_month);
                return None;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Cohort size for {} unavailable: {}", cohort_month, e);
                return None;
            }
        };

        let floor = self.thresholds.retention_floor;
        let mut retention_by_month = BTreeMap::new();
        let mut revenue_by_month = BTreeMap::new();
        let mut cumulative_revenue = 0.0;
        let mut remaining = initial_users;

        for month in 0..=age {
            if month > 0 {
                let factor = match self.source.retention_factor(client_id, cohort_month, month).await {
                    Ok(f) if f.is_finite() => f.clamp(floor, 1.0),
                    Ok(_) => floor,
                    Err(e) => {
                        warn!("Retention for {} month {} unavailable: {}", cohort_month, month, e);
                        floor
                    }
                };
                remaining = (remaining as f64 * factor).floor() as u32;
            }

            retention_by_month.insert(
                month,
                RetentionPoint {
                    users: remaining,
                    retention_rate: round_to(percent(remaining as f64, initial_users as f64), 1),
                },
            );

            let per_user = match self.source.revenue_per_user(client_id, cohort_month, month).await {
                Ok(v) if v.is_finite() => v.max(0.0),
                Ok(_) => 0.0,
                Err(e) => {
                    warn!("Revenue for {} month {} unavailable: {}", cohort_month, month, e);
                    0.0
                }
            };
            let monthly_revenue = remaining as f64 * per_user;
            revenue_by_month.insert(month, round_to(monthly_revenue, 2));
            cumulative_revenue += monthly_revenue;
        }

        Some(Cohort {
            cohort_month: cohort_month.to_string(),
            initial_users,
            retention_by_month,
            revenue_by_month,
            cumulative_revenue: round_to(cumulative_revenue, 2),
        })
    }

    async fn monthly_spend(&self, client_id: &str, month: &str) -> Option<MonthlySpend> {
        match self.source.spend_and_acquisitions(client_id, month).await {
            Ok(spend) => Some(spend),
            Err(e) => {
                warn!("Spend for {} unavailable: {}", month, e);
                None
            }
        }
    }

    fn ltv_analysis(&self, cohorts: &[Cohort]) -> LtvAnalysis {
        let currency = self.thresholds.currency.clone();
        let ltv_by_cohort: Vec<LtvRecord> = cohorts
            .iter()
            .map(|c| LtvRecord {
                period_key: c.cohort_month.clone(),
                value: round_to(c.ltv(), 2),
                currency: currency.clone(),
                total_revenue: c.cumulative_revenue,
                total_users: c.initial_users,
            })
            .collect();

        let values: Vec<f64> = ltv_by_cohort.iter().map(|r| r.value).collect();
        let average_ltv = round_to(mean(&values).unwrap_or(0.0), 2);

        LtvAnalysis {
            average_ltv,
            predicted_ltv_12_months: round_to(average_ltv * self.thresholds.ltv_projection_factor, 2),
            ltv_trend: round_to(relative_delta(&values), 2),
            ltv_by_cohort,
            currency,
        }
    }

    fn cac_analysis(&self, months: &[String], spend: &[Option<MonthlySpend>]) -> CacAnalysis {
        let currency = self.thresholds.currency.clone();
        let cac_by_month: Vec<CacRecord> = months
            .iter()
            .zip(spend)
            .filter_map(|(month, s)| s.map(|s| (month, s)))
            .map(|(month, s)| CacRecord {
                period_key: month.clone(),
                value: ratio(s.marketing_spend, s.users_acquired as f64).map(|v| round_to(v, 2)),
                currency: currency.clone(),
                marketing_spend: s.marketing_spend,
                users_acquired: s.users_acquired,
            })
            .collect();

        let total_marketing_spend: f64 = cac_by_month.iter().map(|r| r.marketing_spend).sum();
        let total_users_acquired: u64 = cac_by_month.iter().map(|r| r.users_acquired as u64).sum();
        let values: Vec<f64> = cac_by_month.iter().filter_map(|r| r.value).collect();

        CacAnalysis {
            average_cac: mean(&values).map(|v| round_to(v, 2)),
            blended_cac: ratio(total_marketing_spend, total_users_acquired as f64).map(|v| round_to(v, 2)),
            total_marketing_spend,
            total_users_acquired,
            cac_trend: round_to(relative_delta(&values), 2),
            cac_by_month,
            currency,
        }
    }
}

pub fn retention_analysis(cohorts: &[Cohort]) -> RetentionAnalysis {
    let retention_curve: BTreeMap<u32, Vec<f64>> = RETENTION_MILESTONES
        .iter()
        .map(|&m| {
            let rates = cohorts
                .iter()
                .filter_map(|c| c.retention_by_month.get(&m))
                .map(|p| p.retention_rate)
                .collect();
            (m, rates)
        })
        .collect();

    let avg = |m: u32| {
        retention_curve
            .get(&m)
            .and_then(|rates| mean(rates))
            .map(|v| round_to(v, 1))
    };

    RetentionAnalysis {
        avg_retention_month_1: avg(1),
        avg_retention_month_3: avg(3),
        avg_retention_month_6: avg(6),
        avg_retention_month_12: avg(12),
        retention_curve,
    }
}

/// Growth rates compare the newest cohort to the oldest one in the window.
pub fn business_metrics(cohorts: &[Cohort]) -> BusinessMetrics {
    let total_revenue: f64 = cohorts.iter().map(|c| c.cumulative_revenue).sum();
    let total_users: u64 = cohorts.iter().map(|c| c.initial_users as u64).sum();
    let revenues: Vec<f64> = cohorts.iter().map(|c| c.cumulative_revenue).collect();
    let users: Vec<f64> = cohorts.iter().map(|c| c.initial_users as f64).collect();

    BusinessMetrics {
        total_revenue: round_to(total_revenue, 2),
        total_users,
        average_revenue_per_user: round_to(ratio(total_revenue, total_users as f64).unwrap_or(0.0), 2),
        revenue_growth_rate: round_to(relative_delta(&revenues), 1),
        user_growth_rate: round_to(relative_delta(&users), 1),
    }
}

pub fn cohort_recommendations(
    average_ltv: f64,
    average_cac: Option<f64>,
    retention: &RetentionAnalysis,
    thresholds: &CohortThresholds,
) -> Vec<Recommendation> {
    let ltv_cac = average_cac.and_then(|cac| ratio(average_ltv, cac)).and_then(|r| {
        (r < thresholds.ltv_cac_min_ratio).then(|| {
            Recommendation::new(
                Priority::High,
                RecommendationKind::LtvCacOptimization,
                format!(
                    "Improve LTV/CAC ratio - Currently below healthy threshold of {}:1",
                    thresholds.ltv_cac_min_ratio
                ),
            )
            .with_metric(format!("LTV/CAC Ratio: {r:.2}"))
            .with_suggestions([
                "Optimize marketing spend efficiency",
                "Increase customer lifetime value",
                "Improve retention strategies",
                "Focus on higher-value customer segments",
            ])
        })
    });

    let month_one = retention.avg_retention_month_1.and_then(|rate| {
        (rate < thresholds.month1_retention_min).then(|| {
            Recommendation::new(
                Priority::High,
                RecommendationKind::RetentionImprovement,
                "Critical: Low first-month retention",
            )
            .with_metric(format!("Month 1 Retention: {rate}%"))
            .with_suggestions([
                "Improve onboarding experience",
                "Implement early engagement campaigns",
                "Optimize product-market fit",
                "Add customer success touchpoints",
            ])
        })
    });

    synthesize([ltv_cac, month_one])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceError;

    struct FixedSource {
        factor: f64,
        missing_month: Option<&'static str>,
        spend_available: bool,
        /// Month in which spend acquired nobody.
        idle_month: Option<&'static str>,
    }

    impl FixedSource {
        fn steady() -> Self {
            Self { factor: 0.8, missing_month: None, spend_available: true, idle_month: None }
        }
    }

    #[async_trait::async_trait]
    impl CohortSource for FixedSource {
        async fn initial_cohort_size(&self, _client_id: &str, cohort_month: &str) -> Result<u32, SourceError> {
            if self.missing_month == Some(cohort_month) {
                return Err(SourceError::Unavailable(cohort_month.into()));
            }
            Ok(1000)
        }

        async fn retention_factor(&self, _: &str, _: &str, _: u32) -> Result<f64, SourceError> {
            Ok(self.factor)
        }

        async fn revenue_per_user(&self, _: &str, _: &str, _: u32) -> Result<f64, SourceError> {
            Ok(10.0)
        }

        async fn spend_and_acquisitions(&self, _: &str, month: &str) -> Result<MonthlySpend, SourceError> {
            if !self.spend_available {
                return Err(SourceError::Timeout(10_000));
            }
            if self.idle_month == Some(month) {
                return Ok(MonthlySpend { marketing_spend: 2000.0, users_acquired: 0 });
            }
            Ok(MonthlySpend { marketing_spend: 5000.0, users_acquired: 100 })
        }
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn retention_with_month_one(rate: Option<f64>) -> RetentionAnalysis {
        RetentionAnalysis {
            avg_retention_month_1: rate,
            avg_retention_month_3: None,
            avg_retention_month_6: None,
            avg_retention_month_12: None,
            retention_curve: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn retention_starts_at_100_and_never_increases() {
        let engine = CohortEngine::new(FixedSource::steady(), CohortThresholds::default());
        let analysis = engine
            .analyze_cohorts_as_of("acme", Timeframe::TwelveMonths, anchor())
            .await
            .unwrap();

        assert_eq!(analysis.cohorts.len(), 12);
        for cohort in &analysis.cohorts {
            assert_eq!(cohort.retention_by_month[&0].retention_rate, 100.0);
            let users: Vec<u32> = cohort.retention_by_month.values().map(|p| p.users).collect();
            assert!(users.windows(2).all(|w| w[1] <= w[0]));
        }
        assert_eq!(analysis.cohorts[0].cohort_month, "2026-06");
        assert_eq!(analysis.cohorts[11].cohort_month, "2025-07");
        assert_eq!(analysis.cohorts[11].retention_by_month.len(), 12);
    }

    #[tokio::test]
    async fn six_month_window_metrics() {
        let engine = CohortEngine::new(FixedSource::steady(), CohortThresholds::default());
        let analysis = engine
            .analyze_cohorts_as_of("acme", Timeframe::SixMonths, anchor())
            .await
            .unwrap();

        // users: 1000, 800, 640, 512, 409, 327 -> LTVs 10, 18, 24.4, 29.52, 33.61, 36.88
        assert_eq!(analysis.ltv_analysis.average_ltv, 25.4);
        assert_eq!(analysis.ltv_analysis.predicted_ltv_12_months, 33.02);
        assert_eq!(analysis.cac_analysis.average_cac, Some(50.0));
        assert_eq!(analysis.cac_analysis.blended_cac, Some(50.0));
        assert_eq!(analysis.cac_analysis.cac_trend, 0.0);
        assert_eq!(analysis.ltv_cac_ratio, Some(0.51));
        assert_eq!(analysis.retention_analysis.avg_retention_month_1, Some(80.0));
        assert_eq!(analysis.retention_analysis.avg_retention_month_12, None);

        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::LtvCacOptimization);
        assert_eq!(analysis.recommendations[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn retention_is_bounded_below_by_floor() {
        let source = FixedSource { factor: 0.01, ..FixedSource::steady() };
        let engine = CohortEngine::new(source, CohortThresholds::default());
        let analysis = engine
            .analyze_cohorts_as_of("acme", Timeframe::SixMonths, anchor())
            .await
            .unwrap();

        let oldest = analysis.cohorts.last().unwrap();
        assert_eq!(oldest.retention_by_month[&1].users, 100);
        assert_eq!(oldest.retention_by_month[&2].users, 10);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::RetentionImprovement));
    }

    #[tokio::test]
    async fn source_failures_degrade_instead_of_failing() {
        let source = FixedSource {
            missing_month: Some("2026-05"),
            spend_available: false,
            ..FixedSource::steady()
        };
        let engine = CohortEngine::new(source, CohortThresholds::default());
        let analysis = engine
            .analyze_cohorts_as_of("acme", Timeframe::SixMonths, anchor())
            .await
            .unwrap();

        assert_eq!(analysis.cohorts.len(), 5);
        assert!(analysis.cohorts.iter().all(|c| c.cohort_month != "2026-05"));
        assert_eq!(analysis.cac_analysis.average_cac, None);
        assert_eq!(analysis.ltv_cac_ratio, None);
        assert!(analysis.recommendations.is_empty());
    }

    #[tokio::test]
    async fn month_without_acquisitions_has_no_cac() {
        let source = FixedSource { idle_month: Some("2026-04"), ..FixedSource::steady() };
        let engine = CohortEngine::new(source, CohortThresholds::default());
        let cac = engine
            .analyze_cohorts_as_of("acme", Timeframe::SixMonths, anchor())
            .await
            .unwrap()
            .cac_analysis;

        assert_eq!(cac.cac_by_month.len(), 6);
        let idle = cac.cac_by_month.iter().find(|r| r.period_key == "2026-04").unwrap();
        assert_eq!(idle.users_acquired, 0);
        assert_eq!(idle.value, None);
        assert!(cac.cac_by_month.iter().filter(|r| r.period_key != "2026-04").all(|r| r.value == Some(50.0)));

        // Mean over the five months that acquired users; blended keeps the idle spend.
        assert_eq!(cac.average_cac, Some(50.0));
        assert_eq!(cac.total_marketing_spend, 27000.0);
        assert_eq!(cac.total_users_acquired, 500);
        assert_eq!(cac.blended_cac, Some(54.0));
    }

    #[tokio::test]
    async fn empty_client_id_is_rejected() {
        let engine = CohortEngine::new(FixedSource::steady(), CohortThresholds::default());
        let err = engine.analyze_cohorts(" ", Timeframe::SixMonths).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn ltv_cac_rule_boundary() {
        let thresholds = CohortThresholds::default();
        let healthy = retention_with_month_one(Some(80.0));

        assert!(cohort_recommendations(150.0, Some(50.0), &healthy, &thresholds).is_empty());
        let recs = cohort_recommendations(149.5, Some(50.0), &healthy, &thresholds);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::LtvCacOptimization);
        assert!(cohort_recommendations(150.0, Some(0.0), &healthy, &thresholds).is_empty());
    }

    #[test]
    fn month_one_retention_rule_boundary() {
        let thresholds = CohortThresholds::default();

        assert!(cohort_recommendations(300.0, Some(50.0), &retention_with_month_one(Some(50.0)), &thresholds)
            .is_empty());
        let recs =
            cohort_recommendations(300.0, Some(50.0), &retention_with_month_one(Some(49.9)), &thresholds);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, RecommendationKind::RetentionImprovement);
    }

    #[test]
    fn growth_is_zero_for_a_single_cohort() {
        let cohort = Cohort {
            cohort_month: "2026-06".into(),
            initial_users: 200,
            retention_by_month: BTreeMap::from([(0, RetentionPoint { users: 200, retention_rate: 100.0 })]),
            revenue_by_month: BTreeMap::from([(0, 5000.0)]),
            cumulative_revenue: 5000.0,
        };
        let metrics = business_metrics(&[cohort]);
        assert_eq!(metrics.revenue_growth_rate, 0.0);
        assert_eq!(metrics.user_growth_rate, 0.0);
        assert_eq!(metrics.average_revenue_per_user, 25.0);
    }

    #[test]
    fn timeframe_parses_reference_values() {
        assert_eq!("6_months".parse::<Timeframe>().unwrap(), Timeframe::SixMonths);
        assert_eq!("12_months".parse::<Timeframe>().unwrap(), Timeframe::TwelveMonths);
        assert!("3_months".parse::<Timeframe>().is_err());
    }
}
