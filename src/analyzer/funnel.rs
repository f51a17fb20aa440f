use crate::analyzer::recommendation::synthesize;
use crate::config::FunnelThresholds;
use crate::model::{AnalysisError, Priority, Recommendation, RecommendationKind};
use crate::source::{FunnelSource, StepCounts};
use crate::utils::{percent, round_to, to_kebab_case};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct FunnelStepDefinition {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunnelRequest {
    pub client_id: String,
    pub steps: Vec<FunnelStepDefinition>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

fn default_timeframe() -> String {
    "30_days".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub name: String,
    pub order: u32,
    pub visitors: u64,
    /// Visitors reaching the next step; always `None` on the final step.
    pub conversions: Option<u64>,
    pub conversion_rate: Option<f64>,
    pub drop_off_rate: Option<f64>,
    pub avg_time_on_step_secs: u32,
    pub bounce_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrictionPoint {
    pub step: String,
    pub next_step: String,
    pub drop_off_rate: f64,
    pub severity: Severity,
    pub potential_impact: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelAnalysis {
    pub funnel_id: String,
    pub client_id: String,
    pub timeframe: String,
    pub steps: Vec<FunnelStep>,
    /// Completions reported for the final step, if the source tracks them.
    pub final_completions: Option<u64>,
    pub overall_conversion: f64,
    pub friction_points: Vec<FrictionPoint>,
    pub recommendations: Vec<Recommendation>,
    pub analyzed_at: DateTime<Utc>,
}

pub struct FunnelEngine<S> {
    source: S,
    thresholds: FunnelThresholds,
}

impl<S: FunnelSource> FunnelEngine<S> {
    pub fn new(source: S, thresholds: FunnelThresholds) -> Self {
        Self { source, thresholds }
    }

    pub async fn analyze_funnel(&self, request: &FunnelRequest) -> Result<FunnelAnalysis, AnalysisError> {
        validate(request)?;
        let client_id = request.client_id.as_str();
        let names: Vec<&str> = request.steps.iter().map(|s| s.name.trim()).collect();
        info!("Analyzing funnel for {} ({} steps)", client_id, names.len());

        let last = names.len() - 1;
        let tasks = names
            .iter()
            .enumerate()
            .map(|(i, name)| self.step_counts(client_id, &request.timeframe, i, name, i < last));
        let counts = join_all(tasks).await;

        let steps: Vec<FunnelStep> = names
            .iter()
            .zip(&counts)
            .enumerate()
            .map(|(i, (name, c))| build_step(i, name, c, i < last))
            .collect();
        let final_completions = counts[last].conversions.map(|c| c.min(counts[last].visitors));

        let overall_conversion = overall_conversion(&steps, final_completions);
        let friction_points = identify_friction_points(&steps, &self.thresholds);
        let recommendations = funnel_recommendations(&friction_points, overall_conversion, &self.thresholds);

        info!(
            "Funnel analysis for {} done: overall {:.2}%, {} friction points",
            client_id,
            overall_conversion,
            friction_points.len()
        );

        Ok(FunnelAnalysis {
            funnel_id: format!("funnel-{}-{}", to_kebab_case(client_id), to_kebab_case(&names.join(" "))),
            client_id: client_id.to_string(),
            timeframe: request.timeframe.clone(),
            steps,
            final_completions,
            overall_conversion,
            friction_points,
            recommendations,
            analyzed_at: Utc::now(),
        })
    }

    async fn step_counts(
        &self,
        client_id: &str,
        timeframe: &str,
        index: usize,
        name: &str,
        has_next: bool,
    ) -> StepCounts {
        match self.source.step_counts(client_id, timeframe, index, name, has_next).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Counts for step {} ({}) unavailable: {}", index + 1, name, e);
                StepCounts {
                    visitors: 0,
                    conversions: None,
                    avg_time_on_step_secs: 0,
                    bounce_rate: 0.0,
                }
            }
        }
    }
}

fn validate(request: &FunnelRequest) -> Result<(), AnalysisError> {
    if request.client_id.trim().is_empty() {
        return Err(AnalysisError::InvalidInput("client_id is required".into()));
    }
    if request.steps.is_empty() {
        return Err(AnalysisError::InvalidInput("funnel needs at least one step".into()));
    }
    if let Some(pos) = request.steps.iter().position(|s| s.name.trim().is_empty()) {
        return Err(AnalysisError::InvalidInput(format!("step {} has no name", pos + 1)));
    }
    Ok(())
}

fn build_step(index: usize, name: &str, counts: &StepCounts, has_next: bool) -> FunnelStep {
    let visitors = counts.visitors;
    let conversions = if has_next {
        counts.conversions.map(|c| c.min(visitors))
    } else {
        None
    };
    let (conversion_rate, drop_off_rate) = match conversions {
        Some(c) if visitors > 0 => (
            Some(round_to(percent(c as f64, visitors as f64), 2)),
            Some(round_to(percent((visitors - c) as f64, visitors as f64), 2)),
        ),
        _ => (None, None),
    };

    FunnelStep {
        name: name.to_string(),
        order: index as u32 + 1,
        visitors,
        conversions,
        conversion_rate,
        drop_off_rate,
        avg_time_on_step_secs: counts.avg_time_on_step_secs,
        bounce_rate: counts.bounce_rate,
    }
}

/// Final-step completions (or final-step visitors) over first-step visitors.
pub fn overall_conversion(steps: &[FunnelStep], final_completions: Option<u64>) -> f64 {
    let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
        return 0.0;
    };
    let reached = match final_completions {
        Some(done) => done,
        None if steps.len() < 2 => return 0.0,
        None => last.visitors,
    };
    round_to(percent(reached as f64, first.visitors as f64), 2)
}

pub fn classify_severity(drop_off_rate: f64, thresholds: &FunnelThresholds) -> Severity {
    if drop_off_rate > thresholds.high_severity {
        Severity::High
    } else if drop_off_rate > thresholds.medium_severity {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Adjacent pairs whose drop-off exceeds the friction threshold, worst first.
pub fn identify_friction_points(steps: &[FunnelStep], thresholds: &FunnelThresholds) -> Vec<FrictionPoint> {
    let mut points: Vec<FrictionPoint> = steps
        .windows(2)
        .filter_map(|pair| {
            let (current, next) = (&pair[0], &pair[1]);
            let rate = current.drop_off_rate?;
            (rate > thresholds.friction_threshold).then(|| FrictionPoint {
                step: current.name.clone(),
                next_step: next.name.clone(),
                drop_off_rate: rate,
                severity: classify_severity(rate, thresholds),
                potential_impact: (current.visitors as f64 * rate / 100.0).floor() as u64,
            })
        })
        .collect();

    points.sort_by(|a, b| b.drop_off_rate.total_cmp(&a.drop_off_rate));
    points
}

pub fn funnel_recommendations(
    friction_points: &[FrictionPoint],
    overall_conversion: f64,
    thresholds: &FunnelThresholds,
) -> Vec<Recommendation> {
    let friction = friction_points
        .iter()
        .filter(|f| f.severity == Severity::High)
        .map(|f| {
            Some(
                Recommendation::new(
                    Priority::High,
                    RecommendationKind::FrictionReduction,
                    format!("Optimize {} - High drop-off detected ({:.2}%)", f.step, f.drop_off_rate),
                )
                .with_metric(format!("Could recover {} users", f.potential_impact))
                .with_suggestions([
                    "Simplify form fields",
                    "Improve page load speed",
                    "Add trust signals",
                    "Optimize mobile experience",
                ]),
            )
        });

    let overall = (overall_conversion < thresholds.overall_conversion_min).then(|| {
        Recommendation::new(
            Priority::Medium,
            RecommendationKind::OverallOptimization,
            "Low overall funnel conversion - comprehensive optimization needed",
        )
        .with_metric(format!("Overall conversion: {overall_conversion:.2}%"))
        .with_suggestions([
            "A/B test key steps",
            "Implement exit-intent popups",
            "Add social proof",
            "Optimize value proposition",
        ])
    });

    synthesize(friction.chain(std::iter::once(overall)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceError;
    use std::collections::HashMap;

    struct FixedSource {
        counts: HashMap<usize, (u64, Option<u64>)>,
    }

    impl FixedSource {
        fn new(counts: &[(u64, Option<u64>)]) -> Self {
            Self { counts: counts.iter().copied().enumerate().collect() }
        }
    }

    #[async_trait::async_trait]
    impl FunnelSource for FixedSource {
        async fn step_counts(
            &self,
            _client_id: &str,
            _timeframe: &str,
            step_index: usize,
            step_name: &str,
            _has_next: bool,
        ) -> Result<StepCounts, SourceError> {
            let (visitors, conversions) = self
                .counts
                .get(&step_index)
                .copied()
                .ok_or_else(|| SourceError::Unavailable(step_name.into()))?;
            Ok(StepCounts { visitors, conversions, avg_time_on_step_secs: 60, bounce_rate: 30.0 })
        }
    }

    fn request(names: &[&str]) -> FunnelRequest {
        FunnelRequest {
            client_id: "acme".into(),
            steps: names.iter().map(|n| FunnelStepDefinition { name: n.to_string() }).collect(),
            timeframe: "30_days".into(),
        }
    }

    fn step(name: &str, visitors: u64, drop_off_rate: Option<f64>) -> FunnelStep {
        FunnelStep {
            name: name.into(),
            order: 1,
            visitors,
            conversions: None,
            conversion_rate: None,
            drop_off_rate,
            avg_time_on_step_secs: 0,
            bounce_rate: 0.0,
        }
    }

    #[tokio::test]
    async fn landing_signup_purchase_example() {
        let source = FixedSource::new(&[(10_000, None), (10_000, Some(3_000)), (3_000, Some(300))]);
        let engine = FunnelEngine::new(source, FunnelThresholds::default());
        let analysis = engine
            .analyze_funnel(&request(&["Landing", "Signup", "Purchase"]))
            .await
            .unwrap();

        assert_eq!(analysis.steps[0].conversion_rate, None);
        assert_eq!(analysis.steps[1].conversion_rate, Some(30.0));
        assert_eq!(analysis.steps[1].drop_off_rate, Some(70.0));
        assert_eq!(analysis.steps[2].conversions, None);
        assert_eq!(analysis.final_completions, Some(300));
        assert_eq!(analysis.overall_conversion, 3.0);

        assert_eq!(analysis.friction_points.len(), 1);
        let friction = &analysis.friction_points[0];
        assert_eq!(friction.step, "Signup");
        assert_eq!(friction.next_step, "Purchase");
        assert_eq!(friction.severity, Severity::Low);
        assert_eq!(friction.potential_impact, 7_000);

        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].kind, RecommendationKind::OverallOptimization);
        assert_eq!(analysis.funnel_id, "funnel-acme-landing-signup-purchase");
    }

    #[tokio::test]
    async fn rates_are_complementary_and_conversions_bounded() {
        let source = FixedSource::new(&[(7_000, Some(9_000)), (4_321, Some(1_234)), (1_234, None)]);
        let engine = FunnelEngine::new(source, FunnelThresholds::default());
        let analysis = engine.analyze_funnel(&request(&["A", "B", "C"])).await.unwrap();

        for step in &analysis.steps {
            if let Some(c) = step.conversions {
                assert!(c <= step.visitors);
            }
            if let (Some(cr), Some(dr)) = (step.conversion_rate, step.drop_off_rate) {
                assert!((cr + dr - 100.0).abs() <= 0.01);
            }
        }
        assert_eq!(analysis.steps[0].conversions, Some(7_000));
        assert_eq!(analysis.steps[0].drop_off_rate, Some(0.0));
        // no completions reported: last-step visitors over first-step visitors
        assert_eq!(analysis.overall_conversion, 17.63);
    }

    #[tokio::test]
    async fn high_friction_emits_recommendation_before_overall() {
        let source = FixedSource::new(&[(10_000, Some(1_000)), (1_000, Some(500)), (500, None)]);
        let engine = FunnelEngine::new(source, FunnelThresholds::default());
        let analysis = engine.analyze_funnel(&request(&["Visit", "Cart", "Pay"])).await.unwrap();

        assert_eq!(analysis.friction_points.len(), 1);
        assert_eq!(analysis.friction_points[0].severity, Severity::High);
        let kinds: Vec<_> = analysis.recommendations.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![RecommendationKind::FrictionReduction, RecommendationKind::OverallOptimization]
        );
        assert_eq!(analysis.recommendations[0].metric.as_deref(), Some("Could recover 9000 users"));
    }

    #[tokio::test]
    async fn unavailable_step_degrades_to_zero_visitors() {
        let source = FixedSource::new(&[(1_000, Some(400))]);
        let engine = FunnelEngine::new(source, FunnelThresholds::default());
        let analysis = engine.analyze_funnel(&request(&["A", "B"])).await.unwrap();

        assert_eq!(analysis.steps[1].visitors, 0);
        assert_eq!(analysis.overall_conversion, 0.0);
    }

    #[tokio::test]
    async fn empty_steps_are_rejected() {
        let engine = FunnelEngine::new(FixedSource::new(&[]), FunnelThresholds::default());
        let err = engine.analyze_funnel(&request(&[])).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn severity_boundaries_are_strict() {
        let t = FunnelThresholds::default();
        assert_eq!(classify_severity(81.0, &t), Severity::High);
        assert_eq!(classify_severity(80.0, &t), Severity::Medium);
        assert_eq!(classify_severity(71.0, &t), Severity::Medium);
        assert_eq!(classify_severity(70.0, &t), Severity::Low);
    }

    #[test]
    fn friction_points_sorted_by_drop_off_with_stable_ties() {
        let steps = vec![
            step("s1", 100, Some(65.0)),
            step("s2", 100, Some(90.0)),
            step("s3", 100, Some(60.0)),
            step("s4", 100, Some(75.0)),
            step("s5", 100, Some(90.0)),
            step("s6", 100, None),
        ];
        let points = identify_friction_points(&steps, &FunnelThresholds::default());
        let order: Vec<&str> = points.iter().map(|p| p.step.as_str()).collect();
        assert_eq!(order, vec!["s2", "s5", "s4", "s1"]);
    }

    #[test]
    fn single_step_funnel_has_zero_overall_conversion() {
        assert_eq!(overall_conversion(&[step("only", 500, None)], None), 0.0);
        assert_eq!(overall_conversion(&[], None), 0.0);
    }
}
