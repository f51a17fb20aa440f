use crate::model::Recommendation;

/// Orders recommendations HIGH, MEDIUM, LOW. Stable: equal priorities keep
/// the order the rules emitted them in.
pub fn sort_by_priority(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Collects the output of a rule table and returns it in priority order.
pub fn synthesize<I>(rules: I) -> Vec<Recommendation>
where
    I: IntoIterator<Item = Option<Recommendation>>,
{
    let mut recommendations: Vec<Recommendation> = rules.into_iter().flatten().collect();
    sort_by_priority(&mut recommendations);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, RecommendationKind};

    #[test]
    fn ties_keep_insertion_order() {
        let recs = synthesize(vec![
            Some(Recommendation::new(Priority::Medium, RecommendationKind::PricingStrategy, "a")),
            None,
            Some(Recommendation::new(Priority::High, RecommendationKind::FrictionReduction, "b")),
            Some(Recommendation::new(Priority::Low, RecommendationKind::MetaTags, "c")),
            Some(Recommendation::new(Priority::High, RecommendationKind::Security, "d")),
            Some(Recommendation::new(Priority::Medium, RecommendationKind::PageSpeed, "e")),
        ]);
        let actions: Vec<&str> = recs.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["b", "d", "a", "e", "c"]);
    }
}
