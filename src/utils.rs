// Utility functions
use chrono::{Datelike, Months, NaiveDate};

/// Rounds to the given number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `numerator / denominator`, or `None` when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Percentage of `part` in `whole`, zero when `whole` is zero.
pub fn percent(part: f64, whole: f64) -> f64 {
    ratio(part, whole).map(|r| r * 100.0).unwrap_or(0.0)
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Relative change from `oldest` to `newest` in percent.
/// Zero when the series is shorter than two points or the base is zero.
pub fn relative_delta(series_newest_first: &[f64]) -> f64 {
    if series_newest_first.len() < 2 {
        return 0.0;
    }
    let newest = series_newest_first[0];
    let oldest = series_newest_first[series_newest_first.len() - 1];
    ratio(newest - oldest, oldest).map(|r| r * 100.0).unwrap_or(0.0)
}

/// `YYYY-MM` key for the month `offset` months before `anchor`.
pub fn month_key(anchor: NaiveDate, offset: u32) -> String {
    let month = anchor
        .with_day(1)
        .and_then(|d| d.checked_sub_months(Months::new(offset)))
        .unwrap_or(anchor);
    month.format("%Y-%m").to_string()
}

/// Converts a string into kebab-case.
pub fn to_kebab_case(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_delta_needs_two_points() {
        assert_eq!(relative_delta(&[]), 0.0);
        assert_eq!(relative_delta(&[42.0]), 0.0);
        assert_eq!(relative_delta(&[150.0, 120.0, 100.0]), 50.0);
        assert_eq!(relative_delta(&[10.0, 0.0]), 0.0);
    }

    #[test]
    fn month_key_walks_back_across_years() {
        let anchor = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert_eq!(month_key(anchor, 0), "2026-02");
        assert_eq!(month_key(anchor, 2), "2025-12");
        assert_eq!(month_key(anchor, 12), "2025-02");
    }

    #[test]
    fn ratio_and_percent_fall_back_on_zero() {
        assert_eq!(ratio(1.0, 0.0), None);
        assert_eq!(percent(5.0, 0.0), 0.0);
        assert_eq!(percent(300.0, 10_000.0), 3.0);
        assert_eq!(mean(&[]), None);
        assert_eq!(round_to(2.345_6, 2), 2.35);
    }
}
