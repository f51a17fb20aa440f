use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Good,
    Warning,
    Critical,
}

impl CheckStatus {
    pub fn value(self) -> u32 {
        match self {
            CheckStatus::Good => 100,
            CheckStatus::Warning => 50,
            CheckStatus::Critical => 0,
        }
    }

    /// Status for a "smaller is better" measurement.
    pub fn banded(value: f64, good_below: f64, warning_below: f64) -> Self {
        if value < good_below {
            CheckStatus::Good
        } else if value < warning_below {
            CheckStatus::Warning
        } else {
            CheckStatus::Critical
        }
    }

    pub fn present_or(present: bool, otherwise: CheckStatus) -> Self {
        if present { CheckStatus::Good } else { otherwise }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckResult {
    /// Pass/fail; a failure scores as critical.
    Flag {
        passed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Measured {
        value: f64,
        unit: String,
        status: CheckStatus,
    },
    Structured {
        status: CheckStatus,
        details: BTreeMap<String, Value>,
    },
}

impl CheckResult {
    pub fn flag(passed: bool) -> Self {
        CheckResult::Flag { passed, message: None }
    }

    pub fn flag_with(passed: bool, message: impl Into<String>) -> Self {
        CheckResult::Flag { passed, message: Some(message.into()) }
    }

    pub fn measured(value: f64, unit: impl Into<String>, status: CheckStatus) -> Self {
        CheckResult::Measured { value, unit: unit.into(), status }
    }

    pub fn structured<I, K>(status: CheckStatus, details: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        CheckResult::Structured {
            status,
            details: details.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn status(&self) -> CheckStatus {
        match self {
            CheckResult::Flag { passed: true, .. } => CheckStatus::Good,
            CheckResult::Flag { passed: false, .. } => CheckStatus::Critical,
            CheckResult::Measured { status, .. } | CheckResult::Structured { status, .. } => *status,
        }
    }

    pub fn is_good(&self) -> bool {
        self.status() == CheckStatus::Good
    }
}

/// Maps each check to 100/50/0 and returns the rounded mean, bounded to
/// `[0, 100]`. A category without checks scores 0.
pub fn category_score<'a, I>(checks: I) -> u8
where
    I: IntoIterator<Item = &'a CheckResult>,
{
    let values: Vec<u32> = checks.into_iter().map(|c| c.status().value()).collect();
    rounded_mean(&values)
}

/// Rounded unweighted mean of already-normalised scores.
pub fn overall_score<I>(scores: I) -> u8
where
    I: IntoIterator<Item = u8>,
{
    let values: Vec<u32> = scores.into_iter().map(u32::from).collect();
    rounded_mean(&values)
}

fn rounded_mean(values: &[u32]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let sum: u32 = values.iter().sum();
    let mean = (sum as f64 / values.len() as f64).round();
    mean.clamp(0.0, 100.0) as u8
}

/// Scales `value` against `full` onto 0–100.
pub fn normalize(value: f64, full: f64) -> f64 {
    if full <= 0.0 {
        return 0.0;
    }
    (value / full * 100.0).clamp(0.0, 100.0)
}
