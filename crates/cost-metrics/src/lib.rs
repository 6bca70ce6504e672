//! Utilization summarization for CostOps.
//!
//! Reduces raw utilization samples to the summary statistics the
//! recommendation engine consumes, and evaluates threshold alert rules
//! over those summaries.

#![forbid(unsafe_code)]

use cost_proto::{MetricKind, TimeWindow, UtilizationSample, UtilizationSummary};

pub use alerts::{AlertCondition, AlertRule, UtilizationAlert, default_rules, evaluate_rules};

/// Reduce samples of one metric kind to average / maximum / count.
///
/// Samples of other kinds are ignored. An empty window yields the zero
/// summary with `sample_count == 0`; absence of telemetry is a defined
/// fallback, not an error. Order of samples never affects the result.
pub fn summarize(samples: &[UtilizationSample], metric: MetricKind) -> UtilizationSummary {
    reduce(metric, samples.iter().filter(|s| s.metric == metric).map(|s| s.value))
}

/// Like [`summarize`], but drops samples outside the window first. File
/// and replay sources hand over whole series, so the bound is applied
/// here rather than at fetch time.
pub fn summarize_window(
    samples: &[UtilizationSample],
    metric: MetricKind,
    window: &TimeWindow,
) -> UtilizationSummary {
    reduce(
        metric,
        samples
            .iter()
            .filter(|s| s.metric == metric && window.contains(s.timestamp))
            .map(|s| s.value),
    )
}

fn reduce(metric: MetricKind, values: impl Iterator<Item = f64>) -> UtilizationSummary {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return UtilizationSummary::empty(metric);
    }

    let sum: f64 = values.iter().sum();
    let maximum = values.iter().copied().fold(f64::MIN, f64::max);

    UtilizationSummary {
        metric,
        average: sum / values.len() as f64,
        maximum,
        sample_count: values.len(),
    }
}

pub mod alerts {
    //! Threshold alert rules over utilization summaries.

    use serde::{Deserialize, Serialize};

    use cost_proto::{MetricKind, UtilizationSummary};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum AlertCondition {
        Above,
        Below,
    }

    impl std::fmt::Display for AlertCondition {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Above => write!(f, "above"),
                Self::Below => write!(f, "below"),
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AlertRule {
        pub metric: MetricKind,
        pub threshold: f64,
        pub condition: AlertCondition,
    }

    impl AlertRule {
        /// Whether the rule fires for this summary. Empty summaries never
        /// trigger; a zero average from absent telemetry is not evidence.
        pub fn triggers(&self, summary: &UtilizationSummary) -> bool {
            if summary.metric != self.metric || summary.is_empty() {
                return false;
            }
            match self.condition {
                AlertCondition::Above => summary.average > self.threshold,
                AlertCondition::Below => summary.average < self.threshold,
            }
        }
    }

    /// Stock rules: sustained CPU or memory above 80%.
    pub fn default_rules() -> Vec<AlertRule> {
        vec![
            AlertRule { metric: MetricKind::Cpu, threshold: 80.0, condition: AlertCondition::Above },
            AlertRule { metric: MetricKind::Memory, threshold: 80.0, condition: AlertCondition::Above },
        ]
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UtilizationAlert {
        pub resource_id: String,
        pub metric: MetricKind,
        pub observed_average: f64,
        pub threshold: f64,
        pub condition: AlertCondition,
        pub description: String,
    }

    /// Evaluate every rule against every matching summary.
    pub fn evaluate_rules(
        resource_id: &str,
        summaries: &[UtilizationSummary],
        rules: &[AlertRule],
    ) -> Vec<UtilizationAlert> {
        let mut alerts = Vec::new();
        for rule in rules {
            for summary in summaries.iter().filter(|s| rule.triggers(s)) {
                alerts.push(UtilizationAlert {
                    resource_id: resource_id.to_string(),
                    metric: rule.metric,
                    observed_average: summary.average,
                    threshold: rule.threshold,
                    condition: rule.condition,
                    description: format!(
                        "{} average {:.2}% is {} threshold {:.2}%",
                        rule.metric, summary.average, rule.condition, rule.threshold
                    ),
                });
            }
        }
        alerts
    }
}
