//! Rightsizing decision engine for CostOps.
//!
//! Pure per-resource decision procedure: given a resource descriptor and
//! its utilization samples, decide whether the resource is underutilized,
//! propose the next smaller configuration, and estimate monthly savings.
//! Collaborators (catalog, pricing) are injected at construction and the
//! engine is reused across scans.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cost_catalog::SizingCatalog;
use cost_metrics::summarize;
use cost_pricing::PricingSource;
use cost_proto::{
    IdleResource, MetricKind, Recommendation, ResourceDescriptor, ResourceKind, ResourceMetrics,
    UtilizationSample, UtilizationSummary,
};

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Tunables for the decision procedure. Validated once at engine
/// construction; a bad value is fatal there rather than surfacing
/// mid-scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate threshold: CPU (and memory, when telemetry exists)
    /// average must be strictly below this percentage.
    #[serde(default = "default_low_utilization_pct")]
    pub low_utilization_pct: f64,
    /// Peak guard: downsizing proceeds only while observed maxima stay
    /// strictly below this percentage.
    #[serde(default = "default_peak_ceiling_pct")]
    pub peak_ceiling_pct: f64,
    /// Threshold for the simple idle check, independent of the
    /// recommendation threshold above.
    #[serde(default = "default_idle_threshold_pct")]
    pub idle_threshold_pct: f64,
    /// Billing hours per month used for savings arithmetic.
    #[serde(default = "default_hours_per_month")]
    pub hours_per_month: f64,
    /// Metric lookback for detailed recommendations.
    #[serde(default = "default_recommendation_lookback_days")]
    pub recommendation_lookback_days: i64,
    /// Metric lookback for idle usage sweeps.
    #[serde(default = "default_usage_lookback_hours")]
    pub usage_lookback_hours: i64,
}

fn default_low_utilization_pct() -> f64 {
    20.0
}

fn default_peak_ceiling_pct() -> f64 {
    50.0
}

fn default_idle_threshold_pct() -> f64 {
    5.0
}

fn default_hours_per_month() -> f64 {
    730.0
}

fn default_recommendation_lookback_days() -> i64 {
    7
}

fn default_usage_lookback_hours() -> i64 {
    24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_utilization_pct: default_low_utilization_pct(),
            peak_ceiling_pct: default_peak_ceiling_pct(),
            idle_threshold_pct: default_idle_threshold_pct(),
            hours_per_month: default_hours_per_month(),
            recommendation_lookback_days: default_recommendation_lookback_days(),
            usage_lookback_hours: default_usage_lookback_hours(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.low_utilization_pct <= 0.0 || self.low_utilization_pct > 100.0 {
            return Err(EngineError::InvalidConfig(format!(
                "low_utilization_pct {} outside (0, 100]",
                self.low_utilization_pct
            )));
        }
        if self.peak_ceiling_pct <= 0.0 || self.peak_ceiling_pct > 100.0 {
            return Err(EngineError::InvalidConfig(format!(
                "peak_ceiling_pct {} outside (0, 100]",
                self.peak_ceiling_pct
            )));
        }
        if self.peak_ceiling_pct < self.low_utilization_pct {
            return Err(EngineError::InvalidConfig(format!(
                "peak_ceiling_pct {} below low_utilization_pct {}",
                self.peak_ceiling_pct, self.low_utilization_pct
            )));
        }
        if self.idle_threshold_pct <= 0.0 || self.idle_threshold_pct > 100.0 {
            return Err(EngineError::InvalidConfig(format!(
                "idle_threshold_pct {} outside (0, 100]",
                self.idle_threshold_pct
            )));
        }
        if self.hours_per_month <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "hours_per_month {} must be positive",
                self.hours_per_month
            )));
        }
        if self.recommendation_lookback_days <= 0 {
            return Err(EngineError::InvalidConfig(
                "recommendation_lookback_days must be positive".to_string(),
            ));
        }
        if self.usage_lookback_hours <= 0 {
            return Err(EngineError::InvalidConfig(
                "usage_lookback_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Evaluation outcome ───────────────────────────────────────────────────────

/// Per-resource outcome: a recommendation, or a skip with the reason.
/// Every skip is a defined outcome, never an error.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Recommend(Recommendation),
    Skip { resource_id: String, reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Utilization averages at or above the candidate threshold.
    NotUnderutilized,
    /// Observed peak at or above the safety ceiling; resource bursts.
    PeakAboveCeiling,
    /// Configuration family not in the sizing catalog.
    UnknownFamily,
    /// Already the smallest size in its family (or size not in the
    /// family's sequence).
    NoSmallerSize,
    /// Transient failure fetching the mandatory CPU series.
    MetricsUnavailable { message: String },
    /// Metric fetch exceeded the caller's deadline.
    FetchTimeout,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUnderutilized => write!(f, "utilization above the low-utilization threshold"),
            Self::PeakAboveCeiling => write!(f, "peak utilization at or above the safety ceiling"),
            Self::UnknownFamily => write!(f, "configuration family not in the sizing catalog"),
            Self::NoSmallerSize => write!(f, "already the smallest size in its family"),
            Self::MetricsUnavailable { message } => write!(f, "metrics unavailable: {message}"),
            Self::FetchTimeout => write!(f, "metric fetch timed out"),
        }
    }
}

// ─── Engine ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RecommendationEngine {
    config: EngineConfig,
    catalog: SizingCatalog,
    pricing: Box<dyn PricingSource>,
}

impl RecommendationEngine {
    pub fn new(
        config: EngineConfig,
        catalog: SizingCatalog,
        pricing: Box<dyn PricingSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, catalog, pricing })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide whether to downsize one resource.
    ///
    /// Candidate iff the CPU average is strictly below the threshold and,
    /// when memory telemetry exists, the memory average is too. Missing
    /// memory never blocks; CPU is the primary evidence. Candidates are
    /// then refused when any observed peak reaches the safety ceiling,
    /// when the family is unknown, or when no smaller size exists.
    pub fn evaluate(
        &self,
        resource: &ResourceDescriptor,
        samples: &[UtilizationSample],
    ) -> Evaluation {
        let cpu = summarize(samples, MetricKind::Cpu);
        let memory = present(summarize(samples, MetricKind::Memory));
        let storage = present(summarize(samples, MetricKind::Storage));

        let threshold = self.config.low_utilization_pct;
        let cpu_low = cpu.average < threshold;
        let memory_low = memory.as_ref().is_none_or(|m| m.average < threshold);
        if !cpu_low || !memory_low {
            return self.skip(resource, SkipReason::NotUnderutilized);
        }

        let ceiling = self.config.peak_ceiling_pct;
        let bursts =
            cpu.maximum >= ceiling || memory.as_ref().is_some_and(|m| m.maximum >= ceiling);
        if bursts {
            return self.skip(resource, SkipReason::PeakAboveCeiling);
        }

        if self.catalog.family_of(&resource.current_configuration).is_none() {
            return self.skip(resource, SkipReason::UnknownFamily);
        }
        let Some(recommended) =
            self.catalog.next_smaller_configuration(&resource.current_configuration)
        else {
            return self.skip(resource, SkipReason::NoSmallerSize);
        };

        let savings = self.estimate_monthly_savings(
            resource.resource_kind,
            &resource.current_configuration,
            &recommended,
        );

        let reason = if memory.is_some() {
            "Low CPU and memory utilization"
        } else {
            "Low CPU utilization"
        };

        Evaluation::Recommend(Recommendation {
            resource_id: resource.resource_id.clone(),
            resource_kind: resource.resource_kind,
            current_configuration: resource.current_configuration.clone(),
            recommended_configuration: recommended,
            reason: reason.to_string(),
            estimated_monthly_savings: savings,
            metrics: ResourceMetrics { cpu, memory, storage },
        })
    }

    /// Simple usage check: flag a resource whose CPU average sits
    /// strictly below the idle threshold. Zero samples read as zero
    /// utilization, so a silent resource is flagged too.
    pub fn check_idle(
        &self,
        resource: &ResourceDescriptor,
        samples: &[UtilizationSample],
    ) -> Option<IdleResource> {
        let cpu = summarize(samples, MetricKind::Cpu);
        if cpu.average >= self.config.idle_threshold_pct {
            return None;
        }

        let estimated_monthly_cost = self
            .pricing
            .unit_price(resource.resource_kind, &resource.current_configuration)
            .map(|hourly| round2(hourly * self.config.hours_per_month));

        Some(IdleResource {
            resource_id: resource.resource_id.clone(),
            resource_kind: resource.resource_kind,
            region: resource.region.clone(),
            average_cpu_pct: cpu.average,
            peak_cpu_pct: cpu.maximum,
            note: "Consider stopping or terminating this resource".to_string(),
            estimated_monthly_cost,
        })
    }

    /// `(price(current) − price(recommended)) × hours`, rounded to cents.
    /// `None` when either price is unknown; never coerced to zero.
    fn estimate_monthly_savings(
        &self,
        kind: ResourceKind,
        current: &str,
        recommended: &str,
    ) -> Option<f64> {
        let current_price = self.pricing.unit_price(kind, current)?;
        let recommended_price = self.pricing.unit_price(kind, recommended)?;
        Some(round2((current_price - recommended_price) * self.config.hours_per_month))
    }

    fn skip(&self, resource: &ResourceDescriptor, reason: SkipReason) -> Evaluation {
        Evaluation::Skip { resource_id: resource.resource_id.clone(), reason }
    }
}

fn present(summary: UtilizationSummary) -> Option<UtilizationSummary> {
    if summary.is_empty() { None } else { Some(summary) }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─── Tests ────────────────────────────────────────────────────────────────────
