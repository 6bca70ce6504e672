//! Shared data model for the CostOps engine.
//!
//! Defines the utilization, inventory, recommendation, and billing types
//! exchanged between the metric aggregator, the recommendation engine,
//! the fleet scanner, and whatever presentation layer consumes the
//! serialized results.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Metric, resource, and provider kinds ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Storage,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Coarse resource classification. Affects pricing lookup and report
/// labeling only; eligibility logic never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Compute,
    Database,
    Disk,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compute => write!(f, "compute"),
            Self::Database => write!(f, "database"),
            Self::Disk => write!(f, "disk"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aws => write!(f, "aws"),
            Self::Azure => write!(f, "azure"),
            Self::Gcp => write!(f, "gcp"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ─── Utilization samples & summaries ─────────────────────────────────────────

/// One observed datapoint for one metric on one resource. Immutable once
/// recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub timestamp: DateTime<Utc>,
    pub metric: MetricKind,
    /// Percentage in 0.0..=100.0.
    pub value: f64,
}

/// Reduction of a sample window: arithmetic mean, observed maximum, and
/// how many samples contributed. A summary with `sample_count == 0` is the
/// defined fallback for absent telemetry, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationSummary {
    pub metric: MetricKind,
    pub average: f64,
    pub maximum: f64,
    pub sample_count: usize,
}

impl UtilizationSummary {
    pub fn empty(metric: MetricKind) -> Self {
        Self { metric, average: 0.0, maximum: 0.0, sample_count: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

// ─── Inventory ────────────────────────────────────────────────────────────────

/// A resource under evaluation, as described by the inventory collaborator.
/// The engine treats `current_configuration` as an opaque id and only the
/// sizing catalog gives it structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub current_configuration: String,
    pub provider: CloudProvider,
    pub region: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

// ─── Recommendations ──────────────────────────────────────────────────────────

/// The utilization evidence attached to a recommendation. CPU is always
/// present; memory and storage are omitted when no telemetry existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub cpu: UtilizationSummary,
    pub memory: Option<UtilizationSummary>,
    pub storage: Option<UtilizationSummary>,
}

/// A single rightsizing proposal. `estimated_monthly_savings` is `None`
/// when either price was unknown; it is never coerced to zero. Carries no
/// timestamp so identical inputs serialize byte-identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub current_configuration: String,
    pub recommended_configuration: String,
    pub reason: String,
    pub estimated_monthly_savings: Option<f64>,
    pub metrics: ResourceMetrics,
}

impl Recommendation {
    /// Triage bucket for the savings amount; `None` while the savings are
    /// unknown.
    pub fn priority(&self) -> Option<SavingsPriority> {
        self.estimated_monthly_savings.map(SavingsPriority::for_monthly_savings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingsPriority {
    High,
    Medium,
    Low,
}

impl SavingsPriority {
    pub fn for_monthly_savings(usd: f64) -> Self {
        if usd > 100.0 {
            Self::High
        } else if usd > 50.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for SavingsPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Fleet-level rollup of a scan. The total sums only recommendations whose
/// savings are known; unknown-savings recommendations still count toward
/// `recommendation_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsForecast {
    pub total_potential_monthly_savings: f64,
    pub recommendation_count: usize,
    pub breakdown_by_resource_kind: BTreeMap<String, f64>,
}

impl SavingsForecast {
    pub fn from_recommendations(recommendations: &[Recommendation]) -> Self {
        let mut total = 0.0;
        let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();
        for rec in recommendations {
            if let Some(savings) = rec.estimated_monthly_savings {
                total += savings;
                *breakdown.entry(rec.resource_kind.to_string()).or_insert(0.0) += savings;
            }
        }
        Self {
            total_potential_monthly_savings: total,
            recommendation_count: recommendations.len(),
            breakdown_by_resource_kind: breakdown,
        }
    }
}

/// A resource flagged by the simple usage check: sustained CPU below the
/// idle threshold over the short lookback window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleResource {
    pub resource_id: String,
    pub resource_kind: ResourceKind,
    pub region: String,
    pub average_cpu_pct: f64,
    pub peak_cpu_pct: f64,
    pub note: String,
    pub estimated_monthly_cost: Option<f64>,
}

// ─── Billing ──────────────────────────────────────────────────────────────────

/// One line item from a billing export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub service: String,
    pub region: String,
    pub resource_group: String,
    pub cost_amount: f64,
    pub usage_amount: f64,
    pub period: TimeWindow,
}

/// Spend grouped three ways in a single pass. Each breakdown sums to
/// `total_cost` (within float tolerance). Sorted maps keep report output
/// ordering stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total_cost: f64,
    pub by_service: BTreeMap<String, f64>,
    pub by_location: BTreeMap<String, f64>,
    pub by_resource_group: BTreeMap<String, f64>,
}

impl CostBreakdown {
    pub fn empty() -> Self {
        Self {
            total_cost: 0.0,
            by_service: BTreeMap::new(),
            by_location: BTreeMap::new(),
            by_resource_group: BTreeMap::new(),
        }
    }
}

// ─── Time windows ─────────────────────────────────────────────────────────────

/// Closed interval of wall-clock time, used both for metric lookback and
/// billing period filters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        Self { start: end - chrono::Duration::hours(hours), end }
    }

    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self { start: end - chrono::Duration::days(days), end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Validate a resource ID. Multi-cloud ids range from `i-0abc123` to full
/// Azure resource paths, so path separators are allowed.
pub fn validate_resource_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 256
        && id
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':'))
}
