//! Concurrent fleet scanning for CostOps.
//!
//! Drives the recommendation engine across an arbitrary resource fleet.
//! Per-resource evaluation is dispatched onto a bounded pool; a failure
//! fetching one resource's metrics never aborts the scan, it records a
//! skip and moves on. The savings forecast is computed only after every
//! result is in, so totals are independent of completion order.

#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cost_engine::{Evaluation, RecommendationEngine, SkipReason};
use cost_metrics::{alerts, summarize};
use cost_proto::{
    CloudProvider, IdleResource, MetricKind, Recommendation, ResourceDescriptor, ResourceKind,
    SavingsForecast, TimeWindow, UtilizationSample,
};

pub use cost_metrics::UtilizationAlert;

const DEFAULT_MAX_CONCURRENT: usize = 8;

// ─── Collaborator traits ──────────────────────────────────────────────────────

/// Source of utilization telemetry. One implementation per monitoring
/// backend; failures are transient-I/O errors isolated per resource.
#[async_trait]
pub trait MetricsProvider: Send + Sync + std::fmt::Debug {
    async fn fetch_samples(
        &self,
        resource_id: &str,
        metric: MetricKind,
        window: TimeWindow,
    ) -> anyhow::Result<Vec<UtilizationSample>>;
}

/// Source of resource inventory.
#[async_trait]
pub trait ResourceCatalog: Send + Sync + std::fmt::Debug {
    async fn list_resources(&self, filter: &ResourceFilter)
    -> anyhow::Result<Vec<ResourceDescriptor>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    pub kind: Option<ResourceKind>,
    pub provider: Option<CloudProvider>,
    pub region: Option<String>,
}

impl ResourceFilter {
    pub fn matches(&self, resource: &ResourceDescriptor) -> bool {
        self.kind.is_none_or(|k| k == resource.resource_kind)
            && self.provider.is_none_or(|p| p == resource.provider)
            && self.region.as_deref().is_none_or(|r| r == resource.region.as_str())
    }
}

// ─── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedResource {
    pub resource_id: String,
    pub reason: SkipReason,
}

/// Result of one fleet scan. Recommendations and skips are ordered by
/// resource id regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub resources_scanned: usize,
    pub recommendations: Vec<Recommendation>,
    pub skipped: Vec<SkippedResource>,
    pub forecast: SavingsForecast,
}

/// Result of a usage sweep: idle resources, hot resources, and whatever
/// could not be checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub generated_at: DateTime<Utc>,
    pub resources_checked: usize,
    pub idle: Vec<IdleResource>,
    pub hot: Vec<UtilizationAlert>,
    pub skipped: Vec<SkippedResource>,
}

// ─── Scanner ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
enum FetchFailure {
    #[error("metric fetch timed out")]
    Timeout,
    #[error("{0}")]
    Transient(String),
}

#[derive(Debug)]
pub struct FleetScanner {
    engine: RecommendationEngine,
    max_concurrent: usize,
    fetch_timeout: Option<Duration>,
}

impl FleetScanner {
    pub fn new(engine: RecommendationEngine) -> Self {
        Self { engine, max_concurrent: DEFAULT_MAX_CONCURRENT, fetch_timeout: None }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Deadline applied to each per-resource metric fetch. A fetch that
    /// exceeds it skips that resource, never the scan.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// Evaluate every resource and roll the results into a forecast.
    pub async fn scan(
        &self,
        resources: &[ResourceDescriptor],
        metrics: &dyn MetricsProvider,
    ) -> ScanReport {
        let started = Instant::now();
        let window = TimeWindow::last_days(self.engine.config().recommendation_lookback_days);

        info!(
            resources = resources.len(),
            max_concurrent = self.max_concurrent,
            lookback_days = self.engine.config().recommendation_lookback_days,
            "starting fleet scan"
        );

        let mut outcomes: Vec<Evaluation> = stream::iter(resources)
            .map(|resource| self.evaluate_resource(resource, metrics, window))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        outcomes.sort_by(|a, b| resource_id_of(a).cmp(resource_id_of(b)));

        let mut recommendations = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Evaluation::Recommend(rec) => recommendations.push(rec),
                Evaluation::Skip { resource_id, reason } => {
                    skipped.push(SkippedResource { resource_id, reason });
                }
            }
        }

        // Forecast only once every per-resource result is in.
        let forecast = SavingsForecast::from_recommendations(&recommendations);

        info!(
            recommendations = recommendations.len(),
            skipped = skipped.len(),
            total_monthly_savings = forecast.total_potential_monthly_savings,
            "fleet scan complete"
        );

        ScanReport {
            scan_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            resources_scanned: resources.len(),
            recommendations,
            skipped,
            forecast,
        }
    }

    /// List the inventory through the catalog collaborator, then scan it.
    pub async fn scan_catalog(
        &self,
        catalog: &dyn ResourceCatalog,
        filter: &ResourceFilter,
        metrics: &dyn MetricsProvider,
    ) -> anyhow::Result<ScanReport> {
        let resources = catalog.list_resources(filter).await?;
        Ok(self.scan(&resources, metrics).await)
    }

    /// Short-lookback sweep flagging idle resources (CPU below the idle
    /// threshold) and hot ones (stock alert rules).
    pub async fn usage_sweep(
        &self,
        resources: &[ResourceDescriptor],
        metrics: &dyn MetricsProvider,
    ) -> UsageReport {
        let window = TimeWindow::last_hours(self.engine.config().usage_lookback_hours);
        let rules = alerts::default_rules();

        let mut outcomes: Vec<SweepOutcome> = stream::iter(resources)
            .map(|resource| self.sweep_resource(resource, metrics, window, &rules))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.resource_id().cmp(b.resource_id()));

        let mut checked = 0;
        let mut idle = Vec::new();
        let mut hot = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                SweepOutcome::Checked { idle: i, hot: h, .. } => {
                    checked += 1;
                    idle.extend(i);
                    hot.extend(h);
                }
                SweepOutcome::Skipped(skip) => skipped.push(skip),
            }
        }

        info!(
            checked,
            idle = idle.len(),
            hot = hot.len(),
            skipped = skipped.len(),
            "usage sweep complete"
        );

        UsageReport {
            generated_at: Utc::now(),
            resources_checked: checked,
            idle,
            hot,
            skipped,
        }
    }

    async fn evaluate_resource(
        &self,
        resource: &ResourceDescriptor,
        metrics: &dyn MetricsProvider,
        window: TimeWindow,
    ) -> Evaluation {
        let mut samples =
            match self.fetch(metrics, &resource.resource_id, MetricKind::Cpu, window).await {
                Ok(samples) => samples,
                Err(failure) => {
                    warn!(
                        resource = %resource.resource_id,
                        error = %failure,
                        "cpu fetch failed; skipping resource"
                    );
                    return Evaluation::Skip {
                        resource_id: resource.resource_id.clone(),
                        reason: failure.into_skip_reason(),
                    };
                }
            };

        // Secondary metrics degrade to absent telemetry; only CPU is
        // mandatory evidence.
        for metric in [MetricKind::Memory, MetricKind::Storage] {
            match self.fetch(metrics, &resource.resource_id, metric, window).await {
                Ok(more) => samples.extend(more),
                Err(failure) => {
                    debug!(
                        resource = %resource.resource_id,
                        metric = %metric,
                        error = %failure,
                        "secondary metric unavailable"
                    );
                }
            }
        }

        self.engine.evaluate(resource, &samples)
    }

    async fn sweep_resource(
        &self,
        resource: &ResourceDescriptor,
        metrics: &dyn MetricsProvider,
        window: TimeWindow,
        rules: &[alerts::AlertRule],
    ) -> SweepOutcome {
        let mut samples =
            match self.fetch(metrics, &resource.resource_id, MetricKind::Cpu, window).await {
                Ok(samples) => samples,
                Err(failure) => {
                    warn!(
                        resource = %resource.resource_id,
                        error = %failure,
                        "cpu fetch failed; skipping resource"
                    );
                    return SweepOutcome::Skipped(SkippedResource {
                        resource_id: resource.resource_id.clone(),
                        reason: failure.into_skip_reason(),
                    });
                }
            };

        if let Ok(memory) =
            self.fetch(metrics, &resource.resource_id, MetricKind::Memory, window).await
        {
            samples.extend(memory);
        }

        let summaries = [
            summarize(&samples, MetricKind::Cpu),
            summarize(&samples, MetricKind::Memory),
        ];

        SweepOutcome::Checked {
            resource_id: resource.resource_id.clone(),
            idle: self.engine.check_idle(resource, &samples),
            hot: alerts::evaluate_rules(&resource.resource_id, &summaries, rules),
        }
    }

    async fn fetch(
        &self,
        metrics: &dyn MetricsProvider,
        resource_id: &str,
        metric: MetricKind,
        window: TimeWindow,
    ) -> std::result::Result<Vec<UtilizationSample>, FetchFailure> {
        let fetch = metrics.fetch_samples(resource_id, metric, window);
        let result = match self.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => return Err(FetchFailure::Timeout),
            },
            None => fetch.await,
        };
        result.map_err(|e| FetchFailure::Transient(e.to_string()))
    }
}

impl FetchFailure {
    fn into_skip_reason(self) -> SkipReason {
        match self {
            Self::Timeout => SkipReason::FetchTimeout,
            Self::Transient(message) => SkipReason::MetricsUnavailable { message },
        }
    }
}

enum SweepOutcome {
    Checked { resource_id: String, idle: Option<IdleResource>, hot: Vec<UtilizationAlert> },
    Skipped(SkippedResource),
}

impl SweepOutcome {
    fn resource_id(&self) -> &str {
        match self {
            Self::Checked { resource_id, .. } => resource_id,
            Self::Skipped(skip) => &skip.resource_id,
        }
    }
}

fn resource_id_of(outcome: &Evaluation) -> &str {
    match outcome {
        Evaluation::Recommend(rec) => &rec.resource_id,
        Evaluation::Skip { resource_id, .. } => resource_id,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use cost_catalog::SizingCatalog;
    use cost_engine::EngineConfig;
    use cost_pricing::PriceBook;

    #[derive(Debug, Default)]
    struct StaticMetrics {
        samples: HashMap<String, Vec<UtilizationSample>>,
        fail: HashSet<(String, MetricKind)>,
        delay: Option<Duration>,
    }

    impl StaticMetrics {
        fn record(&mut self, resource_id: &str, metric: MetricKind, values: &[f64]) {
            self.samples
                .entry(resource_id.to_string())
                .or_default()
                .extend(make_samples(metric, values));
        }

        fn fail(&mut self, resource_id: &str, metric: MetricKind) {
            self.fail.insert((resource_id.to_string(), metric));
        }
    }

    #[async_trait]
    impl MetricsProvider for StaticMetrics {
        async fn fetch_samples(
            &self,
            resource_id: &str,
            metric: MetricKind,
            window: TimeWindow,
        ) -> anyhow::Result<Vec<UtilizationSample>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.contains(&(resource_id.to_string(), metric)) {
                anyhow::bail!("monitoring endpoint unreachable");
            }
            Ok(self
                .samples
                .get(resource_id)
                .map(|samples| {
                    samples
                        .iter()
                        .filter(|s| s.metric == metric && window.contains(s.timestamp))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    #[derive(Debug)]
    struct StaticInventory(Vec<ResourceDescriptor>);

    #[async_trait]
    impl ResourceCatalog for StaticInventory {
        async fn list_resources(
            &self,
            filter: &ResourceFilter,
        ) -> anyhow::Result<Vec<ResourceDescriptor>> {
            Ok(self.0.iter().filter(|r| filter.matches(r)).cloned().collect())
        }
    }

    fn make_scanner() -> FleetScanner {
        let engine = RecommendationEngine::new(
            EngineConfig::default(),
            SizingCatalog::builtin(),
            Box::new(PriceBook::builtin()),
        )
        .expect("engine");
        FleetScanner::new(engine)
    }

    fn make_resource(id: &str, kind: ResourceKind, configuration: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            resource_id: id.to_string(),
            resource_kind: kind,
            current_configuration: configuration.to_string(),
            provider: CloudProvider::Aws,
            region: "us-east-1".to_string(),
            tags: Default::default(),
        }
    }

    fn make_samples(metric: MetricKind, values: &[f64]) -> Vec<UtilizationSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| UtilizationSample {
                timestamp: Utc::now() - chrono::Duration::minutes(i as i64 * 5),
                metric,
                value,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_scan_mixed_fleet() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-low", MetricKind::Cpu, &[2.0, 3.0, 4.0]);
        metrics.record("i-busy", MetricKind::Cpu, &[80.0, 85.0]);
        metrics.record("i-weird", MetricKind::Cpu, &[1.0]);

        let resources = vec![
            make_resource("i-low", ResourceKind::Compute, "t3.large"),
            make_resource("i-busy", ResourceKind::Compute, "t3.large"),
            make_resource("i-weird", ResourceKind::Compute, "x9.huge"),
        ];

        let report = make_scanner().scan(&resources, &metrics).await;
        assert_eq!(report.resources_scanned, 3);
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].resource_id, "i-low");
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.forecast.recommendation_count, 1);
        assert!((report.forecast.total_potential_monthly_savings - 30.37).abs() < 1e-9);
        assert!((report.forecast.breakdown_by_resource_kind["compute"] - 30.37).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fetch_failure_isolated_to_one_resource() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-ok", MetricKind::Cpu, &[2.0]);
        metrics.fail("i-broken", MetricKind::Cpu);

        let resources = vec![
            make_resource("i-broken", ResourceKind::Compute, "t3.large"),
            make_resource("i-ok", ResourceKind::Compute, "t3.large"),
        ];

        let report = make_scanner().scan(&resources, &metrics).await;
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].resource_id, "i-ok");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].resource_id, "i-broken");
        assert!(matches!(report.skipped[0].reason, SkipReason::MetricsUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_secondary_metric_failure_does_not_block() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-1", MetricKind::Cpu, &[2.0, 3.0]);
        metrics.fail("i-1", MetricKind::Memory);

        let resources = vec![make_resource("i-1", ResourceKind::Compute, "t3.large")];
        let report = make_scanner().scan(&resources, &metrics).await;

        assert_eq!(report.recommendations.len(), 1);
        assert!(report.recommendations[0].metrics.memory.is_none());
        assert_eq!(report.recommendations[0].reason, "Low CPU utilization");
    }

    #[tokio::test]
    async fn test_fetch_timeout_skips_resource() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-slow", MetricKind::Cpu, &[2.0]);
        metrics.delay = Some(Duration::from_millis(100));

        let resources = vec![make_resource("i-slow", ResourceKind::Compute, "t3.large")];
        let scanner = make_scanner().with_fetch_timeout(Duration::from_millis(5));
        let report = scanner.scan(&resources, &metrics).await;

        assert!(report.recommendations.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::FetchTimeout);
    }

    #[tokio::test]
    async fn test_scan_output_ordered_and_deterministic() {
        let mut metrics = StaticMetrics::default();
        for id in ["i-c", "i-a", "i-b"] {
            metrics.record(id, MetricKind::Cpu, &[2.0, 3.0]);
        }
        let resources = vec![
            make_resource("i-c", ResourceKind::Compute, "t3.large"),
            make_resource("i-a", ResourceKind::Compute, "t3.xlarge"),
            make_resource("i-b", ResourceKind::Compute, "t3.medium"),
        ];

        let scanner = make_scanner().with_max_concurrent(3);
        let first = scanner.scan(&resources, &metrics).await;
        let second = scanner.scan(&resources, &metrics).await;

        let ids: Vec<&str> =
            first.recommendations.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["i-a", "i-b", "i-c"]);

        // Identical inputs, identical output, whatever the completion order.
        let a = serde_json::to_string(&(&first.recommendations, &first.forecast)).expect("json");
        let b = serde_json::to_string(&(&second.recommendations, &second.forecast)).expect("json");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_scan_empty_fleet() {
        let metrics = StaticMetrics::default();
        let report = make_scanner().scan(&[], &metrics).await;
        assert_eq!(report.resources_scanned, 0);
        assert!(report.recommendations.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.forecast.recommendation_count, 0);
        assert_eq!(report.forecast.total_potential_monthly_savings, 0.0);
    }

    #[tokio::test]
    async fn test_scan_catalog_applies_filter() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-1", MetricKind::Cpu, &[2.0]);
        metrics.record("db-1", MetricKind::Cpu, &[2.0]);

        let inventory = StaticInventory(vec![
            make_resource("i-1", ResourceKind::Compute, "t3.large"),
            make_resource("db-1", ResourceKind::Database, "db.t3.medium"),
        ]);
        let filter = ResourceFilter { kind: Some(ResourceKind::Database), ..Default::default() };

        let report = make_scanner()
            .scan_catalog(&inventory, &filter, &metrics)
            .await
            .expect("scan");
        assert_eq!(report.resources_scanned, 1);
        assert_eq!(report.recommendations[0].resource_id, "db-1");
    }

    #[tokio::test]
    async fn test_usage_sweep_flags_idle_and_hot() {
        let mut metrics = StaticMetrics::default();
        metrics.record("i-idle", MetricKind::Cpu, &[1.0, 2.0]);
        metrics.record("i-hot", MetricKind::Cpu, &[92.0, 95.0]);
        metrics.record("i-ok", MetricKind::Cpu, &[30.0]);
        metrics.fail("i-broken", MetricKind::Cpu);

        let resources = vec![
            make_resource("i-idle", ResourceKind::Compute, "t3.large"),
            make_resource("i-hot", ResourceKind::Compute, "t3.large"),
            make_resource("i-ok", ResourceKind::Compute, "t3.large"),
            make_resource("i-broken", ResourceKind::Compute, "t3.large"),
        ];

        let report = make_scanner().usage_sweep(&resources, &metrics).await;
        assert_eq!(report.resources_checked, 3);
        assert_eq!(report.idle.len(), 1);
        assert_eq!(report.idle[0].resource_id, "i-idle");
        assert_eq!(report.hot.len(), 1);
        assert_eq!(report.hot[0].resource_id, "i-hot");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].resource_id, "i-broken");
    }
}
