//! Billing record aggregation for CostOps.
//!
//! Rolls raw cost-and-usage line items up into totals grouped by service,
//! location, and resource group. Runs independently of the recommendation
//! pipeline.

#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cost_proto::{CostBreakdown, CostRecord, TimeWindow};

/// Single pass over the records: accumulate the total and all three
/// groupings, initializing a group at zero on first sight of its key.
/// Empty input yields the zero breakdown; that is a defined result, not
/// an error.
pub fn aggregate(records: &[CostRecord]) -> CostBreakdown {
    let mut breakdown = CostBreakdown::empty();
    for record in records {
        breakdown.total_cost += record.cost_amount;
        *breakdown.by_service.entry(record.service.clone()).or_insert(0.0) += record.cost_amount;
        *breakdown.by_location.entry(record.region.clone()).or_insert(0.0) += record.cost_amount;
        *breakdown
            .by_resource_group
            .entry(record.resource_group.clone())
            .or_insert(0.0) += record.cost_amount;
    }
    breakdown
}

/// A breakdown scoped to a reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub generated_at: DateTime<Utc>,
    pub window: TimeWindow,
    pub currency: String,
    pub record_count: usize,
    pub breakdown: CostBreakdown,
}

impl CostReport {
    /// Aggregate only the records whose billing period overlaps the
    /// window.
    pub fn for_window(records: &[CostRecord], window: TimeWindow) -> Self {
        let in_window: Vec<CostRecord> = records
            .iter()
            .filter(|record| record.period.overlaps(&window))
            .cloned()
            .collect();

        Self {
            generated_at: Utc::now(),
            window,
            currency: "USD".to_string(),
            record_count: in_window.len(),
            breakdown: aggregate(&in_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(service: &str, region: &str, group: &str, cost: f64) -> CostRecord {
        CostRecord {
            service: service.to_string(),
            region: region.to_string(),
            resource_group: group.to_string(),
            cost_amount: cost,
            usage_amount: cost * 10.0,
            period: TimeWindow::last_days(30),
        }
    }

    #[test]
    fn test_aggregate_groups_by_service() {
        let records = vec![
            make_record("Compute", "us-east-1", "prod", 10.0),
            make_record("Storage", "us-east-1", "prod", 5.0),
            make_record("Compute", "eu-west-1", "dev", 3.0),
        ];
        let breakdown = aggregate(&records);
        assert!((breakdown.total_cost - 18.0).abs() < 1e-6);
        assert!((breakdown.by_service["Compute"] - 13.0).abs() < 1e-6);
        assert!((breakdown.by_service["Storage"] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let breakdown = aggregate(&[]);
        assert_eq!(breakdown.total_cost, 0.0);
        assert!(breakdown.by_service.is_empty());
        assert!(breakdown.by_location.is_empty());
        assert!(breakdown.by_resource_group.is_empty());
    }

    #[test]
    fn test_every_grouping_sums_to_total() {
        let records = vec![
            make_record("Compute", "us-east-1", "prod", 12.5),
            make_record("Storage", "eu-west-1", "prod", 0.031),
            make_record("Database", "us-east-1", "dev", 847.99),
            make_record("Compute", "ap-south-1", "dev", 3.14),
        ];
        let breakdown = aggregate(&records);
        for grouping in [
            &breakdown.by_service,
            &breakdown.by_location,
            &breakdown.by_resource_group,
        ] {
            let sum: f64 = grouping.values().sum();
            assert!((sum - breakdown.total_cost).abs() < 1e-6);
        }
    }

    #[test]
    fn test_aggregate_order_invariant() {
        let mut records = vec![
            make_record("Compute", "us-east-1", "prod", 10.0),
            make_record("Storage", "us-east-1", "prod", 5.0),
            make_record("Compute", "eu-west-1", "dev", 3.0),
        ];
        let forward = aggregate(&records);
        records.reverse();
        let backward = aggregate(&records);
        assert_eq!(
            serde_json::to_string(&forward).expect("serialize"),
            serde_json::to_string(&backward).expect("serialize"),
        );
    }

    #[test]
    fn test_report_filters_by_window() {
        let window = TimeWindow::last_days(7);
        let mut old = make_record("Compute", "us-east-1", "prod", 99.0);
        old.period = TimeWindow::new(
            window.start - chrono::Duration::days(60),
            window.start - chrono::Duration::days(30),
        );
        let records = vec![make_record("Compute", "us-east-1", "prod", 10.0), old];

        let report = CostReport::for_window(&records, window);
        assert_eq!(report.record_count, 1);
        assert!((report.breakdown.total_cost - 10.0).abs() < 1e-6);
        assert_eq!(report.currency, "USD");
    }
}
