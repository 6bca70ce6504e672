//! Unit price resolution for CostOps.
//!
//! Prices are an injectable lookup: a missing entry means "price unknown"
//! and is surfaced as `None`, never coerced to zero. A zero savings figure
//! invented from a missing price would misrepresent an unconfigured price
//! as "no savings".

#![forbid(unsafe_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cost_proto::ResourceKind;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("negative hourly price {price} for '{configuration}'")]
    NegativePrice { configuration: String, price: f64 },
    #[error("duplicate price entry for {kind} '{configuration}'")]
    DuplicateEntry { kind: ResourceKind, configuration: String },
}

pub type Result<T> = std::result::Result<T, PricingError>;

/// Source of hourly unit prices. Static tables implement this directly;
/// a live pricing service materializes its answers into a [`PriceBook`]
/// ahead of a scan so decision logic stays synchronous and pure.
pub trait PricingSource: Send + Sync + std::fmt::Debug {
    fn unit_price(&self, kind: ResourceKind, configuration: &str) -> Option<f64>;
}

/// One row of a price file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceEntry {
    pub resource_kind: ResourceKind,
    pub configuration_id: String,
    pub hourly_unit_cost: f64,
}

/// In-memory price table keyed by (resource kind, configuration id).
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    prices: HashMap<ResourceKind, HashMap<String, f64>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stock on-demand hourly rates for the builtin catalog families.
    /// A deployment with negotiated rates supplies its own entries.
    pub fn builtin() -> Self {
        let compute: &[(&str, f64)] = &[
            ("t3.nano", 0.0052),
            ("t3.micro", 0.0104),
            ("t3.small", 0.0208),
            ("t3.medium", 0.0416),
            ("t3.large", 0.0832),
            ("t3.xlarge", 0.1664),
            ("t3.2xlarge", 0.3328),
            ("t4g.nano", 0.0042),
            ("t4g.micro", 0.0084),
            ("t4g.small", 0.0168),
            ("t4g.medium", 0.0336),
            ("t4g.large", 0.0672),
            ("t4g.xlarge", 0.1344),
            ("t4g.2xlarge", 0.2688),
            ("m5.large", 0.096),
            ("m5.xlarge", 0.192),
            ("m5.2xlarge", 0.384),
            ("m5.4xlarge", 0.768),
            ("m5.8xlarge", 1.536),
            ("m5.12xlarge", 2.304),
            ("m5.16xlarge", 3.072),
            ("c5.large", 0.085),
            ("c5.xlarge", 0.17),
            ("c5.2xlarge", 0.34),
            ("c5.4xlarge", 0.68),
            ("c5.8xlarge", 1.36),
            ("c5.12xlarge", 2.04),
            ("c5.16xlarge", 2.72),
        ];
        let database: &[(&str, f64)] = &[
            ("db.t3.micro", 0.017),
            ("db.t3.small", 0.034),
            ("db.t3.medium", 0.068),
            ("db.t3.large", 0.136),
            ("db.t3.xlarge", 0.272),
            ("db.t3.2xlarge", 0.544),
            ("db.r5.large", 0.25),
            ("db.r5.xlarge", 0.50),
            ("db.r5.2xlarge", 1.00),
            ("db.r5.4xlarge", 2.00),
        ];

        let mut book = Self::new();
        for (configuration, price) in compute {
            book.set(ResourceKind::Compute, configuration, *price);
        }
        for (configuration, price) in database {
            book.set(ResourceKind::Database, configuration, *price);
        }
        book
    }

    /// Build a book from explicit entries (e.g. a price file supplied on
    /// the command line). Rejects negative prices and duplicate keys.
    pub fn from_entries(entries: Vec<PriceEntry>) -> Result<Self> {
        let mut book = Self::new();
        for entry in entries {
            book.insert(entry.resource_kind, &entry.configuration_id, entry.hourly_unit_cost)?;
        }
        Ok(book)
    }

    pub fn insert(&mut self, kind: ResourceKind, configuration: &str, hourly: f64) -> Result<()> {
        if hourly < 0.0 {
            return Err(PricingError::NegativePrice {
                configuration: configuration.to_string(),
                price: hourly,
            });
        }
        let table = self.prices.entry(kind).or_default();
        if table.contains_key(configuration) {
            return Err(PricingError::DuplicateEntry {
                kind,
                configuration: configuration.to_string(),
            });
        }
        table.insert(configuration.to_string(), hourly);
        Ok(())
    }

    fn set(&mut self, kind: ResourceKind, configuration: &str, hourly: f64) {
        self.prices.entry(kind).or_default().insert(configuration.to_string(), hourly);
    }

    pub fn len(&self) -> usize {
        self.prices.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PricingSource for PriceBook {
    fn unit_price(&self, kind: ResourceKind, configuration: &str) -> Option<f64> {
        self.prices.get(&kind)?.get(configuration).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(kind: ResourceKind, configuration: &str, price: f64) -> PriceEntry {
        PriceEntry {
            resource_kind: kind,
            configuration_id: configuration.to_string(),
            hourly_unit_cost: price,
        }
    }

    #[test]
    fn test_builtin_lookup() {
        let book = PriceBook::builtin();
        assert_eq!(book.unit_price(ResourceKind::Compute, "t3.large"), Some(0.0832));
        assert_eq!(book.unit_price(ResourceKind::Compute, "t3.medium"), Some(0.0416));
        assert_eq!(book.unit_price(ResourceKind::Database, "db.t3.small"), Some(0.034));
    }

    #[test]
    fn test_missing_price_is_none_not_zero() {
        let book = PriceBook::builtin();
        assert_eq!(book.unit_price(ResourceKind::Compute, "x9.huge"), None);
        assert_eq!(book.unit_price(ResourceKind::Unknown, "t3.large"), None);
    }

    #[test]
    fn test_kind_partitions_the_table() {
        let book = PriceBook::builtin();
        // db classes are priced as databases, not as compute.
        assert_eq!(book.unit_price(ResourceKind::Compute, "db.t3.micro"), None);
        assert!(book.unit_price(ResourceKind::Database, "db.t3.micro").is_some());
    }

    #[test]
    fn test_from_entries() {
        let book = PriceBook::from_entries(vec![
            make_entry(ResourceKind::Compute, "t3.large", 0.09),
            make_entry(ResourceKind::Database, "db.t3.large", 0.15),
        ])
        .expect("book");
        assert_eq!(book.len(), 2);
        assert_eq!(book.unit_price(ResourceKind::Compute, "t3.large"), Some(0.09));
    }

    #[test]
    fn test_from_entries_rejects_negative_price() {
        let err = PriceBook::from_entries(vec![make_entry(ResourceKind::Compute, "t3.large", -0.1)])
            .expect_err("negative price");
        assert!(matches!(err, PricingError::NegativePrice { .. }));
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let err = PriceBook::from_entries(vec![
            make_entry(ResourceKind::Compute, "t3.large", 0.0832),
            make_entry(ResourceKind::Compute, "t3.large", 0.08),
        ])
        .expect_err("duplicate entry");
        assert!(matches!(err, PricingError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_price_file_round_trip() {
        let json = r#"[{"resource_kind": "compute", "configuration_id": "t3.micro", "hourly_unit_cost": 0.0104}]"#;
        let entries: Vec<PriceEntry> = serde_json::from_str(json).expect("parse");
        let book = PriceBook::from_entries(entries).expect("book");
        assert_eq!(book.unit_price(ResourceKind::Compute, "t3.micro"), Some(0.0104));
    }
}
