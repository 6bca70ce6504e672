//! File-backed inventory and telemetry sources.
//!
//! costctl runs offline over exported JSON: an inventory file holding
//! an array of resource descriptors, and a telemetry file mapping each
//! resource id to its recorded samples. Cloud connectors produce these
//! exports; this module only reads them.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use cost_catalog::{ConfigurationFamily, SizingCatalog};
use cost_pricing::{PriceBook, PriceEntry};
use cost_proto::{
    CostRecord, MetricKind, ResourceDescriptor, TimeWindow, UtilizationSample,
    validate_resource_id,
};
use cost_scanner::{MetricsProvider, ResourceCatalog, ResourceFilter};

use crate::error::{CtlError, CtlResult};

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CtlResult<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| CtlError::Input(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&data)
        .map_err(|e| CtlError::Input(format!("parse {}: {e}", path.display())))
}

// ─── Inventory ──────────────────────────────────────────────────────────────

/// Fleet inventory loaded from a JSON array of resource descriptors.
#[derive(Debug)]
pub struct FileInventory {
    resources: Vec<ResourceDescriptor>,
}

impl FileInventory {
    pub fn load(path: &Path) -> CtlResult<Self> {
        let resources: Vec<ResourceDescriptor> = read_json(path)?;
        if let Some(bad) = resources.iter().find(|r| !validate_resource_id(&r.resource_id)) {
            return Err(CtlError::Input(format!(
                "invalid resource id '{}' in {}",
                bad.resource_id,
                path.display()
            )));
        }
        Ok(Self { resources })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceCatalog for FileInventory {
    async fn list_resources(
        &self,
        filter: &ResourceFilter,
    ) -> anyhow::Result<Vec<ResourceDescriptor>> {
        Ok(self
            .resources
            .iter()
            .filter(|resource| filter.matches(resource))
            .cloned()
            .collect())
    }
}

// ─── Telemetry ──────────────────────────────────────────────────────────────

/// Recorded telemetry loaded from a JSON object keyed by resource id.
///
/// A resource id missing from the file reads as no telemetry at all,
/// not as a fetch failure.
#[derive(Debug)]
pub struct RecordedMetrics {
    samples: HashMap<String, Vec<UtilizationSample>>,
}

impl RecordedMetrics {
    pub fn load(path: &Path) -> CtlResult<Self> {
        Ok(Self {
            samples: read_json(path)?,
        })
    }
}

#[async_trait]
impl MetricsProvider for RecordedMetrics {
    async fn fetch_samples(
        &self,
        resource_id: &str,
        metric: MetricKind,
        window: TimeWindow,
    ) -> anyhow::Result<Vec<UtilizationSample>> {
        let Some(samples) = self.samples.get(resource_id) else {
            return Ok(Vec::new());
        };
        Ok(samples
            .iter()
            .filter(|sample| sample.metric == metric && window.contains(sample.timestamp))
            .cloned()
            .collect())
    }
}

// ─── Catalog, prices, billing records ───────────────────────────────────────

/// Build a sizing catalog from a JSON array of configuration families.
pub fn load_catalog(path: &Path) -> CtlResult<SizingCatalog> {
    let families: Vec<ConfigurationFamily> = read_json(path)?;
    SizingCatalog::from_families(families)
        .map_err(|e| CtlError::Input(format!("catalog {}: {e}", path.display())))
}

/// Build a price book from a JSON array of price entries.
pub fn load_prices(path: &Path) -> CtlResult<PriceBook> {
    let entries: Vec<PriceEntry> = read_json(path)?;
    PriceBook::from_entries(entries)
        .map_err(|e| CtlError::Input(format!("prices {}: {e}", path.display())))
}

/// Load billing records from a JSON array.
pub fn load_records(path: &Path) -> CtlResult<Vec<CostRecord>> {
    read_json(path)
}
