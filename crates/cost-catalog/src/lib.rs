//! Configuration sizing catalog for CostOps.
//!
//! Models resource configurations as families of sizes ordered from
//! smallest to largest capacity (`t3`: nano < micro < ... < 2xlarge) and
//! answers "one step smaller" queries for rightsizing proposals.
//! Configurations outside the catalog are "unknown family" and never
//! resized.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("family id must not be empty")]
    EmptyFamilyId,
    #[error("family '{0}' has no sizes")]
    EmptySizes(String),
    #[error("family '{0}' registered twice")]
    DuplicateFamily(String),
    #[error("family '{family}' lists size '{size}' twice")]
    DuplicateSize { family: String, size: String },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// One family definition as it appears in catalog files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationFamily {
    pub family_id: String,
    /// Ordered smallest to largest capacity.
    pub sizes: Vec<String>,
}

/// Registry of configuration families keyed by family id.
#[derive(Debug, Clone)]
pub struct SizingCatalog {
    families: HashMap<String, Vec<String>>,
}

impl SizingCatalog {
    pub fn new() -> Self {
        Self { families: HashMap::new() }
    }

    /// The stock catalog: general-purpose and compute-optimized instance
    /// families plus the managed-database classes built on them.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let burstable = ["nano", "micro", "small", "medium", "large", "xlarge", "2xlarge"];
        let fixed = ["large", "xlarge", "2xlarge", "4xlarge", "8xlarge", "12xlarge", "16xlarge"];
        let db_burstable = ["micro", "small", "medium", "large", "xlarge", "2xlarge"];
        let db_memory = ["large", "xlarge", "2xlarge", "4xlarge"];

        for (family, sizes) in [
            ("t3", &burstable[..]),
            ("t4g", &burstable[..]),
            ("m5", &fixed[..]),
            ("c5", &fixed[..]),
            ("db.t3", &db_burstable[..]),
            ("db.r5", &db_memory[..]),
        ] {
            // Static tables cannot collide.
            let _ = catalog.register_family(ConfigurationFamily {
                family_id: family.to_string(),
                sizes: sizes.iter().map(|s| s.to_string()).collect(),
            });
        }
        catalog
    }

    /// Build a catalog from explicit family definitions (e.g. a catalog
    /// file supplied on the command line).
    pub fn from_families(families: Vec<ConfigurationFamily>) -> Result<Self> {
        let mut catalog = Self::new();
        for family in families {
            catalog.register_family(family)?;
        }
        Ok(catalog)
    }

    pub fn register_family(&mut self, family: ConfigurationFamily) -> Result<()> {
        if family.family_id.is_empty() {
            return Err(CatalogError::EmptyFamilyId);
        }
        if family.sizes.is_empty() {
            return Err(CatalogError::EmptySizes(family.family_id));
        }
        for (i, size) in family.sizes.iter().enumerate() {
            if family.sizes[..i].contains(size) {
                return Err(CatalogError::DuplicateSize {
                    family: family.family_id,
                    size: size.clone(),
                });
            }
        }
        if self.families.contains_key(&family.family_id) {
            return Err(CatalogError::DuplicateFamily(family.family_id));
        }
        self.families.insert(family.family_id, family.sizes);
        Ok(())
    }

    /// Decompose a configuration id into (family, size).
    ///
    /// The family is the longest registered family that prefixes the id,
    /// followed by a `.` or `-` separator and a non-empty size remainder
    /// (`db.t3.medium` resolves to family `db.t3`, never `db`). Ids with
    /// no registered family yield `None` rather than an error.
    pub fn family_of<'a, 'c>(&'a self, configuration: &'c str) -> Option<(&'a str, &'c str)> {
        let family = self
            .families
            .keys()
            .filter(|family| split_size(configuration, family).is_some())
            .max_by_key(|family| family.len())?;
        let (_, size) = split_size(configuration, family)?;
        Some((family.as_str(), size))
    }

    /// The size one step below `size` in the family's order, or `None`
    /// when the size is already the smallest or not in the sequence.
    pub fn next_smaller(&self, family_id: &str, size: &str) -> Option<&str> {
        let sizes = self.families.get(family_id)?;
        let index = sizes.iter().position(|s| s == size)?;
        if index == 0 {
            return None;
        }
        Some(sizes[index - 1].as_str())
    }

    /// Full configuration id one step below the given one, preserving the
    /// original separator (`t3.large` steps to `t3.medium`, `e2-medium`
    /// to `e2-small`). `None` when the family is unknown or no smaller
    /// size exists.
    pub fn next_smaller_configuration(&self, configuration: &str) -> Option<String> {
        let (family, size) = self.family_of(configuration)?;
        let (separator, _) = split_size(configuration, family)?;
        let smaller = self.next_smaller(family, size)?;
        Some(format!("{family}{separator}{smaller}"))
    }

    pub fn sizes(&self, family_id: &str) -> Option<&[String]> {
        self.families.get(family_id).map(|s| s.as_slice())
    }

    /// All family ids, sorted for stable listing output.
    pub fn family_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.families.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

impl Default for SizingCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `configuration` as `family` + separator + size. Returns the
/// separator and size when the prefix matches and the size is non-empty.
fn split_size<'c>(configuration: &'c str, family: &str) -> Option<(char, &'c str)> {
    let rest = configuration.strip_prefix(family)?;
    let separator = rest.chars().next()?;
    if !matches!(separator, '.' | '-') {
        return None;
    }
    let size = &rest[separator.len_utf8()..];
    if size.is_empty() {
        return None;
    }
    Some((separator, size))
}
