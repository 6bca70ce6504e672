//! costctl — CostOps command-line interface
//!
//! Runs rightsizing scans, usage sweeps, and billing breakdowns over
//! exported fleet data. Everything operates on JSON files so a scan
//! can run anywhere the exports land, with no cloud credentials.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod sources;

pub use config::CtlConfig;
pub use error::{CtlError, CtlResult};
