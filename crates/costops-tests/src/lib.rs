//! Integration test host for CostOps.
//!
//! The crate itself is intentionally empty. Cross-crate flows live
//! under `tests/`.

#![forbid(unsafe_code)]
