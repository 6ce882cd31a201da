//! Core domain types and logic.

pub mod error;
pub mod observation;
pub mod store;
pub mod horizon;
pub mod metrics;
pub mod enrichment;
pub mod rolling;
pub mod fx;
pub mod volumes;
pub mod cost_model;
pub mod memo;
pub mod performance;
pub mod config_validation;
