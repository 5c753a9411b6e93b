//! Core domain types and logic.

pub mod observation;
pub mod time_index;
pub mod volatility;
pub mod trend;
pub mod signal;
pub mod position;
pub mod simulator;
pub mod metrics;
pub mod calendar;
pub mod universe;
pub mod ingest;
pub mod config_validation;
pub mod error;
