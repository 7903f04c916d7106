//! Tenant income compliance: AMI classification, rent ceilings, and safe-harbor
//! recertification for income-restricted housing.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
