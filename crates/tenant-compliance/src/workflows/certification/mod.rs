//! Income certification and annual recertification for income-restricted units.
//!
//! The calculators (`classifier`, `rent`, `safe_harbor`) are pure functions over a limit
//! table snapshot. `TenantLifecycleService` composes them with validation, storage and
//! event publication.

pub mod classifier;
pub mod clock;
pub mod domain;
pub mod limits;
pub mod policy;
pub mod rent;
pub mod repository;
pub mod router;
pub mod safe_harbor;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use classifier::{IncomeClassification, IncomeError, IncomeLimits};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    CertificationOutcome, HouseholdSize, IncomeCategory, NewTenantRequest,
    PropertyComplianceSummary, PropertyComplianceView, PropertyId, RecertificationOutcome,
    RecertificationRecord, RecertificationRequest, RecordId, Tenant, TenantId,
};
pub use limits::{
    bundled_registry, AmiLimitEntry, AmiLimitLoadError, AmiLimitLoader, AmiLimitRegistry,
    AmiLimitTable, ConfigurationError, SharedLimits,
};
pub use policy::{CompliancePolicy, LifecycleConfig, RetryPolicy};
pub use repository::{
    ComplianceEvent, ComplianceEventPublisher, EventError, OverIncomeNotice, RepositoryError,
    TenantRepository, TenantSnapshot,
};
pub use router::{certification_router, ClassifyIncomeRequest, MaxRentRequest, MaxRentResponse};
pub use safe_harbor::SafeHarborOutcome;
pub use service::{CertificationError, TenantLifecycleService};
pub use store::InMemoryTenantStore;
pub use validation::ValidationError;
