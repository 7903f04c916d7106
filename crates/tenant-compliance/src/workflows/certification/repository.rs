use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    PropertyComplianceSummary, PropertyId, RecertificationRecord, RecordId, Tenant, TenantId,
};

/// A tenant together with the optimistic-concurrency version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSnapshot {
    pub tenant: Tenant,
    pub version: u64,
}

/// Storage abstraction for tenant compliance state.
///
/// `commit_recertification` must apply the tenant update, the ledger append and the
/// property count refresh as one unit, and must reject a stale `expected_version`
/// with [`RepositoryError::Conflict`] instead of overwriting.
pub trait TenantRepository: Send + Sync {
    fn insert(&self, tenant: Tenant) -> Result<TenantSnapshot, RepositoryError>;
    fn fetch(&self, id: &TenantId) -> Result<Option<TenantSnapshot>, RepositoryError>;
    fn commit_recertification(
        &self,
        expected_version: u64,
        tenant: Tenant,
        record: RecertificationRecord,
    ) -> Result<TenantSnapshot, RepositoryError>;
    fn history(&self, id: &TenantId) -> Result<Vec<RecertificationRecord>, RepositoryError>;
    fn property_summary(
        &self,
        property_id: &PropertyId,
    ) -> Result<PropertyComplianceSummary, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for compliance obligations handled by property management.
pub trait ComplianceEventPublisher: Send + Sync {
    fn publish(&self, event: ComplianceEvent) -> Result<(), EventError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComplianceEvent {
    /// The next comparable vacancy at the property must go to a qualifying household.
    OverIncome(OverIncomeNotice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverIncomeNotice {
    pub tenant_id: TenantId,
    pub property_id: PropertyId,
    pub unit_number: String,
    pub record_id: RecordId,
    pub new_income: Decimal,
    pub over_income_trigger: Decimal,
    pub certified_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}
